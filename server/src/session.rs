//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Connection sessions
//!
//! One [`ConnectionSession`] per accepted connection reads the transport,
//! runs every read through the connection's handler chain and turns
//! submitted lines into world commands.

use crate::context::{Phase, ServerContext};
use crate::input::handlers::login::LoginResult;
use crate::input::handlers::{
    self, AdminCommandHandler, AnsiHandler, CleanserHandler, EchoHandler, HistoryHandler,
    LoginHandler, SignalHandler, SystemCommandHandler, TelnetIacHandler,
};
use crate::input::{ChainError, ClientInput, CloseRequest, ConnectionState, HandlerChain};
use crate::registry::{Bound, ConnectionHandle};
use crate::suggestions::Suggestions;
use crate::telnet::negotiation_sequence;
use crate::transport::{Received, TransportError, TransportKind, TransportReader};
use crate::world::WorldInput;
use emberhold_common::Permission;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Active,
    /// Transport lost; the user stays in the world awaiting reconnection
    Zombie,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, next),
            (Connecting, Authenticating)
                | (Authenticating, Active)
                | (Active, Zombie)
                | (Zombie, Active)
                | (Connecting | Authenticating | Active | Zombie, Closed)
        )
    }
}

/// Text typed but not yet submitted, plus the completion shown after it
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnsentText {
    pub text: String,
    pub suggestion: String,
}

pub struct ConnectionSession {
    context: ServerContext,
    reader: Box<dyn TransportReader>,
    chain: HandlerChain,
    input: ClientInput,
    state: ConnectionState,
    lifecycle: SessionState,
    suggestions: Suggestions,
    unsent: UnsentText,
    last_command: Option<Instant>,
    turn_rate: Duration,
}

impl ConnectionSession {
    /// Build a session for a registered connection with the handlers every
    /// connection of its transport starts with.
    pub fn new(
        context: ServerContext,
        handle: ConnectionHandle,
        reader: Box<dyn TransportReader>,
    ) -> Result<Self, ChainError> {
        let config = &context.config;
        let mut chain = HandlerChain::new();
        if handle.kind().is_stream() {
            chain.add(handlers::TELNET_IAC, Arc::new(TelnetIacHandler))?;
            chain.add(handlers::ANSI, Arc::new(AnsiHandler))?;
            chain.add(handlers::CLEANSER, Arc::new(CleanserHandler))?;
        }
        chain.add(
            handlers::LOGIN,
            Arc::new(LoginHandler::new(
                context.store.clone(),
                context.registry.clone(),
                config.messages.welcome.clone(),
                config.game.start_room,
            )),
        )?;

        let state = ConnectionState::new(handle, config.game.prompt.clone());
        let turn_rate = Duration::from_millis(config.game.turn_ms);
        Ok(Self {
            context,
            reader,
            chain,
            input: ClientInput::new(),
            state,
            lifecycle: SessionState::Connecting,
            suggestions: Suggestions::default(),
            unsent: UnsentText::default(),
            last_command: None,
            turn_rate,
        })
    }

    pub fn lifecycle(&self) -> SessionState {
        self.lifecycle
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Serve the connection until it closes or the server shuts down
    pub async fn run(mut self) {
        let id = self.state.connection_id();
        tracing::info!(connection_id = %id, kind = %self.state.kind(), addr = %self.state.handle().addr(), "Connection opened");

        if self.reader.kind() == TransportKind::Telnet {
            for sequence in negotiation_sequence() {
                if let Err(e) = self.state.send_bytes(sequence) {
                    tracing::debug!(connection_id = %id, "Negotiation failed: {}", e);
                }
            }
        }

        self.transition(SessionState::Authenticating);
        if let Some(login) = self.chain.get(handlers::LOGIN) {
            if let Err(e) = login.handle(&mut self.input, &mut self.state).await {
                tracing::warn!(connection_id = %id, "Welcome failed: {}", e);
            }
        }

        let mut phase = self.context.subscribe_phase();
        loop {
            let received = tokio::select! {
                received = self.reader.read() => received,
                _ = phase.wait_for(|phase| *phase == Phase::Closed) => {
                    tracing::debug!(connection_id = %id, "Server closing connection");
                    break;
                }
            };

            match received {
                Ok(Received::Bytes(data)) => {
                    self.input.begin(data);
                    loop {
                        self.process().await;
                        if self.state.close_request().is_some() {
                            break;
                        }
                        match self.input.take_carry() {
                            Some(carry) => self.input.begin_carried(carry),
                            None => break,
                        }
                    }
                }
                Ok(Received::Message(data)) => {
                    self.input.begin_line(data);
                    self.process().await;
                }
                Err(e) => {
                    self.disconnected(e).await;
                    break;
                }
            }

            if let Some(CloseRequest::Quit) = self.state.close_request() {
                self.quit();
                break;
            }
        }

        self.finish().await;
    }

    /// Run the chain over the current event and act on the outcome
    async fn process(&mut self) {
        let outcome = match self.chain.run(&mut self.input, &mut self.state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(connection_id = %self.state.connection_id(), "Input handling failed: {}", e);
                return;
            }
        };

        if !outcome.continue_processing {
            self.aborted().await;
            return;
        }

        if let Some(result) = self.state.login.take_completed() {
            self.logged_in(result);
            return;
        }

        if self.input.enter_pressed && self.lifecycle == SessionState::Active {
            self.submit();
        }
    }

    /// Keystrokes that did not submit a line: tab completion, backspace and
    /// accepting a completion with space.
    async fn aborted(&mut self) {
        if self.lifecycle != SessionState::Active {
            return;
        }
        let Some(user_id) = self.state.user_id() else {
            return;
        };

        let mut suggested = std::mem::take(&mut self.unsent.suggestion);
        let mut redraw = false;

        if self.input.tab_pressed {
            if self.suggestions.is_empty() {
                let partial = self.input.line();
                let candidates = self.context.world.autocomplete(user_id, &partial).await;
                self.suggestions.set(candidates);
            }
            if let Some(next) = self.suggestions.next() {
                suggested = next.to_string();
                redraw = true;
            }
        } else if self.input.bs_pressed {
            if !suggested.is_empty() {
                suggested.clear();
                self.suggestions.clear();
                redraw = true;
            }
        } else {
            if !suggested.is_empty() {
                if self.input.buffer.last() == Some(&b' ') {
                    self.input.buffer.pop();
                    self.input.buffer.extend_from_slice(suggested.as_bytes());
                    self.input.buffer.push(b' ');
                }
                suggested.clear();
                redraw = true;
            }
            self.suggestions.clear();
        }

        self.unsent = UnsentText {
            text: self.input.line(),
            suggestion: suggested,
        };
        if redraw {
            self.redraw_prompt();
        }
    }

    fn redraw_prompt(&self) {
        if !self.state.kind().is_stream() {
            return;
        }
        let mut line = format!("\r\x1b[2K{}{}", self.state.prompt(), self.unsent.text);
        if !self.unsent.suggestion.is_empty() {
            let width = self.unsent.suggestion.chars().count();
            line.push_str(&format!("\x1b[2m{}\x1b[0m\x1b[{}D", self.unsent.suggestion, width));
        }
        if let Err(e) = self.state.send_text(&line) {
            tracing::debug!(connection_id = %self.state.connection_id(), "Prompt redraw failed: {}", e);
        }
    }

    /// Install the handlers of a logged in connection and enter the world
    fn logged_in(&mut self, result: LoginResult) {
        let LoginResult { record, bound } = result;
        let id = self.state.connection_id();

        self.chain.remove(handlers::LOGIN);
        if let Err(e) = self.install_active_handlers(record.permission) {
            tracing::warn!(connection_id = %id, "Handler installation failed: {}", e);
        }
        self.transition(SessionState::Active);

        let input = match bound {
            Bound::Fresh(user) => {
                tracing::info!(connection_id = %id, user_id = user.user_id, username = %user.username, "User logged in");
                WorldInput::Enter {
                    record: Box::new(record),
                    connection: id,
                }
            }
            Bound::Reconnected(user) => {
                tracing::info!(connection_id = %id, user_id = user.user_id, username = %user.username, "User reconnected");
                WorldInput::Reconnected {
                    user_id: user.user_id,
                    connection: id,
                }
            }
        };
        if let Err(e) = self.context.world.submit(input) {
            tracing::warn!(connection_id = %id, "World rejected login: {}", e);
        }
    }

    fn install_active_handlers(&mut self, permission: Permission) -> Result<(), ChainError> {
        let registry = self.context.registry.clone();
        self.chain.add(handlers::ECHO, Arc::new(EchoHandler))?;
        self.chain.add(handlers::HISTORY, Arc::new(HistoryHandler))?;
        if permission.has_permission(Permission::Admin) {
            self.chain.add(
                handlers::ADMIN,
                Arc::new(AdminCommandHandler::new(
                    self.context.world.clone(),
                    self.context.shutdown_signal().clone(),
                )),
            )?;
        }
        self.chain.add(
            handlers::SYSTEM,
            Arc::new(SystemCommandHandler::new(registry)),
        )?;
        self.chain
            .insert_after(handlers::ANSI, handlers::SIGNAL, Arc::new(SignalHandler))?;
        Ok(())
    }

    /// Queue the submitted line, unless it came sooner than the turn rate allows
    fn submit(&mut self) {
        let Some(user_id) = self.state.user_id() else {
            return;
        };
        let now = Instant::now();
        if self
            .last_command
            .is_some_and(|last| now.duration_since(last) < self.turn_rate)
        {
            tracing::trace!(connection_id = %self.state.connection_id(), "Command dropped by turn rate");
            self.input.reset();
            self.unsent = UnsentText::default();
            return;
        }

        let suggestion = std::mem::take(&mut self.unsent.suggestion);
        if !suggestion.is_empty() {
            self.input.buffer.extend_from_slice(suggestion.as_bytes());
            self.suggestions.clear();
        }
        let text = self.input.take_line();
        self.unsent = UnsentText::default();

        if text.is_empty() {
            let _ = self.state.send_text(self.state.prompt());
            return;
        }
        self.last_command = Some(now);
        if let Err(e) = self.context.world.command(user_id, text) {
            tracing::debug!(connection_id = %self.state.connection_id(), "Command not queued: {}", e);
        }
    }

    /// The transport failed or closed underneath a session
    async fn disconnected(&mut self, error: TransportError) {
        let id = self.state.connection_id();
        if error.is_closed() {
            tracing::debug!(connection_id = %id, "Connection closed by peer");
        } else {
            tracing::warn!(connection_id = %id, "Read failed: {}", error);
        }

        let Some(user) = self.context.registry.lookup_by_connection(id).await else {
            return;
        };
        if self.context.config.game.zombies_enabled() {
            let turn = self.context.world.turn();
            self.context.registry.mark_zombie(user.user_id, turn).await;
            tracing::info!(connection_id = %id, user_id = user.user_id, username = %user.username, turn, "User is now a zombie");
            if let Err(e) = self.context.world.submit(WorldInput::Zombie { user_id: user.user_id }) {
                tracing::debug!(connection_id = %id, "Zombie not queued: {}", e);
            }
            self.transition(SessionState::Zombie);
        } else if let Err(e) = self.context.world.submit(WorldInput::Leave { user_id: user.user_id }) {
            tracing::debug!(connection_id = %id, "Leave not queued: {}", e);
        }
    }

    fn quit(&mut self) {
        if let Some(user_id) = self.state.user_id() {
            tracing::info!(connection_id = %self.state.connection_id(), user_id, "User quit");
            if let Err(e) = self.context.world.submit(WorldInput::Leave { user_id }) {
                tracing::debug!(connection_id = %self.state.connection_id(), "Leave not queued: {}", e);
            }
        }
    }

    async fn finish(mut self) {
        let id = self.state.connection_id();
        self.state.handle().close();
        self.context.registry.remove(id).await;
        if self.lifecycle != SessionState::Zombie {
            self.transition(SessionState::Closed);
        }
        tracing::info!(connection_id = %id, lifecycle = ?self.lifecycle, "Connection finished");
    }

    fn transition(&mut self, next: SessionState) {
        if self.lifecycle.can_transition_to(next) {
            tracing::trace!(connection_id = %self.state.connection_id(), from = ?self.lifecycle, to = ?next, "Session transition");
            self.lifecycle = next;
        } else {
            tracing::warn!(connection_id = %self.state.connection_id(), from = ?self.lifecycle, to = ?next, "Invalid session transition");
        }
    }
}
