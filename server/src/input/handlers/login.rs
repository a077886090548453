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


use crate::input::{ClientInput, ConnectionState, HandlerError, InputHandler};
use crate::registry::{Bound, RegistryError, SessionRegistry, SessionUser};
use crate::store::{StoreError, UserStore};
use emberhold_common::UserRecord;
use emberhold_common::user::{validate_password, validate_username};
use async_trait::async_trait;
use std::sync::Arc;

const USERNAME_PROMPT: &str = "Username: ";
const PASSWORD_PROMPT: &str = "Password: ";
const NEW_PASSWORD_PROMPT: &str = "New user. Choose a password: ";
const CONFIRM_PROMPT: &str = "Confirm password: ";

pub const ALREADY_LOGGED_IN: &str = "That user is already logged in.\n";
pub const INCORRECT_PASSWORD: &str = "Incorrect password.\n";
pub const PASSWORD_MISMATCH: &str = "Passwords do not match.\n";
pub const RECONNECTING: &str = "Reconnecting...\n";

#[derive(Debug, Default)]
enum LoginStep {
    #[default]
    Welcome,
    Username,
    Password {
        record: Box<UserRecord>,
    },
    NewPassword {
        username: String,
    },
    ConfirmPassword {
        username: String,
        password: String,
    },
    Completed,
}

impl LoginStep {
    fn is_secret(&self) -> bool {
        matches!(
            self,
            LoginStep::Password { .. } | LoginStep::NewPassword { .. } | LoginStep::ConfirmPassword { .. }
        )
    }
}

/// A finished login, waiting for the session to pick it up
#[derive(Debug)]
pub struct LoginResult {
    pub record: UserRecord,
    pub bound: Bound,
}

/// Progress of the login dialogue for one connection
#[derive(Debug, Default)]
pub struct LoginState {
    step: LoginStep,
    completed: Option<LoginResult>,
}

impl LoginState {
    pub fn take_completed(&mut self) -> Option<LoginResult> {
        self.completed.take()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.step, LoginStep::Completed)
    }
}

/// Runs the welcome, username and password dialogue and binds the user on
/// success. Returns `Ok(true)` only for the event that completes the login.
pub struct LoginHandler {
    store: Arc<UserStore>,
    registry: Arc<SessionRegistry>,
    welcome: String,
    start_room: i64,
}

impl LoginHandler {
    pub fn new(
        store: Arc<UserStore>,
        registry: Arc<SessionRegistry>,
        welcome: impl Into<String>,
        start_room: i64,
    ) -> Self {
        Self {
            store,
            registry,
            welcome: welcome.into(),
            start_room,
        }
    }

    async fn advance(
        &self,
        step: LoginStep,
        line: String,
        state: &mut ConnectionState,
    ) -> Result<(LoginStep, bool), HandlerError> {
        match step {
            LoginStep::Welcome => {
                state.send_text(&self.welcome)?;
                state.send_text(USERNAME_PROMPT)?;
                Ok((LoginStep::Username, false))
            }
            LoginStep::Username => {
                if line.is_empty() {
                    state.send_text(USERNAME_PROMPT)?;
                    return Ok((LoginStep::Username, false));
                }
                if let Err(err) = validate_username(&line) {
                    state.send_text(&format!("{}.\n{}", err, USERNAME_PROMPT))?;
                    return Ok((LoginStep::Username, false));
                }
                match self.store.load(&line).await? {
                    Some(record) => {
                        state.send_text(PASSWORD_PROMPT)?;
                        Ok((LoginStep::Password { record: Box::new(record) }, false))
                    }
                    None => {
                        state.send_text(NEW_PASSWORD_PROMPT)?;
                        Ok((LoginStep::NewPassword { username: line }, false))
                    }
                }
            }
            LoginStep::Password { record } => {
                if self.store.verify_password(&record, &line).await? {
                    self.complete(*record, state).await
                } else {
                    tracing::info!(connection_id = %state.connection_id(), username = %record.username, "Incorrect password");
                    state.send_text(&format!("{}{}", INCORRECT_PASSWORD, USERNAME_PROMPT))?;
                    Ok((LoginStep::Username, false))
                }
            }
            LoginStep::NewPassword { username } => {
                if let Err(err) = validate_password(&line) {
                    state.send_text(&format!("{}.\n{}", err, NEW_PASSWORD_PROMPT))?;
                    return Ok((LoginStep::NewPassword { username }, false));
                }
                state.send_text(CONFIRM_PROMPT)?;
                Ok((
                    LoginStep::ConfirmPassword {
                        username,
                        password: line,
                    },
                    false,
                ))
            }
            LoginStep::ConfirmPassword { username, password } => {
                if line != password {
                    state.send_text(&format!("{}{}", PASSWORD_MISMATCH, NEW_PASSWORD_PROMPT))?;
                    return Ok((LoginStep::NewPassword { username }, false));
                }
                match self.store.create(&username, &password, self.start_room).await {
                    Ok(record) => self.complete(record, state).await,
                    Err(StoreError::UsernameTaken(_)) => {
                        state.send_text(&format!(
                            "That username was just taken.\n{}",
                            USERNAME_PROMPT
                        ))?;
                        Ok((LoginStep::Username, false))
                    }
                    Err(err) => Err(err.into()),
                }
            }
            LoginStep::Completed => Ok((LoginStep::Completed, false)),
        }
    }

    async fn complete(
        &self,
        record: UserRecord,
        state: &mut ConnectionState,
    ) -> Result<(LoginStep, bool), HandlerError> {
        let user = SessionUser::from(&record);
        match self.registry.bind(state.connection_id(), user).await {
            Ok(bound) => {
                if matches!(bound, Bound::Reconnected(_)) {
                    state.send_text(RECONNECTING)?;
                }
                state.user = Some(bound.user().clone());
                state.login.completed = Some(LoginResult { record, bound });
                Ok((LoginStep::Completed, true))
            }
            Err(RegistryError::AlreadyLoggedIn(username)) => {
                tracing::info!(connection_id = %state.connection_id(), %username, "Rejected duplicate login");
                state.send_text(&format!("{}{}", ALREADY_LOGGED_IN, USERNAME_PROMPT))?;
                Ok((LoginStep::Username, false))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl InputHandler for LoginHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        let step = std::mem::take(&mut state.login.step);

        if !matches!(step, LoginStep::Welcome) {
            if step.is_secret() {
                let masked = "*".repeat(String::from_utf8_lossy(&input.data_in).chars().count());
                state.echo(masked.as_bytes(), input.erased, input.enter_pressed)?;
            } else {
                state.echo(&input.data_in, input.erased, input.enter_pressed)?;
            }
            if !input.enter_pressed {
                state.login.step = step;
                return Ok(false);
            }
        }

        let line = input.take_line();
        match self.advance(step, line, state).await {
            Ok((next, proceed)) => {
                state.login.step = next;
                Ok(proceed)
            }
            Err(err) => {
                state.login.step = LoginStep::Username;
                state.send_text(USERNAME_PROMPT)?;
                Err(err)
            }
        }
    }
}
