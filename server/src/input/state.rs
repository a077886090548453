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

//! Typed per-connection state shared between handlers

use crate::input::handlers::login::LoginState;
use crate::registry::{ConnectionHandle, ConnectionId, SessionUser};
use crate::telnet::TelnetDecoder;
use crate::transport::{TransportError, TransportKind};
use emberhold_common::UserId;

/// Telnet negotiation state
#[derive(Debug, Default)]
pub struct TelnetState {
    pub decoder: TelnetDecoder,
    pub window_size: Option<(u16, u16)>,
}

/// Why a handler asked for the connection to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequest {
    /// The player logged out on purpose; no zombie is left behind
    Quit,
}

/// State a connection's handlers read and write while processing input
pub struct ConnectionState {
    handle: ConnectionHandle,
    prompt: String,
    pub telnet: TelnetState,
    /// Incomplete escape sequence held over from the previous read
    pub ansi_pending: Vec<u8>,
    pub login: LoginState,
    pub user: Option<SessionUser>,
    close: Option<CloseRequest>,
}

impl ConnectionState {
    pub fn new(handle: ConnectionHandle, prompt: impl Into<String>) -> Self {
        Self {
            handle,
            prompt: prompt.into(),
            telnet: TelnetState::default(),
            ansi_pending: Vec::new(),
            login: LoginState::default(),
            user: None,
            close: None,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn kind(&self) -> TransportKind {
        self.handle.kind()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.user_id)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.handle.send_text(text)
    }

    pub fn send_bytes(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.handle.send(data)
    }

    /// Echo keystrokes back to a telnet client. Message clients echo locally.
    pub fn echo(&self, data: &[u8], erased: usize, enter: bool) -> Result<(), TransportError> {
        if !self.kind().is_stream() {
            return Ok(());
        }
        let mut out = Vec::with_capacity(data.len() + erased * 3 + 2);
        for _ in 0..erased {
            out.extend_from_slice(b"\x08 \x08");
        }
        out.extend_from_slice(data);
        if enter {
            out.extend_from_slice(b"\r\n");
        }
        if out.is_empty() {
            return Ok(());
        }
        self.send_bytes(out)
    }

    pub fn request_close(&mut self, request: CloseRequest) {
        self.close = Some(request);
    }

    pub fn close_request(&self) -> Option<CloseRequest> {
        self.close
    }
}
