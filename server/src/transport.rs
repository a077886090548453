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

//! Transport adapter layer
//!
//! Telnet delivers whatever bytes are on the wire, websockets deliver whole
//! messages. Both are hidden behind the same reader/writer pair so a session
//! never needs to know which one it is talking to. The reader is owned by
//! the connection's session loop and the writer by its outbound pump.

use async_trait::async_trait;
use std::fmt;

pub mod telnet;
pub mod websocket;

/// Size of a single telnet read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Raw byte stream with telnet option negotiation
    Telnet,
    /// Browser socket delivering one line per message
    WebSocket,
}

impl TransportKind {
    /// Whether the transport carries raw keystrokes that need the telnet
    /// and terminal handlers
    pub fn is_stream(&self) -> bool {
        matches!(self, TransportKind::Telnet)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Telnet => write!(f, "telnet"),
            TransportKind::WebSocket => write!(f, "websocket"),
        }
    }
}

/// A unit of inbound data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Bytes currently available on a stream, no line buffering applied
    Bytes(Vec<u8>),
    /// One complete application message, already a submitted line
    Message(Vec<u8>),
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(String),
}

impl TransportError {
    /// Clean end of stream, as opposed to a failure worth a warning
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// Inbound half of a transport
#[async_trait]
pub trait TransportReader: Send {
    fn kind(&self) -> TransportKind;

    /// Wait for the next unit of input. A clean close yields
    /// [`TransportError::Closed`].
    async fn read(&mut self) -> Result<Received, TransportError>;
}

/// Outbound half of a transport
#[async_trait]
pub trait TransportWriter: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}
