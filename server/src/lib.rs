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


//! Emberhold Server Library
//!
//! Connection and session core for Emberhold: telnet and websocket
//! transports, per-connection handler chains, the session registry, the
//! world dispatch queue and the user store.

pub mod config;
pub mod context;
pub mod input;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;
pub mod suggestions;
pub mod telnet;
pub mod transport;
pub mod world;

// Re-export commonly used types
pub use context::{Phase, ServerContext, ShutdownSignal};
pub use registry::{ConnectionHandle, ConnectionId, SessionRegistry, SessionUser};
pub use server::Server;
pub use session::{ConnectionSession, SessionState};
pub use store::UserStore;
pub use world::{BasicRules, GameRules, World};
