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

//! Built-in input handlers
//!
//! Telnet connections start with `telnet-iac`, `ansi`, `cleanser` and
//! `login`; websocket connections start with `login` alone. Once a user is
//! logged in the session swaps `login` for `echo`, `history`, `admin` (for
//! administrators) and `system`, and slots `signal` in right after `ansi`.

pub mod admin;
pub mod ansi;
pub mod cleanser;
pub mod echo;
pub mod history;
pub mod login;
pub mod signal;
pub mod system;
pub mod telnet_iac;

pub use admin::AdminCommandHandler;
pub use ansi::AnsiHandler;
pub use cleanser::CleanserHandler;
pub use echo::EchoHandler;
pub use history::HistoryHandler;
pub use login::LoginHandler;
pub use signal::SignalHandler;
pub use system::SystemCommandHandler;
pub use telnet_iac::TelnetIacHandler;

pub const TELNET_IAC: &str = "telnet-iac";
pub const ANSI: &str = "ansi";
pub const SIGNAL: &str = "signal";
pub const CLEANSER: &str = "cleanser";
pub const LOGIN: &str = "login";
pub const ECHO: &str = "echo";
pub const HISTORY: &str = "history";
pub const ADMIN: &str = "admin";
pub const SYSTEM: &str = "system";
