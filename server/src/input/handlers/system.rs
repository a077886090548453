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


use crate::input::{ClientInput, CloseRequest, ConnectionState, HandlerError, InputHandler};
use crate::registry::SessionRegistry;
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;

/// Slash commands available to every logged in user
pub struct SystemCommandHandler {
    registry: Arc<SessionRegistry>,
}

impl SystemCommandHandler {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    async fn online(&self) -> String {
        let online = self.registry.online().await;
        let mut text = format!("Online ({}):\n", online.len());
        for entry in online {
            let _ = write!(text, "  {} [{}]", entry.user.username, entry.user.permission);
            if entry.zombie {
                text.push_str(" (zombie)");
            }
            text.push('\n');
        }
        text
    }
}

#[async_trait]
impl InputHandler for SystemCommandHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        let line = input.line();
        let command = line.trim();
        match command {
            "/quit" => {
                input.reset();
                state.send_text("Goodbye.\n")?;
                state.request_close(CloseRequest::Quit);
                Ok(false)
            }
            "/history" => {
                input.reset();
                let mut text = String::from("History:\n");
                for (i, entry) in input.history.entries().enumerate() {
                    let _ = writeln!(text, "  {:>2} {}", i + 1, entry);
                }
                text.push_str(state.prompt());
                state.send_text(&text)?;
                Ok(false)
            }
            "/online" => {
                input.reset();
                let mut text = self.online().await;
                text.push_str(state.prompt());
                state.send_text(&text)?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}
