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


use crate::context::ShutdownSignal;
use crate::input::{ClientInput, ConnectionState, HandlerError, InputHandler};
use crate::world::World;
use async_trait::async_trait;

/// Commands reserved for administrators
pub struct AdminCommandHandler {
    world: World,
    shutdown: ShutdownSignal,
}

impl AdminCommandHandler {
    pub fn new(world: World, shutdown: ShutdownSignal) -> Self {
        Self { world, shutdown }
    }
}

#[async_trait]
impl InputHandler for AdminCommandHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        let line = input.line();
        let (command, rest) = line
            .trim()
            .split_once(' ')
            .map(|(c, r)| (c.to_string(), r.trim().to_string()))
            .unwrap_or_else(|| (line.trim().to_string(), String::new()));

        match command.as_str() {
            "/shutdown" => {
                input.reset();
                tracing::warn!(connection_id = %state.connection_id(), user_id = ?state.user_id(), "Shutdown requested by administrator");
                self.shutdown.trigger();
                Ok(false)
            }
            "/broadcast" => {
                input.reset();
                if rest.is_empty() {
                    state.send_text(&format!("Usage: /broadcast <text>\n{}", state.prompt()))?;
                } else {
                    self.world.broadcast(format!("\n[broadcast] {}\n", rest), Vec::new())?;
                }
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}
