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


use crate::input::{ClientInput, ConnectionState, HandlerError, HistoryNav, InputHandler};
use async_trait::async_trait;

/// Records submitted lines and recalls them on cursor up and down.
///
/// Only a submitted line gets past this handler, so everything after it in
/// the chain sees whole commands.
pub struct HistoryHandler;

#[async_trait]
impl InputHandler for HistoryHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        if let Some(nav) = input.navigation {
            let recalled = match nav {
                HistoryNav::Previous => input.history.previous(),
                HistoryNav::Next => input.history.next(),
            }
            .map(str::to_owned);
            if let Some(line) = recalled {
                input.buffer = line.into_bytes();
                if state.kind().is_stream() {
                    state.send_text(&format!("\r\x1b[2K{}{}", state.prompt(), input.line()))?;
                }
            }
            return Ok(false);
        }

        if !input.enter_pressed {
            return Ok(false);
        }
        let line = input.line();
        input.history.push(&line);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state::test_utils::{flushed, test_state};

    #[tokio::test]
    async fn test_only_submitted_lines_continue() {
        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        input.buffer = b"lo".to_vec();
        input.begin(b"lo".to_vec());
        assert!(!HistoryHandler.handle(&mut input, &mut state).await.unwrap());
        assert!(input.history.is_empty());

        input.begin(Vec::new());
        input.enter_pressed = true;
        assert!(HistoryHandler.handle(&mut input, &mut state).await.unwrap());
        assert_eq!(input.history.entries().collect::<Vec<_>>(), vec!["lo"]);
    }

    #[tokio::test]
    async fn test_navigation_redraws_line() {
        let (mut state, out) = test_state().await;
        let mut input = ClientInput::new();
        input.history.push("look");
        input.history.push("say hi");

        input.begin(Vec::new());
        input.navigation = Some(HistoryNav::Previous);
        assert!(!HistoryHandler.handle(&mut input, &mut state).await.unwrap());
        assert_eq!(input.line(), "say hi");
        assert_eq!(flushed(&out).await, "\r\x1b[2K> say hi");

        input.begin(Vec::new());
        input.navigation = Some(HistoryNav::Next);
        HistoryHandler.handle(&mut input, &mut state).await.unwrap();
        assert_eq!(input.line(), "");
    }
}
