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
use crate::telnet::{TelnetEvent, TelnetOption, parse_window_size};
use async_trait::async_trait;

/// Strips telnet commands out of the byte stream and records window size
/// reports. Stops the chain when a read held nothing but telnet commands.
pub struct TelnetIacHandler;

#[async_trait]
impl InputHandler for TelnetIacHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        if input.carried {
            return Ok(true);
        }
        let (data, events) = state.telnet.decoder.decode(&input.data_in);
        for event in events {
            match event {
                TelnetEvent::Subnegotiation { option, data }
                    if option == TelnetOption::NAWS.to_byte() =>
                {
                    if let Some(size) = parse_window_size(&data) {
                        tracing::trace!(connection_id = %state.connection_id(), ?size, "Window size");
                        state.telnet.window_size = Some(size);
                    }
                }
                other => {
                    tracing::trace!(connection_id = %state.connection_id(), ?other, "Telnet event");
                }
            }
        }
        input.data_in = data;
        Ok(!input.data_in.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state::test_utils::test_state;

    #[tokio::test]
    async fn test_strips_commands_and_reads_naws() {
        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        input.begin(vec![255, 251, 31, b'l', 255, 250, 31, 0, 100, 0, 40, 255, 240, b'k']);

        let proceed = TelnetIacHandler.handle(&mut input, &mut state).await.unwrap();
        assert!(proceed);
        assert_eq!(input.data_in, b"lk");
        assert_eq!(state.telnet.window_size, Some((100, 40)));
    }

    #[tokio::test]
    async fn test_only_commands_stops_chain() {
        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        input.begin(vec![255, 253, 1]);

        let proceed = TelnetIacHandler.handle(&mut input, &mut state).await.unwrap();
        assert!(!proceed);
        assert!(input.data_in.is_empty());
    }

    #[tokio::test]
    async fn test_carried_bytes_skip_decoder() {
        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        input.begin(vec![b'a', 255]);
        TelnetIacHandler.handle(&mut input, &mut state).await.unwrap();
        assert_eq!(input.data_in, b"a");

        // A half-read command must not swallow text that was already decoded
        input.begin_carried(b"say".to_vec());
        let proceed = TelnetIacHandler.handle(&mut input, &mut state).await.unwrap();
        assert!(proceed);
        assert_eq!(input.data_in, b"say");

        input.begin(vec![251, 31, b'x']);
        TelnetIacHandler.handle(&mut input, &mut state).await.unwrap();
        assert_eq!(input.data_in, b"x");
    }
}
