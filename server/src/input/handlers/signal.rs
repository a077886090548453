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
use async_trait::async_trait;

const CTRL_C: u8 = 0x03;
const CTRL_L: u8 = 0x0c;

/// Control-key shortcuts. Must run after escape decoding and before the
/// cleanser, which would otherwise discard the control bytes.
pub struct SignalHandler;

#[async_trait]
impl InputHandler for SignalHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        if input.data_in.contains(&CTRL_C) {
            input.data_in.clear();
            input.reset();
            if state.kind().is_stream() {
                state.send_text(&format!("^C\n{}", state.prompt()))?;
            }
            return Ok(false);
        }

        if input.data_in.contains(&CTRL_L) {
            input.data_in.clear();
            input.buffer = b"look".to_vec();
            input.enter_pressed = true;
        }
        Ok(true)
    }
}
