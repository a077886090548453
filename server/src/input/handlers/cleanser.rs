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


use crate::input::{ClientInput, ConnectionState, HandlerError, InputHandler, pop_char};
use async_trait::async_trait;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Turns keystrokes into line edits.
///
/// Printable bytes are appended to the line buffer and left in `data_in` so
/// they can be echoed. CR, LF and CR LF all end the line; anything after the
/// terminator is carried over to the next event. Other control bytes are
/// dropped.
pub struct CleanserHandler;

#[async_trait]
impl InputHandler for CleanserHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        _state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        let data = std::mem::take(&mut input.data_in);
        let mut accepted = Vec::with_capacity(data.len());

        let mut i = 0;
        while i < data.len() {
            let byte = data[i];
            i += 1;
            let after_cr = std::mem::replace(&mut input.last_was_cr, false);
            match byte {
                b'\r' => {
                    input.enter_pressed = true;
                    input.last_was_cr = true;
                    if matches!(data.get(i), Some(b'\n') | Some(0)) {
                        i += 1;
                        input.last_was_cr = false;
                    }
                    break;
                }
                b'\n' | 0 if after_cr => {}
                b'\n' => {
                    input.enter_pressed = true;
                    break;
                }
                b'\t' => input.tab_pressed = true,
                BACKSPACE | DELETE => {
                    input.bs_pressed = true;
                    // Characters typed earlier in this read have not been echoed yet
                    if pop_char(&mut accepted) {
                        pop_char(&mut input.buffer);
                    } else if input.erase_char() {
                        input.erased += 1;
                    }
                }
                b if b < 0x20 => {}
                b => {
                    input.buffer.push(b);
                    accepted.push(b);
                }
            }
        }

        if i < data.len() {
            input.carry = data[i..].to_vec();
        }
        input.data_in = accepted;
        Ok(true)
    }
}
