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

const ESC: u8 = 0x1b;

/// Longest unfinished sequence held between reads
const MAX_PENDING: usize = 16;

/// Removes terminal escape sequences from the input.
///
/// Cursor up and down become history navigation and cursor position reports
/// update the window size. An unfinished sequence at the end of a read is
/// held until the next one, up to [`MAX_PENDING`] bytes. A bare ESC ending a
/// read is a keypress of its own.
pub struct AnsiHandler;

enum Scan {
    /// Sequence of `len` bytes ending in `last`
    Complete { len: usize, last: u8 },
    Incomplete,
}

fn scan(bytes: &[u8]) -> Scan {
    match bytes.get(1) {
        None => Scan::Complete { len: 1, last: ESC },
        Some(b'[') => {
            for (i, &b) in bytes.iter().enumerate().skip(2) {
                if (0x40..=0x7e).contains(&b) {
                    return Scan::Complete { len: i + 1, last: b };
                }
            }
            Scan::Incomplete
        }
        Some(b'O') => match bytes.get(2) {
            Some(&last) => Scan::Complete { len: 3, last },
            None => Scan::Incomplete,
        },
        Some(&last) => Scan::Complete { len: 2, last },
    }
}

fn parse_position_report(params: &[u8]) -> Option<(u16, u16)> {
    let text = std::str::from_utf8(params).ok()?;
    let (rows, cols) = text.split_once(';')?;
    Some((cols.parse().ok()?, rows.parse().ok()?))
}

#[async_trait]
impl InputHandler for AnsiHandler {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError> {
        if input.carried {
            return Ok(true);
        }
        let mut bytes = std::mem::take(&mut state.ansi_pending);
        bytes.extend_from_slice(&input.data_in);
        if !bytes.contains(&ESC) {
            input.data_in = bytes;
            return Ok(true);
        }

        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != ESC {
                out.push(bytes[i]);
                i += 1;
                continue;
            }
            match scan(&bytes[i..]) {
                Scan::Incomplete => {
                    if bytes.len() - i <= MAX_PENDING {
                        state.ansi_pending = bytes[i..].to_vec();
                    } else {
                        tracing::trace!(connection_id = %state.connection_id(), "Dropped runaway escape sequence");
                    }
                    break;
                }
                Scan::Complete { len, last } => {
                    match last {
                        b'A' => input.navigation = Some(HistoryNav::Previous),
                        b'B' => input.navigation = Some(HistoryNav::Next),
                        b'R' if len > 3 => {
                            if let Some(size) = parse_position_report(&bytes[i + 2..i + len - 1]) {
                                state.telnet.window_size = Some(size);
                            }
                        }
                        _ => {}
                    }
                    i += len;
                }
            }
        }
        input.data_in = out;
        Ok(true)
    }
}
