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

//! Per-connection input processing
//!
//! Every read from a transport becomes one input event. The event runs
//! through the connection's [`chain::HandlerChain`], which turns raw bytes
//! into edits of the line being typed and decides when a line is submitted.

pub mod chain;
pub mod handlers;
pub mod state;

use std::collections::VecDeque;

pub use chain::{ChainError, ChainOutcome, HandlerChain, HandlerError, InputHandler};
pub use state::{CloseRequest, ConnectionState};

/// Number of submitted lines remembered per connection
pub const HISTORY_SIZE: usize = 10;

/// Cursor movement through the input history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryNav {
    Previous,
    Next,
}

/// Input being processed for one connection
#[derive(Debug, Default)]
pub struct ClientInput {
    /// Bytes of the current event. Handlers strip or rewrite these.
    pub data_in: Vec<u8>,
    /// The line composed so far
    pub buffer: Vec<u8>,
    pub enter_pressed: bool,
    pub tab_pressed: bool,
    pub bs_pressed: bool,
    /// Characters removed from `buffer` by this event
    pub erased: usize,
    pub navigation: Option<HistoryNav>,
    /// Bytes that arrived after a line terminator, processed as the next event
    pub carry: Vec<u8>,
    /// Set when `data_in` came from `carry`. Those bytes were already decoded.
    pub carried: bool,
    pub history: InputHistory,
    pub(crate) last_was_cr: bool,
}

impl ClientInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new event with `data`. Flags always start cleared.
    pub fn begin(&mut self, data: Vec<u8>) {
        self.data_in = data;
        self.enter_pressed = false;
        self.tab_pressed = false;
        self.bs_pressed = false;
        self.erased = 0;
        self.navigation = None;
        self.carried = false;
    }

    /// Start an event for bytes carried past a line terminator
    pub fn begin_carried(&mut self, data: Vec<u8>) {
        self.begin(data);
        self.carried = true;
    }

    /// Start an event for a complete message line
    pub fn begin_line(&mut self, line: Vec<u8>) {
        self.begin(line.clone());
        let mut line = line;
        while matches!(line.last(), Some(b'\r') | Some(b'\n')) {
            line.pop();
        }
        self.buffer = line;
        self.enter_pressed = true;
    }

    /// Clear the line buffer
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn line(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Take the submitted line, trimmed, leaving the buffer empty
    pub fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        line
    }

    pub fn take_carry(&mut self) -> Option<Vec<u8>> {
        if self.carry.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.carry))
        }
    }

    /// Remove the last character from the buffer, respecting UTF-8
    pub fn erase_char(&mut self) -> bool {
        pop_char(&mut self.buffer)
    }
}

/// Pop one UTF-8 character off the end of `bytes`
pub(crate) fn pop_char(bytes: &mut Vec<u8>) -> bool {
    let mut popped = false;
    while let Some(byte) = bytes.pop() {
        popped = true;
        if byte & 0xC0 != 0x80 {
            break;
        }
    }
    popped
}

/// Ring of recently submitted lines with a navigation cursor
#[derive(Debug, Default)]
pub struct InputHistory {
    entries: VecDeque<String>,
    cursor: Option<usize>,
}

impl InputHistory {
    /// Record a line. Blank lines and immediate repeats are skipped.
    pub fn push(&mut self, line: &str) {
        self.cursor = None;
        let line = line.trim();
        if line.is_empty() || self.entries.back().is_some_and(|last| last == line) {
            return;
        }
        if self.entries.len() == HISTORY_SIZE {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
    }

    /// Step to an older entry
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let index = match self.cursor {
            None => self.entries.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.cursor = Some(index);
        self.entries.get(index).map(String::as_str)
    }

    /// Step to a newer entry. Stepping past the newest yields an empty line.
    pub fn next(&mut self) -> Option<&str> {
        match self.cursor {
            None => None,
            Some(i) if i + 1 >= self.entries.len() => {
                self.cursor = None;
                Some("")
            }
            Some(i) => {
                self.cursor = Some(i + 1);
                self.entries.get(i + 1).map(String::as_str)
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
