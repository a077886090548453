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


//! Tab completion candidates for one connection

/// Round-robin cursor over the completions of the current partial input
#[derive(Debug, Default)]
pub struct Suggestions {
    candidates: Vec<String>,
    position: usize,
}

impl Suggestions {
    pub fn set(&mut self, candidates: Vec<String>) {
        self.candidates = candidates;
        self.position = 0;
    }

    /// Next candidate, wrapping to the first after the last
    pub fn next(&mut self) -> Option<&str> {
        if self.candidates.is_empty() {
            return None;
        }
        let index = self.position % self.candidates.len();
        self.position = index + 1;
        self.candidates.get(index).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.position = 0;
    }

    pub fn count(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
