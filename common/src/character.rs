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

//! Shared character types

use serde::{Deserialize, Serialize};

/// Adjective shown beside a character whose connection dropped
pub const ZOMBIE_ADJECTIVE: &str = "zombie";

/// The in-world character owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Display name
    pub name: String,

    /// Room the character currently stands in
    pub room_id: i64,

    /// Transient descriptive tags such as "zombie"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjectives: Vec<String>,

    /// Item names carried by the character
    #[serde(default)]
    pub inventory: Vec<String>,
}

impl Character {
    pub fn new(name: impl Into<String>, room_id: i64) -> Self {
        Self {
            name: name.into(),
            room_id,
            adjectives: Vec::new(),
            inventory: Vec::new(),
        }
    }

    /// Add or remove an adjective. Adding an adjective twice keeps one copy.
    pub fn set_adjective(&mut self, adjective: &str, enabled: bool) {
        let present = self.has_adjective(adjective);
        if enabled && !present {
            self.adjectives.push(adjective.to_string());
        } else if !enabled && present {
            self.adjectives.retain(|a| a != adjective);
        }
    }

    pub fn has_adjective(&self, adjective: &str) -> bool {
        self.adjectives.iter().any(|a| a == adjective)
    }

    /// Name decorated with any adjectives, e.g. `Zed (zombie)`
    pub fn display_name(&self) -> String {
        if self.adjectives.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.adjectives.join(", "))
        }
    }
}
