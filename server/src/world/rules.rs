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


//! Command rules applied by the world workers

use crate::world::WorldState;
use emberhold_common::UserId;
use std::fmt::Write;

/// Outcome of a command, delivered after the world lock is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Text for the acting user
    User(String),
    /// Text for everyone in a room except `exclude`
    Room {
        room_id: i64,
        text: String,
        exclude: Vec<UserId>,
    },
    /// Text queued on the broadcast FIFO
    Broadcast { text: String, exclude: Vec<UserId> },
    /// The acting user leaves the world and is disconnected
    Quit,
}

/// Game logic behind the dispatch queue.
///
/// Called only from the world workers, so implementations see every
/// command in arrival order and never run two at once.
pub trait GameRules: Send + Sync {
    fn execute(&self, world: &mut WorldState, user_id: UserId, line: &str) -> Vec<Effect>;

    /// Candidate completions of `partial`, as the text to append
    fn autocomplete(&self, world: &WorldState, user_id: UserId, partial: &str) -> Vec<String>;
}

const VERBS: &[&str] = &["inventory", "look", "quit", "say", "who"];

/// A minimal command set
#[derive(Debug, Default)]
pub struct BasicRules;

impl BasicRules {
    fn look(world: &WorldState, user_id: UserId, room_id: i64) -> String {
        let mut text = format!("Room {}\n", room_id);
        let others: Vec<String> = world
            .in_room(room_id)
            .filter(|p| p.record.user_id != user_id)
            .map(|p| p.record.character.display_name())
            .collect();
        if !others.is_empty() {
            let _ = writeln!(text, "Also here: {}", others.join(", "));
        }
        text
    }

    fn who(world: &WorldState) -> String {
        let mut names: Vec<String> = world
            .players()
            .map(|p| p.record.character.display_name())
            .collect();
        names.sort();
        let mut text = format!("{} player(s) in the world:\n", names.len());
        for name in names {
            let _ = writeln!(text, "  {}", name);
        }
        text
    }
}

impl GameRules for BasicRules {
    fn execute(&self, world: &mut WorldState, user_id: UserId, line: &str) -> Vec<Effect> {
        let world = &*world;
        let Some(player) = world.player(user_id) else {
            return Vec::new();
        };
        let room_id = player.record.character.room_id;
        let name = player.record.character.name.clone();

        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match verb.to_lowercase().as_str() {
            "look" | "l" => vec![Effect::User(Self::look(world, user_id, room_id))],
            "say" if rest.is_empty() => vec![Effect::User("Say what?\n".to_string())],
            "say" => vec![
                Effect::User(format!("You say, \"{}\"\n", rest)),
                Effect::Room {
                    room_id,
                    text: format!("{} says, \"{}\"\n", name, rest),
                    exclude: vec![user_id],
                },
            ],
            "who" => vec![Effect::User(Self::who(world))],
            "inventory" | "inv" | "i" => {
                let items = &player.record.character.inventory;
                let text = if items.is_empty() {
                    "You are carrying nothing.\n".to_string()
                } else {
                    format!("You are carrying: {}\n", items.join(", "))
                };
                vec![Effect::User(text)]
            }
            "quit" => vec![Effect::User("Goodbye.\n".to_string()), Effect::Quit],
            other => vec![Effect::User(format!("Unknown command '{}'.\n", other))],
        }
    }

    fn autocomplete(&self, world: &WorldState, user_id: UserId, partial: &str) -> Vec<String> {
        let lower = partial.to_lowercase();
        match lower.split_once(' ') {
            None if lower.is_empty() => Vec::new(),
            None => VERBS
                .iter()
                .filter(|verb| verb.starts_with(&lower) && verb.len() > lower.len())
                .map(|verb| verb[lower.len()..].to_string())
                .collect(),
            // Names of other players in the room complete the argument
            Some((_, arg)) if !arg.is_empty() => {
                let Some(room_id) = world.player(user_id).map(|p| p.record.character.room_id) else {
                    return Vec::new();
                };
                let mut names: Vec<String> = world
                    .in_room(room_id)
                    .filter(|p| p.record.user_id != user_id)
                    .map(|p| p.record.character.name.clone())
                    .filter(|name| {
                        let name = name.to_lowercase();
                        name.starts_with(arg) && name.len() > arg.len()
                    })
                    .map(|name| name[arg.len()..].to_string())
                    .collect();
                names.sort();
                names
            }
            Some(_) => Vec::new(),
        }
    }
}
