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

//! Emberhold Common Types
//!
//! This crate defines the persisted player data shared across Emberhold:
//! - User records and permission tiers
//! - Characters carried by a user
//! - Username and password rules

pub mod character;
pub mod user;

pub use character::Character;
pub use user::{Permission, UserId, UserRecord, ValidationError};
