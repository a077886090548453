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

//! Ordered, named input handler chain

use crate::input::{ClientInput, ConnectionState};
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::transport::TransportError;
use crate::world::WorldError;
use async_trait::async_trait;
use std::sync::Arc;

/// One stage of input processing.
///
/// Returning `Ok(false)` stops the chain for the current event.
#[async_trait]
pub trait InputHandler: Send + Sync {
    async fn handle(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<bool, HandlerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("user store: {0}")]
    Store(#[from] StoreError),
    #[error("world: {0}")]
    World(#[from] WorldError),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("a handler named '{0}' is already installed")]
    Duplicate(String),
    #[error("handler '{name}' failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: HandlerError,
    },
}

/// Result of running the chain over one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub continue_processing: bool,
    /// Name of the last handler that ran
    pub last_handler: Option<String>,
}

struct ChainEntry {
    name: String,
    handler: Arc<dyn InputHandler>,
}

/// Handlers run in order. Names are unique within a chain.
#[derive(Default)]
pub struct HandlerChain {
    entries: Vec<ChainEntry>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler
    pub fn add(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn InputHandler>,
    ) -> Result<(), ChainError> {
        let name = self.check_unique(name.into())?;
        self.entries.push(ChainEntry { name, handler });
        Ok(())
    }

    /// Insert immediately before `anchor`, or append if `anchor` is absent
    pub fn insert_before(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        handler: Arc<dyn InputHandler>,
    ) -> Result<(), ChainError> {
        let name = self.check_unique(name.into())?;
        let index = self.position(anchor).unwrap_or(self.entries.len());
        self.entries.insert(index, ChainEntry { name, handler });
        Ok(())
    }

    /// Insert immediately after `anchor`, or append if `anchor` is absent
    pub fn insert_after(
        &mut self,
        anchor: &str,
        name: impl Into<String>,
        handler: Arc<dyn InputHandler>,
    ) -> Result<(), ChainError> {
        let name = self.check_unique(name.into())?;
        let index = self
            .position(anchor)
            .map(|i| i + 1)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, ChainEntry { name, handler });
        Ok(())
    }

    /// Remove by name. Removing an absent name does nothing.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InputHandler>> {
        self.position(name)
            .map(|index| Arc::clone(&self.entries[index].handler))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every handler in order until one stops the chain or fails
    pub async fn run(
        &self,
        input: &mut ClientInput,
        state: &mut ConnectionState,
    ) -> Result<ChainOutcome, ChainError> {
        let mut last_handler = None;
        for entry in &self.entries {
            last_handler = Some(entry.name.clone());
            let proceed =
                entry
                    .handler
                    .handle(input, state)
                    .await
                    .map_err(|source| ChainError::Handler {
                        name: entry.name.clone(),
                        source,
                    })?;
            if !proceed {
                return Ok(ChainOutcome {
                    continue_processing: false,
                    last_handler,
                });
            }
        }
        Ok(ChainOutcome {
            continue_processing: true,
            last_handler,
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn check_unique(&self, name: String) -> Result<String, ChainError> {
        if self.contains(&name) {
            Err(ChainError::Duplicate(name))
        } else {
            Ok(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::state::test_utils::test_state;

    /// Appends its tag to the line buffer and optionally stops the chain
    struct Marker {
        tag: u8,
        proceed: bool,
    }

    #[async_trait]
    impl InputHandler for Marker {
        async fn handle(
            &self,
            input: &mut ClientInput,
            _state: &mut ConnectionState,
        ) -> Result<bool, HandlerError> {
            input.buffer.push(self.tag);
            Ok(self.proceed)
        }
    }

    struct Failing;

    #[async_trait]
    impl InputHandler for Failing {
        async fn handle(
            &self,
            _input: &mut ClientInput,
            _state: &mut ConnectionState,
        ) -> Result<bool, HandlerError> {
            Err(HandlerError::Transport(TransportError::Closed))
        }
    }

    fn marker(tag: u8) -> Arc<dyn InputHandler> {
        Arc::new(Marker { tag, proceed: true })
    }

    fn chain_of(names: &[&str]) -> HandlerChain {
        let mut chain = HandlerChain::new();
        for name in names {
            chain.add(*name, marker(name.as_bytes()[0])).unwrap();
        }
        chain
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut chain = chain_of(&["a", "b"]);
        let err = chain.add("a", marker(b'x')).unwrap_err();
        assert!(matches!(err, ChainError::Duplicate(name) if name == "a"));
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_insert_before_and_after_preserve_order() {
        let mut chain = chain_of(&["a", "b", "c"]);
        chain.insert_after("a", "x", marker(b'x')).unwrap();
        chain.insert_before("c", "y", marker(b'y')).unwrap();
        chain.insert_before("a", "z", marker(b'z')).unwrap();
        assert_eq!(chain.names(), vec!["z", "a", "x", "b", "y", "c"]);
    }

    #[test]
    fn test_insert_with_missing_anchor_appends() {
        let mut chain = chain_of(&["a", "b"]);
        chain.insert_after("missing", "x", marker(b'x')).unwrap();
        chain.insert_before("missing", "y", marker(b'y')).unwrap();
        assert_eq!(chain.names(), vec!["a", "b", "x", "y"]);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut chain = chain_of(&["a", "b"]);
        assert!(!chain.remove("missing"));
        assert_eq!(chain.names(), vec!["a", "b"]);
        assert!(chain.remove("a"));
        assert_eq!(chain.names(), vec!["b"]);
        assert!(chain.get("b").is_some());
        assert!(chain.get("a").is_none());
    }

    #[tokio::test]
    async fn test_run_in_order_and_short_circuit() {
        let mut chain = chain_of(&["a", "b"]);
        chain
            .add("s", Arc::new(Marker { tag: b's', proceed: false }))
            .unwrap();
        chain.add("d", marker(b'd')).unwrap();

        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        let outcome = chain.run(&mut input, &mut state).await.unwrap();

        assert_eq!(input.buffer, b"abs");
        assert_eq!(
            outcome,
            ChainOutcome {
                continue_processing: false,
                last_handler: Some("s".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_run_completes_with_last_handler() {
        let chain = chain_of(&["a", "b"]);
        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        let outcome = chain.run(&mut input, &mut state).await.unwrap();
        assert!(outcome.continue_processing);
        assert_eq!(outcome.last_handler.as_deref(), Some("b"));

        let empty = HandlerChain::new();
        let outcome = empty.run(&mut input, &mut state).await.unwrap();
        assert!(outcome.continue_processing);
        assert_eq!(outcome.last_handler, None);
    }

    #[tokio::test]
    async fn test_error_names_failing_handler() {
        let mut chain = chain_of(&["a"]);
        chain.add("broken", Arc::new(Failing)).unwrap();
        chain.add("b", marker(b'b')).unwrap();

        let (mut state, _out) = test_state().await;
        let mut input = ClientInput::new();
        let err = chain.run(&mut input, &mut state).await.unwrap_err();
        assert!(matches!(err, ChainError::Handler { ref name, .. } if name == "broken"));
        assert_eq!(input.buffer, b"a");
    }
}
