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


use crate::config::Configuration;
use crate::registry::SessionRegistry;
use crate::store::UserStore;
use crate::world::{GameRules, World, WorldSettings};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;

/// Server lifecycle phase, broadcast to every connection worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Running,
    /// Listeners are closing; new connections are refused
    NotAccepting,
    /// Transports are closed; connection workers exit
    Closed,
}

/// Requests the shutdown sequence. Any clone can trigger it.
#[derive(Clone)]
pub struct ShutdownSignal(Arc<watch::Sender<bool>>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self(Arc::new(watch::Sender::new(false)))
    }

    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once [`ShutdownSignal::trigger`] has been called
    pub async fn triggered(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Server context containing shared resources
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<Configuration>,

    /// Live connections and bound users
    pub registry: Arc<SessionRegistry>,

    pub store: Arc<UserStore>,

    pub world: World,

    /// Wait group for connection workers, writer pumps and world workers
    pub tracker: TaskTracker,

    phase: Arc<watch::Sender<Phase>>,

    shutdown: ShutdownSignal,
}

impl ServerContext {
    /// Build the context. The world workers start with [`ServerContext::start`].
    pub fn new(config: Configuration, rules: Arc<dyn GameRules>) -> Self {
        let tracker = TaskTracker::new();
        let registry = Arc::new(SessionRegistry::new(tracker.clone()));
        let store = Arc::new(UserStore::from_config(&config.storage));
        let world = World::new(
            rules,
            registry.clone(),
            store.clone(),
            WorldSettings::from(&config.game),
        );
        Self {
            config: Arc::new(config),
            registry,
            store,
            world,
            tracker,
            phase: Arc::new(watch::Sender::new(Phase::Running)),
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn start(&self) -> Result<(), crate::world::WorldError> {
        self.world.start(&self.tracker)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn set_phase(&self, phase: Phase) {
        tracing::debug!(?phase, "Server phase changed");
        self.phase.send_replace(phase);
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}
