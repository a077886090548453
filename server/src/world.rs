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


//! Dispatch queues and the world workers
//!
//! Connection workers never touch player state directly. They push
//! [`WorldInput`]s and [`Broadcast`]s onto two FIFOs, and two dedicated
//! workers apply them: the input worker drains the queues in arrival order
//! and the main worker advances the turn clock and expires zombies.

pub mod rules;

pub use rules::{BasicRules, Effect, GameRules};

use crate::config::GameConfig;
use crate::registry::{ConnectionId, SessionRegistry};
use crate::store::UserStore;
use emberhold_common::character::ZOMBIE_ADJECTIVE;
use emberhold_common::{UserId, UserRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::task::TaskTracker;

/// Number of dedicated workers that each take one shutdown token
pub const WORKER_COUNT: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("the world is no longer accepting input")]
    Closed,
    #[error("world workers already started")]
    AlreadyStarted,
}

/// Items on the command FIFO
#[derive(Debug)]
pub enum WorldInput {
    Enter {
        record: Box<UserRecord>,
        connection: ConnectionId,
    },
    Reconnected {
        user_id: UserId,
        connection: ConnectionId,
    },
    Zombie {
        user_id: UserId,
    },
    Leave {
        user_id: UserId,
    },
    Command {
        user_id: UserId,
        text: String,
    },
}

/// Items on the broadcast FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub text: String,
    pub exclude: Vec<UserId>,
}

/// A player resident in the world
#[derive(Debug, Clone)]
pub struct Player {
    pub record: UserRecord,
    pub connection: ConnectionId,
}

/// Authoritative player state, keyed by user id
#[derive(Debug, Default)]
pub struct WorldState {
    players: HashMap<UserId, Player>,
}

impl WorldState {
    pub fn insert(&mut self, record: UserRecord, connection: ConnectionId) {
        self.players
            .insert(record.user_id, Player { record, connection });
    }

    pub fn remove(&mut self, user_id: UserId) -> Option<Player> {
        self.players.remove(&user_id)
    }

    pub fn player(&self, user_id: UserId) -> Option<&Player> {
        self.players.get(&user_id)
    }

    pub fn player_mut(&mut self, user_id: UserId) -> Option<&mut Player> {
        self.players.get_mut(&user_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn in_room(&self, room_id: i64) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(move |p| p.record.character.room_id == room_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Timing and presentation settings for the workers
#[derive(Debug, Clone)]
pub struct WorldSettings {
    pub turn: Duration,
    /// Turns a zombie may linger; `None` disables expiry
    pub zombie_expiration: Option<u64>,
    pub prompt: String,
}

impl From<&GameConfig> for WorldSettings {
    fn from(config: &GameConfig) -> Self {
        Self {
            turn: config.turn_duration(),
            zombie_expiration: config
                .zombies_enabled()
                .then(|| config.zombie_expiration()),
            prompt: config.prompt.clone(),
        }
    }
}

struct Queues {
    inputs: mpsc::UnboundedReceiver<WorldInput>,
    broadcasts: mpsc::UnboundedReceiver<Broadcast>,
}

struct Shared {
    state: RwLock<WorldState>,
    turn: AtomicU64,
    accepting: AtomicBool,
    rules: Arc<dyn GameRules>,
    registry: Arc<SessionRegistry>,
    store: Arc<UserStore>,
    settings: WorldSettings,
    inputs: mpsc::UnboundedSender<WorldInput>,
    broadcasts: mpsc::UnboundedSender<Broadcast>,
    queues: std::sync::Mutex<Option<Queues>>,
    control: mpsc::Sender<()>,
    control_rx: Arc<Mutex<mpsc::Receiver<()>>>,
}

/// Handle to the world. Cloning shares the same queues and state.
#[derive(Clone)]
pub struct World {
    shared: Arc<Shared>,
}

impl World {
    pub fn new(
        rules: Arc<dyn GameRules>,
        registry: Arc<SessionRegistry>,
        store: Arc<UserStore>,
        settings: WorldSettings,
    ) -> Self {
        let (inputs, inputs_rx) = mpsc::unbounded_channel();
        let (broadcasts, broadcasts_rx) = mpsc::unbounded_channel();
        let (control, control_rx) = mpsc::channel(WORKER_COUNT);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(WorldState::default()),
                turn: AtomicU64::new(0),
                accepting: AtomicBool::new(true),
                rules,
                registry,
                store,
                settings,
                inputs,
                broadcasts,
                queues: std::sync::Mutex::new(Some(Queues {
                    inputs: inputs_rx,
                    broadcasts: broadcasts_rx,
                })),
                control,
                control_rx: Arc::new(Mutex::new(control_rx)),
            }),
        }
    }

    /// Spawn the input and main workers on `tracker`
    pub fn start(&self, tracker: &TaskTracker) -> Result<(), WorldError> {
        let queues = self
            .shared
            .queues
            .lock()
            .ok()
            .and_then(|mut queues| queues.take())
            .ok_or(WorldError::AlreadyStarted)?;
        let (drained_tx, drained_rx) = oneshot::channel();
        tracker.spawn(input_worker(self.shared.clone(), queues, drained_tx));
        tracker.spawn(main_worker(self.shared.clone(), drained_rx));
        tracing::info!(turn = ?self.shared.settings.turn, "World workers started");
        Ok(())
    }

    pub fn submit(&self, input: WorldInput) -> Result<(), WorldError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(WorldError::Closed);
        }
        self.shared.inputs.send(input).map_err(|_| WorldError::Closed)
    }

    pub fn command(&self, user_id: UserId, text: impl Into<String>) -> Result<(), WorldError> {
        self.submit(WorldInput::Command {
            user_id,
            text: text.into(),
        })
    }

    pub fn broadcast(&self, text: impl Into<String>, exclude: Vec<UserId>) -> Result<(), WorldError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(WorldError::Closed);
        }
        self.shared
            .broadcasts
            .send(Broadcast {
                text: text.into(),
                exclude,
            })
            .map_err(|_| WorldError::Closed)
    }

    /// Current value of the turn clock
    pub fn turn(&self) -> u64 {
        self.shared.turn.load(Ordering::SeqCst)
    }

    pub async fn autocomplete(&self, user_id: UserId, partial: &str) -> Vec<String> {
        let state = self.shared.state.read().await;
        self.shared.rules.autocomplete(&state, user_id, partial)
    }

    /// Snapshot of a resident player's record
    pub async fn player(&self, user_id: UserId) -> Option<UserRecord> {
        let state = self.shared.state.read().await;
        state.player(user_id).map(|p| p.record.clone())
    }

    pub async fn population(&self) -> usize {
        self.shared.state.read().await.len()
    }

    /// Send one shutdown token per worker. The workers finish what is
    /// already queued before exiting.
    pub async fn shutdown(&self) {
        for _ in 0..WORKER_COUNT {
            if self.shared.control.send(()).await.is_err() {
                break;
            }
        }
    }
}

async fn next_token(control: &Mutex<mpsc::Receiver<()>>) -> Option<()> {
    control.lock().await.recv().await
}

async fn input_worker(shared: Arc<Shared>, mut queues: Queues, drained: oneshot::Sender<()>) {
    loop {
        tokio::select! {
            biased;
            Some(input) = queues.inputs.recv() => shared.apply(input).await,
            Some(broadcast) = queues.broadcasts.recv() => shared.deliver(broadcast).await,
            _ = next_token(&shared.control_rx) => break,
        }
    }

    shared.accepting.store(false, Ordering::SeqCst);
    let mut applied = 0usize;
    while let Ok(input) = queues.inputs.try_recv() {
        shared.apply(input).await;
        applied += 1;
    }
    while let Ok(broadcast) = queues.broadcasts.try_recv() {
        shared.deliver(broadcast).await;
        applied += 1;
    }
    tracing::info!(drained = applied, "Input worker stopped");
    let _ = drained.send(());
}

async fn main_worker(shared: Arc<Shared>, drained: oneshot::Receiver<()>) {
    let mut interval = tokio::time::interval(shared.settings.turn);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let turn = shared.turn.fetch_add(1, Ordering::SeqCst) + 1;
                shared.expire_zombies(turn).await;
            }
            _ = next_token(&shared.control_rx) => break,
        }
    }

    let _ = drained.await;
    shared.save_all().await;
    tracing::info!("Main worker stopped");
}

impl Shared {
    async fn apply(&self, input: WorldInput) {
        match input {
            WorldInput::Enter { record, connection } => self.enter(*record, connection).await,
            WorldInput::Reconnected {
                user_id,
                connection,
            } => self.reconnected(user_id, connection).await,
            WorldInput::Zombie { user_id } => self.zombie(user_id).await,
            WorldInput::Leave { user_id } => self.leave(user_id).await,
            WorldInput::Command { user_id, text } => self.command(user_id, &text).await,
        }
    }

    async fn enter(&self, record: UserRecord, connection: ConnectionId) {
        // A leave for the same user may have saved a newer copy
        let mut record = match self.store.load(&record.username).await {
            Ok(Some(stored)) => stored,
            Ok(None) => record,
            Err(e) => {
                tracing::warn!(user_id = record.user_id, "Failed to reload user record: {}", e);
                record
            }
        };
        record.character.set_adjective(ZOMBIE_ADJECTIVE, false);
        let user_id = record.user_id;
        let room_id = record.character.room_id;
        let name = record.character.name.clone();

        let effects = {
            let mut state = self.state.write().await;
            state.insert(record, connection);
            self.rules.execute(&mut state, user_id, "look")
        };
        tracing::info!(user_id, %connection, room_id, "Player entered the world");
        self.to_room(room_id, &format!("{} enters.\n", name), &[user_id])
            .await;
        self.dispatch(user_id, effects).await;
    }

    async fn reconnected(&self, user_id: UserId, connection: ConnectionId) {
        let resumed = {
            let mut state = self.state.write().await;
            match state.player_mut(user_id) {
                Some(player) => {
                    player.connection = connection;
                    player
                        .record
                        .character
                        .set_adjective(ZOMBIE_ADJECTIVE, false);
                    let room_id = player.record.character.room_id;
                    let name = player.record.character.name.clone();
                    let effects = self.rules.execute(&mut state, user_id, "look");
                    Some((room_id, name, effects))
                }
                None => None,
            }
        };
        match resumed {
            Some((room_id, name, effects)) => {
                tracing::info!(user_id, %connection, "Player resumed");
                self.to_room(room_id, &format!("{} wakes up.\n", name), &[user_id])
                    .await;
                self.dispatch(user_id, effects).await;
            }
            None => tracing::warn!(user_id, %connection, "Reconnected user is not in the world"),
        }
    }

    async fn zombie(&self, user_id: UserId) {
        let located = {
            let mut state = self.state.write().await;
            state.player_mut(user_id).map(|player| {
                player
                    .record
                    .character
                    .set_adjective(ZOMBIE_ADJECTIVE, true);
                (player.record.character.room_id, player.record.character.name.clone())
            })
        };
        if let Some((room_id, name)) = located {
            self.to_room(room_id, &format!("{} goes still.\n", name), &[user_id])
                .await;
        }
    }

    /// Remove a player, save them and release their binding
    async fn leave(&self, user_id: UserId) {
        let removed = self.state.write().await.remove(user_id);
        self.registry.unbind_user(user_id).await;
        if let Some(mut player) = removed {
            player
                .record
                .character
                .set_adjective(ZOMBIE_ADJECTIVE, false);
            self.save(&player.record).await;
            tracing::info!(user_id, "Player left the world");
            self.to_room(
                player.record.character.room_id,
                &format!("{} leaves.\n", player.record.character.name),
                &[],
            )
            .await;
        }
    }

    async fn command(&self, user_id: UserId, text: &str) {
        let effects = {
            let mut state = self.state.write().await;
            if state.player(user_id).is_none() {
                tracing::debug!(user_id, "Command from user not in the world");
                return;
            }
            self.rules.execute(&mut state, user_id, text)
        };
        self.dispatch(user_id, effects).await;
    }

    async fn dispatch(&self, user_id: UserId, effects: Vec<Effect>) {
        let mut quit = false;
        for effect in effects {
            match effect {
                Effect::User(text) => {
                    self.registry.send_to_user(user_id, &text).await;
                }
                Effect::Room {
                    room_id,
                    text,
                    exclude,
                } => self.to_room(room_id, &text, &exclude).await,
                Effect::Broadcast { text, exclude } => {
                    let _ = self.broadcasts.send(Broadcast { text, exclude });
                }
                Effect::Quit => quit = true,
            }
        }
        if quit {
            let connection = self.registry.lookup_by_user(user_id).await;
            self.leave(user_id).await;
            if let Some(connection) = connection {
                connection.close();
            }
        } else {
            self.registry
                .send_to_user(user_id, &self.settings.prompt)
                .await;
        }
    }

    async fn deliver(&self, broadcast: Broadcast) {
        self.registry
            .broadcast(&broadcast.text, &broadcast.exclude)
            .await;
    }

    async fn to_room(&self, room_id: i64, text: &str, exclude: &[UserId]) {
        let recipients: Vec<UserId> = self
            .state
            .read()
            .await
            .in_room(room_id)
            .map(|p| p.record.user_id)
            .filter(|id| !exclude.contains(id))
            .collect();
        for user_id in recipients {
            self.registry.send_to_user(user_id, text).await;
        }
    }

    async fn expire_zombies(&self, turn: u64) {
        let Some(expiration) = self.settings.zombie_expiration else {
            return;
        };
        let Some(threshold) = turn.checked_sub(expiration) else {
            return;
        };
        for user_id in self.registry.list_expired_zombies(threshold).await {
            // Binding and world presence go together so no login lands in between
            let removed = {
                let mut state = self.state.write().await;
                if self.registry.expire_zombie(user_id, threshold).await.is_none() {
                    continue;
                }
                state.remove(user_id)
            };
            if let Some(mut player) = removed {
                player
                    .record
                    .character
                    .set_adjective(ZOMBIE_ADJECTIVE, false);
                self.save(&player.record).await;
                tracing::info!(user_id, turn, "Zombie removed from the world");
                self.to_room(
                    player.record.character.room_id,
                    &format!("{} crumbles to dust.\n", player.record.character.name),
                    &[],
                )
                .await;
            }
        }
    }

    async fn save(&self, record: &UserRecord) {
        if let Err(e) = self.store.save(record).await {
            tracing::error!(user_id = record.user_id, username = %record.username, "Failed to save user: {}", e);
        }
    }

    async fn save_all(&self) {
        let players: Vec<UserRecord> = self
            .state
            .read()
            .await
            .players()
            .map(|p| {
                let mut record = p.record.clone();
                record.character.set_adjective(ZOMBIE_ADJECTIVE, false);
                record
            })
            .collect();
        for record in &players {
            self.save(record).await;
        }
        tracing::info!(saved = players.len(), "Saved resident players");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Bound;
    use crate::registry::test_utils::{RecordingWriter, connect, user};
    use crate::store::test_utils::temp_store;
    use crate::transport::TransportKind;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Rules that record every command they see
    #[derive(Default)]
    struct Recording {
        seen: StdMutex<Vec<(UserId, String)>>,
    }

    impl GameRules for Recording {
        fn execute(&self, _world: &mut WorldState, user_id: UserId, line: &str) -> Vec<Effect> {
            self.seen.lock().unwrap().push((user_id, line.to_string()));
            Vec::new()
        }

        fn autocomplete(&self, _world: &WorldState, _user_id: UserId, _partial: &str) -> Vec<String> {
            Vec::new()
        }
    }

    /// Rules where `wander` moves the player and picks up a lantern
    struct Wandering;

    impl GameRules for Wandering {
        fn execute(&self, world: &mut WorldState, user_id: UserId, line: &str) -> Vec<Effect> {
            if line == "wander" {
                if let Some(player) = world.player_mut(user_id) {
                    player.record.character.room_id = 7;
                    player.record.character.inventory.push("lantern".to_string());
                }
            }
            Vec::new()
        }

        fn autocomplete(&self, _world: &WorldState, _user_id: UserId, _partial: &str) -> Vec<String> {
            Vec::new()
        }
    }

    struct Fixture {
        world: World,
        registry: Arc<SessionRegistry>,
        store: Arc<UserStore>,
        tracker: TaskTracker,
        _dir: TempDir,
    }

    fn fixture(rules: Arc<dyn GameRules>, expiration: Option<u64>) -> Fixture {
        let tracker = TaskTracker::new();
        let registry = Arc::new(SessionRegistry::new(tracker.clone()));
        let (store, dir) = temp_store();
        let store = Arc::new(store);
        let settings = WorldSettings {
            turn: Duration::from_millis(10),
            zombie_expiration: expiration,
            prompt: "> ".to_string(),
        };
        let world = World::new(rules, registry.clone(), store.clone(), settings);
        Fixture {
            world,
            registry,
            store,
            tracker,
            _dir: dir,
        }
    }

    async fn enter(f: &Fixture, user_id: UserId, name: &str) -> (ConnectionId, RecordingWriter) {
        let (handle, out) = connect(&f.registry, TransportKind::WebSocket).await;
        f.registry.bind(handle.id(), user(user_id, name)).await.unwrap();
        let record = UserRecord::new(user_id, name, "x", 1);
        f.world
            .submit(WorldInput::Enter {
                record: Box::new(record),
                connection: handle.id(),
            })
            .unwrap();
        (handle.id(), out)
    }

    async fn wait_for_player(
        f: &Fixture,
        user_id: UserId,
        ready: impl Fn(&UserRecord) -> bool,
    ) -> UserRecord {
        for _ in 0..200 {
            if let Some(record) = f.world.player(user_id).await {
                if ready(&record) {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("player {} never reached the expected state", user_id);
    }

    async fn stop(f: &Fixture) {
        f.world.shutdown().await;
        f.tracker.close();
        f.registry.close_all().await;
        f.tracker.wait().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_commands() {
        let rules = Arc::new(Recording::default());
        let f = fixture(rules.clone(), None);
        enter(&f, 1, "zed").await;
        for i in 0..50 {
            f.world.command(1, format!("cmd {}", i)).unwrap();
        }
        f.world.start(&f.tracker).unwrap();
        stop(&f).await;

        let seen = rules.seen.lock().unwrap();
        // The first entry is the look issued on entering
        assert_eq!(seen.len(), 51);
        assert_eq!(seen[1].1, "cmd 0");
        assert_eq!(seen[50].1, "cmd 49");
        assert!(matches!(f.world.command(1, "late"), Err(WorldError::Closed)));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let f = fixture(Arc::new(BasicRules), None);
        f.world.start(&f.tracker).unwrap();
        assert!(matches!(f.world.start(&f.tracker), Err(WorldError::AlreadyStarted)));
        stop(&f).await;
    }

    #[tokio::test]
    async fn test_say_and_broadcast_delivery() {
        let f = fixture(Arc::new(BasicRules), None);
        let (_, zed_out) = enter(&f, 1, "zed").await;
        let (_, amy_out) = enter(&f, 2, "amy").await;
        f.world.command(1, "say hi").unwrap();
        f.world.broadcast("News!\n", vec![2]).unwrap();
        f.world.start(&f.tracker).unwrap();
        stop(&f).await;

        assert!(zed_out.text().contains("You say, \"hi\"\n"));
        assert!(amy_out.text().contains("zed says, \"hi\"\n"));
        assert!(zed_out.text().contains("News!\n"));
        assert!(!amy_out.text().contains("News!"));
    }

    #[tokio::test]
    async fn test_zombie_tagged_then_expired_and_saved() {
        let f = fixture(Arc::new(BasicRules), Some(2));
        enter(&f, 1, "zed").await;
        f.world.submit(WorldInput::Zombie { user_id: 1 }).unwrap();
        f.registry.mark_zombie(1, 0).await;
        f.world.start(&f.tracker).unwrap();

        let mut waited = 0;
        while f.world.population().await > 0 && waited < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(f.world.population().await, 0);
        assert!(f.registry.lookup_by_username("zed").await.is_none());
        let saved = f.store.load("zed").await.unwrap().unwrap();
        assert!(!saved.character.has_adjective(ZOMBIE_ADJECTIVE));
        stop(&f).await;
    }

    #[tokio::test]
    async fn test_quit_leaves_and_closes() {
        let f = fixture(Arc::new(BasicRules), None);
        let (_, out) = enter(&f, 1, "zed").await;
        f.world.command(1, "quit").unwrap();
        f.world.start(&f.tracker).unwrap();
        stop(&f).await;

        assert!(out.text().contains("Goodbye."));
        assert!(out.is_closed());
        assert!(f.registry.lookup_by_username("zed").await.is_none());
        assert!(f.store.exists("zed").await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_saves_resident_players() {
        let f = fixture(Arc::new(BasicRules), None);
        enter(&f, 1, "zed").await;
        f.world.start(&f.tracker).unwrap();
        stop(&f).await;
        assert!(f.store.exists("zed").await.unwrap());
    }

    #[tokio::test]
    async fn test_reconnect_keeps_unsaved_state() {
        let f = fixture(Arc::new(Wandering), None);
        enter(&f, 1, "zed").await;
        f.world.start(&f.tracker).unwrap();
        f.world.command(1, "wander").unwrap();
        wait_for_player(&f, 1, |r| r.character.room_id == 7).await;

        f.registry.mark_zombie(1, f.world.turn()).await;
        f.world.submit(WorldInput::Zombie { user_id: 1 }).unwrap();
        wait_for_player(&f, 1, |r| r.character.has_adjective(ZOMBIE_ADJECTIVE)).await;

        let (handle, _out) = connect(&f.registry, TransportKind::Telnet).await;
        let bound = f.registry.bind(handle.id(), user(1, "zed")).await.unwrap();
        assert!(matches!(bound, Bound::Reconnected(_)));
        f.world
            .submit(WorldInput::Reconnected {
                user_id: 1,
                connection: handle.id(),
            })
            .unwrap();
        let record =
            wait_for_player(&f, 1, |r| !r.character.has_adjective(ZOMBIE_ADJECTIVE)).await;

        assert_eq!(record.character.room_id, 7);
        assert_eq!(record.character.inventory, vec!["lantern".to_string()]);
        // Nothing was saved, so the state above cannot have come from disk
        assert!(f.store.load("zed").await.unwrap().is_none());
        stop(&f).await;
    }

    #[tokio::test]
    async fn test_expired_zombie_leaves_world_with_binding() {
        let f = fixture(Arc::new(BasicRules), Some(1));
        enter(&f, 1, "zed").await;
        f.world.submit(WorldInput::Zombie { user_id: 1 }).unwrap();
        f.registry.mark_zombie(1, 0).await;
        f.world.start(&f.tracker).unwrap();

        let mut released = false;
        for _ in 0..400 {
            if f.registry.lookup_by_username("zed").await.is_none() {
                assert!(f.world.player(1).await.is_none(), "binding released while zed was resident");
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(released);

        let (handle, _out) = connect(&f.registry, TransportKind::Telnet).await;
        let bound = f.registry.bind(handle.id(), user(1, "zed")).await.unwrap();
        assert!(matches!(bound, Bound::Fresh(_)));
        let record = f.store.load("zed").await.unwrap().unwrap();
        f.world
            .submit(WorldInput::Enter {
                record: Box::new(record),
                connection: handle.id(),
            })
            .unwrap();
        wait_for_player(&f, 1, |r| !r.character.has_adjective(ZOMBIE_ADJECTIVE)).await;
        assert_eq!(f.world.population().await, 1);
        stop(&f).await;
    }
}
