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

//! Session registry
//!
//! Process-wide table of live connections and the users bound to them. Every
//! lookup and mutation goes through one lock, which makes "is this username
//! online" and the zombie reconnect hand-off atomic with respect to
//! concurrent logins.

use crate::session::SessionState;
use crate::transport::{TransportError, TransportKind, TransportWriter};
use chrono::{DateTime, Utc};
use emberhold_common::{Permission, UserId, UserRecord};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tokio_util::task::TaskTracker;

/// Process-unique connection identifier. Identifiers are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[cfg(test)]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message types for a connection's outbound pump
#[derive(Debug)]
pub enum Outbound {
    /// Bytes to write
    Data(Vec<u8>),
    /// Close the transport once everything queued before it is written
    Close,
}

/// Connection handle for writing to an individual connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    kind: TransportKind,
    addr: SocketAddr,
    connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue raw bytes
    pub fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.sender
            .send(Outbound::Data(data))
            .map_err(|_| TransportError::Closed)
    }

    /// Queue text, translating bare newlines to CRLF for telnet clients
    pub fn send_text(&self, text: &str) -> Result<(), TransportError> {
        match self.kind {
            TransportKind::Telnet => self.send(to_crlf(text).into_bytes()),
            TransportKind::WebSocket => self.send(text.as_bytes().to_vec()),
        }
    }

    /// Ask the pump to close the transport after pending writes
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

pub(crate) fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut previous = '\0';
    for c in text.chars() {
        if c == '\n' && previous != '\r' {
            out.push('\r');
        }
        out.push(c);
        previous = c;
    }
    out
}

async fn pump(
    id: ConnectionId,
    mut writer: Box<dyn TransportWriter>,
    mut receiver: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            Outbound::Data(data) => {
                if let Err(e) = writer.write(&data).await {
                    tracing::debug!(connection_id = %id, "Write failed: {}", e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    if let Err(e) = writer.close().await {
        tracing::trace!(connection_id = %id, "Close failed: {}", e);
    }
}

/// The user identity bound to a connection while logged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: UserId,
    pub username: String,
    pub permission: Permission,
}

impl From<&UserRecord> for SessionUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.user_id,
            username: record.username.clone(),
            permission: record.permission,
        }
    }
}

/// Result of a successful bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    /// First login for this username
    Fresh(SessionUser),
    /// Took over a zombie; the returned identity is the one already in the world
    Reconnected(SessionUser),
}

impl Bound {
    pub fn user(&self) -> &SessionUser {
        match self {
            Bound::Fresh(user) | Bound::Reconnected(user) => user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("user '{0}' is already logged in")]
    AlreadyLoggedIn(String),
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("connection {0} already has a user bound")]
    AlreadyBound(ConnectionId),
}

/// A user currently present, whether connected or zombie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineUser {
    pub user: SessionUser,
    pub connection: ConnectionId,
    pub zombie: bool,
}

/// Lifetime connection statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total_connections: u64,
    pub total_disconnections: u64,
}

impl ConnectionStats {
    pub fn active(&self) -> u64 {
        self.total_connections.saturating_sub(self.total_disconnections)
    }
}

#[derive(Debug)]
struct Binding {
    user: SessionUser,
    connection: ConnectionId,
    state: SessionState,
}

#[derive(Debug, Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    users: HashMap<UserId, Binding>,
    usernames: HashMap<String, UserId>,
    by_connection: HashMap<ConnectionId, UserId>,
    /// Connection of a zombie user, mapped to the turn it went zombie
    zombies: HashMap<ConnectionId, u64>,
}

pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    next_id: AtomicU64,
    total_connections: AtomicU64,
    total_disconnections: AtomicU64,
    tracker: TaskTracker,
}

impl SessionRegistry {
    /// Outbound pumps are spawned on `tracker` so shutdown can wait for them.
    pub fn new(tracker: TaskTracker) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            next_id: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            total_disconnections: AtomicU64::new(0),
            tracker,
        }
    }

    /// Register a new connection and start its outbound pump
    pub async fn add(
        &self,
        kind: TransportKind,
        addr: SocketAddr,
        writer: Box<dyn TransportWriter>,
    ) -> ConnectionHandle {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            id,
            kind,
            addr,
            connected_at: Utc::now(),
            sender,
        };
        self.tracker.spawn(pump(id, writer, receiver));

        self.inner
            .write()
            .await
            .connections
            .insert(id, handle.clone());
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(connection_id = %id, %kind, %addr, "Registered connection");
        handle
    }

    /// Drop a connection. A zombie user bound to it stays bound.
    pub async fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        let removed = self.inner.write().await.connections.remove(&id);
        if removed.is_some() {
            self.total_disconnections.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(connection_id = %id, "Removed connection");
        }
        removed
    }

    /// Bind a user to a connection.
    ///
    /// Fails with [`RegistryError::AlreadyLoggedIn`] while the username has
    /// a live binding. A zombie binding is transferred to `id` instead and
    /// its zombie entry cleared.
    pub async fn bind(&self, id: ConnectionId, user: SessionUser) -> Result<Bound, RegistryError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if !inner.connections.contains_key(&id) {
            return Err(RegistryError::UnknownConnection(id));
        }
        if inner.by_connection.contains_key(&id) {
            return Err(RegistryError::AlreadyBound(id));
        }

        let key = user.username.to_lowercase();
        if let Some(&existing) = inner.usernames.get(&key) {
            if let Some(binding) = inner.users.get_mut(&existing) {
                let old = binding.connection;
                if inner.zombies.remove(&old).is_some() {
                    inner.by_connection.remove(&old);
                    inner.by_connection.insert(id, existing);
                    binding.connection = id;
                    binding.state = SessionState::Active;
                    tracing::info!(
                        user_id = existing,
                        username = %binding.user.username,
                        old_connection = %old,
                        connection_id = %id,
                        "Zombie reconnected"
                    );
                    return Ok(Bound::Reconnected(binding.user.clone()));
                }
            }
            return Err(RegistryError::AlreadyLoggedIn(user.username));
        }

        inner.usernames.insert(key, user.user_id);
        inner.by_connection.insert(id, user.user_id);
        inner.users.insert(
            user.user_id,
            Binding {
                user: user.clone(),
                connection: id,
                state: SessionState::Active,
            },
        );
        tracing::info!(user_id = user.user_id, username = %user.username, connection_id = %id, "User bound");
        Ok(Bound::Fresh(user))
    }

    /// Release a user's binding and any zombie entry
    pub async fn unbind_user(&self, user_id: UserId) -> Option<SessionUser> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let binding = inner.users.remove(&user_id)?;
        inner.usernames.remove(&binding.user.username.to_lowercase());
        inner.by_connection.remove(&binding.connection);
        inner.zombies.remove(&binding.connection);
        Some(binding.user)
    }

    /// Release a zombie binding recorded before `threshold`. Returns `None`
    /// when the user is no longer a zombie, e.g. after reconnecting.
    pub async fn expire_zombie(&self, user_id: UserId, threshold: u64) -> Option<SessionUser> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let connection = inner.users.get(&user_id)?.connection;
        match inner.zombies.get(&connection) {
            Some(turn) if *turn < threshold => {}
            _ => return None,
        }
        inner.zombies.remove(&connection);
        inner.by_connection.remove(&connection);
        let binding = inner.users.remove(&user_id)?;
        inner.usernames.remove(&binding.user.username.to_lowercase());
        tracing::info!(user_id, username = %binding.user.username, "Zombie expired");
        Some(binding.user)
    }

    /// Tag a bound user as zombie at `turn`. The first turn recorded wins.
    pub async fn mark_zombie(&self, user_id: UserId, turn: u64) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        match inner.users.get_mut(&user_id) {
            Some(binding) => {
                binding.state = SessionState::Zombie;
                inner.zombies.entry(binding.connection).or_insert(turn);
                true
            }
            None => false,
        }
    }

    pub async fn is_zombie(&self, user_id: UserId) -> bool {
        let inner = self.inner.read().await;
        inner
            .users
            .get(&user_id)
            .is_some_and(|binding| inner.zombies.contains_key(&binding.connection))
    }

    /// Users whose zombie entry was recorded before `threshold`
    pub async fn list_expired_zombies(&self, threshold: u64) -> Vec<UserId> {
        let inner = self.inner.read().await;
        let mut expired: Vec<UserId> = inner
            .zombies
            .iter()
            .filter(|(_, turn)| **turn < threshold)
            .filter_map(|(connection, _)| inner.by_connection.get(connection).copied())
            .collect();
        expired.sort_unstable();
        expired
    }

    pub async fn lookup_by_connection(&self, id: ConnectionId) -> Option<SessionUser> {
        let inner = self.inner.read().await;
        let user_id = inner.by_connection.get(&id)?;
        inner.users.get(user_id).map(|binding| binding.user.clone())
    }

    /// Live connection of a user; `None` while the user is a zombie
    pub async fn lookup_by_user(&self, user_id: UserId) -> Option<ConnectionHandle> {
        let inner = self.inner.read().await;
        let binding = inner.users.get(&user_id)?;
        inner.connections.get(&binding.connection).cloned()
    }

    pub async fn lookup_by_username(&self, username: &str) -> Option<UserId> {
        self.inner
            .read()
            .await
            .usernames
            .get(&username.to_lowercase())
            .copied()
    }

    pub async fn connection(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.inner.read().await.connections.get(&id).cloned()
    }

    pub async fn online(&self) -> Vec<OnlineUser> {
        let inner = self.inner.read().await;
        let mut online: Vec<OnlineUser> = inner
            .users
            .values()
            .map(|binding| OnlineUser {
                user: binding.user.clone(),
                connection: binding.connection,
                zombie: binding.state == SessionState::Zombie,
            })
            .collect();
        online.sort_by_key(|o| o.user.user_id);
        online
    }

    /// Send text to a user's live connection
    pub async fn send_to_user(&self, user_id: UserId, text: &str) -> bool {
        match self.lookup_by_user(user_id).await {
            Some(handle) => handle.send_text(text).is_ok(),
            None => false,
        }
    }

    /// Send text to every connection except those bound to `exclude`
    pub async fn broadcast(&self, text: &str, exclude: &[UserId]) -> usize {
        let inner = self.inner.read().await;
        let mut delivered = 0;
        for (id, handle) in inner.connections.iter() {
            let excluded = inner
                .by_connection
                .get(id)
                .is_some_and(|user_id| exclude.contains(user_id));
            if !excluded && handle.send_text(text).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Close every transport. Queued output is written first.
    pub async fn close_all(&self) {
        let inner = self.inner.read().await;
        for handle in inner.connections.values() {
            handle.close();
        }
    }

    pub async fn active_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.total_connections.load(Ordering::SeqCst),
            total_disconnections: self.total_disconnections.load(Ordering::SeqCst),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    fn registry() -> (SessionRegistry, TaskTracker) {
        let tracker = TaskTracker::new();
        (SessionRegistry::new(tracker.clone()), tracker)
    }

    #[tokio::test]
    async fn test_add_assigns_unique_ids() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        let (b, _) = connect(&registry, TransportKind::WebSocket).await;
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.active_count().await, 2);

        registry.remove(a.id()).await;
        let (c, _) = connect(&registry, TransportKind::Telnet).await;
        assert!(c.id() > b.id());
        assert_eq!(registry.stats().total_connections, 3);
        assert_eq!(registry.stats().total_disconnections, 1);
        assert_eq!(registry.stats().active(), 2);
    }

    #[tokio::test]
    async fn test_bind_rejects_second_live_login() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        let (b, _) = connect(&registry, TransportKind::WebSocket).await;

        let bound = registry.bind(a.id(), user(1, "zed")).await.unwrap();
        assert_eq!(bound, Bound::Fresh(user(1, "zed")));

        let err = registry.bind(b.id(), user(1, "Zed")).await.unwrap_err();
        assert_eq!(err, RegistryError::AlreadyLoggedIn("Zed".to_string()));
        assert!(registry.lookup_by_connection(b.id()).await.is_none());
        assert_eq!(registry.lookup_by_username("ZED").await, Some(1));
    }

    #[tokio::test]
    async fn test_bind_unknown_or_bound_connection() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(a.id(), user(1, "zed")).await.unwrap();
        assert_eq!(
            registry.bind(a.id(), user(2, "amy")).await.unwrap_err(),
            RegistryError::AlreadyBound(a.id())
        );

        registry.remove(a.id()).await;
        let (b, _) = connect(&registry, TransportKind::Telnet).await;
        registry.remove(b.id()).await;
        assert_eq!(
            registry.bind(b.id(), user(2, "amy")).await.unwrap_err(),
            RegistryError::UnknownConnection(b.id())
        );
    }

    #[tokio::test]
    async fn test_zombie_reconnect_transfers_binding() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(a.id(), user(1, "zed")).await.unwrap();

        assert!(registry.mark_zombie(1, 5).await);
        registry.remove(a.id()).await;
        assert!(registry.is_zombie(1).await);
        assert!(registry.lookup_by_user(1).await.is_none());
        let online = registry.online().await;
        assert_eq!(online.len(), 1);
        assert!(online[0].zombie);

        let (c, _) = connect(&registry, TransportKind::WebSocket).await;
        let bound = registry.bind(c.id(), user(1, "zed")).await.unwrap();
        assert_eq!(bound, Bound::Reconnected(user(1, "zed")));
        assert!(!registry.is_zombie(1).await);
        assert_eq!(registry.lookup_by_user(1).await.unwrap().id(), c.id());
        assert!(registry.lookup_by_connection(a.id()).await.is_none());
        assert!(registry.list_expired_zombies(u64::MAX).await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_zombie_keeps_first_turn() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(a.id(), user(1, "zed")).await.unwrap();

        registry.mark_zombie(1, 10).await;
        registry.mark_zombie(1, 50).await;
        assert_eq!(registry.list_expired_zombies(10).await, Vec::<UserId>::new());
        assert_eq!(registry.list_expired_zombies(11).await, vec![1]);
        assert!(!registry.mark_zombie(99, 1).await);
    }

    #[tokio::test]
    async fn test_expire_zombie_skips_reconnected_user() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(a.id(), user(1, "zed")).await.unwrap();
        registry.mark_zombie(1, 3).await;
        registry.remove(a.id()).await;

        let (b, _) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(b.id(), user(1, "zed")).await.unwrap();
        assert_eq!(registry.expire_zombie(1, 100).await, None);
        assert_eq!(registry.lookup_by_username("zed").await, Some(1));

        registry.mark_zombie(1, 5).await;
        assert_eq!(registry.expire_zombie(1, 5).await, None);
        assert_eq!(registry.expire_zombie(1, 6).await, Some(user(1, "zed")));
        assert!(registry.online().await.is_empty());
    }

    #[tokio::test]
    async fn test_unbind_clears_zombie() {
        let (registry, _tracker) = registry();
        let (a, _) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(a.id(), user(1, "zed")).await.unwrap();
        registry.mark_zombie(1, 1).await;

        assert_eq!(registry.unbind_user(1).await, Some(user(1, "zed")));
        assert!(registry.list_expired_zombies(u64::MAX).await.is_empty());
        assert!(registry.lookup_by_username("zed").await.is_none());

        let (b, _) = connect(&registry, TransportKind::Telnet).await;
        assert!(matches!(
            registry.bind(b.id(), user(1, "zed")).await,
            Ok(Bound::Fresh(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_excludes_users_and_converts_newlines() {
        let (registry, tracker) = registry();
        let (a, a_out) = connect(&registry, TransportKind::Telnet).await;
        let (b, b_out) = connect(&registry, TransportKind::WebSocket).await;
        let (_c, c_out) = connect(&registry, TransportKind::Telnet).await;
        registry.bind(a.id(), user(1, "zed")).await.unwrap();
        registry.bind(b.id(), user(2, "amy")).await.unwrap();

        let delivered = registry.broadcast("hello\n", &[1]).await;
        assert_eq!(delivered, 2);

        registry.close_all().await;
        tracker.close();
        tracker.wait().await;

        assert_eq!(a_out.text(), "");
        assert_eq!(b_out.text(), "hello\n");
        assert_eq!(c_out.text(), "hello\r\n");
        assert!(a_out.is_closed() && b_out.is_closed() && c_out.is_closed());
    }

    #[test]
    fn test_to_crlf() {
        assert_eq!(to_crlf("a\nb\r\nc"), "a\r\nb\r\nc");
    }
}
