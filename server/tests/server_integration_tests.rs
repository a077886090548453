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


use emberhold_server::config::{Configuration, GameConfig};
use emberhold_server::{BasicRules, Server, ServerContext};
use serde_env_field::EnvField;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    server: Server,
    addr: SocketAddr,
    dir: TempDir,
}

async fn start(game: GameConfig, max_connections: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Configuration::default();
    config.storage.user_data = EnvField::from(dir.path().to_path_buf());
    config.storage.password_cost = 4;
    config.game = game;

    let context = ServerContext::new(config, Arc::new(BasicRules));
    context.store.init().await.unwrap();
    context.start().unwrap();

    let mut server = Server::new(context);
    let addr = server
        .listen_telnet("127.0.0.1:0".parse().unwrap(), max_connections)
        .await
        .unwrap();
    Harness { server, addr, dir }
}

fn game(turn_ms: u64) -> GameConfig {
    GameConfig {
        turn_ms,
        ..GameConfig::default()
    }
}

/// A telnet client that accumulates everything the server sends
struct Client {
    stream: TcpStream,
    seen: String,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            seen: String::new(),
        }
    }

    async fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Read until `needle` arrives and return everything up to and including it
    async fn expect(&mut self, needle: &str) -> String {
        let result = timeout(WAIT, async {
            loop {
                if let Some(pos) = self.seen.find(needle) {
                    let end = pos + needle.len();
                    let out = self.seen[..end].to_string();
                    self.seen.drain(..end);
                    return Some(out);
                }
                let mut buf = [0u8; 1024];
                let n = self.stream.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    return None;
                }
                self.seen.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        })
        .await;
        match result {
            Ok(Some(out)) => out,
            Ok(None) => panic!("connection closed waiting for {:?}, saw {:?}", needle, self.seen),
            Err(_) => panic!("timed out waiting for {:?}, saw {:?}", needle, self.seen),
        }
    }

    /// Read until the server closes the connection
    async fn expect_closed(&mut self) -> String {
        let result = timeout(WAIT, async {
            let mut buf = [0u8; 1024];
            loop {
                match self.stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => self.seen.push_str(&String::from_utf8_lossy(&buf[..n])),
                }
            }
        })
        .await;
        assert!(result.is_ok(), "connection still open, saw {:?}", self.seen);
        std::mem::take(&mut self.seen)
    }

    async fn create_user(&mut self, username: &str, password: &str) {
        self.expect("Username: ").await;
        self.send(username).await;
        self.expect("Choose a password: ").await;
        self.send(password).await;
        self.expect("Confirm password: ").await;
        self.send(password).await;
        self.expect("Room 1").await;
        self.expect("> ").await;
    }

    async fn login(&mut self, username: &str, password: &str) {
        self.expect("Username: ").await;
        self.send(username).await;
        self.expect("Password: ").await;
        self.send(password).await;
    }

    /// Send a command once the turn rate allows another
    async fn command(&mut self, line: &str) {
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.send(line).await;
    }
}

#[tokio::test]
async fn test_new_user_enters_world() {
    let harness = start(game(10), 0).await;
    let mut alice = Client::connect(harness.addr).await;

    alice.expect("Welcome to Emberhold").await;
    alice.expect("Username: ").await;
    alice.send("alice").await;
    alice.expect("Choose a password: ").await;
    alice.send("secret").await;
    let masked = alice.expect("Confirm password: ").await;
    assert!(!masked.contains("secret"));
    assert!(masked.contains("******"));
    alice.send("secret").await;
    alice.expect("Room 1").await;
    alice.expect("> ").await;

    alice.command("say hello").await;
    alice.expect("You say, \"hello\"").await;

    assert!(harness.dir.path().join("alice.yaml").exists());
    harness.server.shutdown().await;
}

#[tokio::test]
async fn test_second_login_is_refused() {
    let harness = start(game(10), 0).await;
    let mut first = Client::connect(harness.addr).await;
    first.create_user("alice", "secret").await;

    let mut second = Client::connect(harness.addr).await;
    second.login("alice", "secret").await;
    second.expect("That user is already logged in.").await;
    second.expect("Username: ").await;

    first.command("who").await;
    first.expect("1 player(s) in the world").await;
    harness.server.shutdown().await;
}

#[tokio::test]
async fn test_zombie_reconnect_resumes_player() {
    let harness = start(game(10), 0).await;
    let mut alice = Client::connect(harness.addr).await;
    alice.create_user("alice", "secret").await;
    let mut bob = Client::connect(harness.addr).await;
    bob.create_user("bob", "hunter2").await;
    alice.expect("bob enters.").await;

    drop(alice);
    bob.expect("alice goes still.").await;
    bob.command("look").await;
    bob.expect("Also here: alice (zombie)").await;

    let mut alice = Client::connect(harness.addr).await;
    alice.login("alice", "secret").await;
    alice.expect("Reconnecting...").await;
    alice.expect("Room 1").await;
    bob.expect("alice wakes up.").await;

    alice.command("who").await;
    alice.expect("2 player(s) in the world").await;
    harness.server.shutdown().await;
}

#[tokio::test]
async fn test_zombie_expires_after_timeout() {
    let harness = start(
        GameConfig {
            turn_ms: 10,
            zombie_expiration_turns: Some(3),
            ..GameConfig::default()
        },
        0,
    )
    .await;
    let mut alice = Client::connect(harness.addr).await;
    alice.create_user("alice", "secret").await;
    let mut bob = Client::connect(harness.addr).await;
    bob.create_user("bob", "hunter2").await;

    drop(alice);
    bob.expect("alice crumbles to dust.").await;

    // A fresh login after expiry enters the world again
    let mut alice = Client::connect(harness.addr).await;
    alice.login("alice", "secret").await;
    alice.expect("Room 1").await;
    bob.expect("alice enters.").await;
    harness.server.shutdown().await;
}

#[tokio::test]
async fn test_commands_faster_than_turn_rate_are_dropped() {
    let harness = start(game(500), 0).await;
    let mut alice = Client::connect(harness.addr).await;
    alice.create_user("alice", "secret").await;

    alice.send("say one\r\nsay two").await;
    alice.expect("You say, \"one\"").await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    alice.send("say three").await;
    let seen = alice.expect("You say, \"three\"").await;
    assert!(!seen.contains("You say, \"two\""));
    harness.server.shutdown().await;
}

#[tokio::test]
async fn test_full_server_refuses_connection() {
    let harness = start(game(10), 1).await;
    let mut first = Client::connect(harness.addr).await;
    first.expect("Username: ").await;

    let mut second = Client::connect(harness.addr).await;
    let notice = second.expect_closed().await;
    assert!(notice.contains("Server is full (1 connections)"));
    assert_eq!(harness.server.context().registry.active_count().await, 1);
    harness.server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_says_farewell_and_saves() {
    let harness = start(game(10), 0).await;
    let mut alice = Client::connect(harness.addr).await;
    alice.create_user("alice", "secret").await;
    alice.command("quit").await;
    alice.expect("Goodbye.").await;
    alice.expect_closed().await;

    let mut bob = Client::connect(harness.addr).await;
    bob.create_user("bob", "hunter2").await;

    let context = harness.server.context().clone();
    harness.server.shutdown().await;

    let seen = bob.expect_closed().await;
    assert!(seen.contains("The server is shutting down. Farewell!"));
    assert_eq!(context.registry.active_count().await, 0);
    assert!(context.store.load("bob").await.unwrap().is_some());
    assert!(context.tracker.is_closed());
    assert!(TcpStream::connect(harness.addr).await.is_err());
}
