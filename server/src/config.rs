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

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "server/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "server/.env"
    )]
    pub env_file: Option<String>,

    #[arg(
        short = 'w',
        long = "websocket",
        help = "Enable websocket server",
        default_value = "true"
    )]
    pub websocket: bool,

    #[arg(
        short = 't',
        long = "telnet",
        help = "Enable telnet server",
        default_value = "true"
    )]
    pub telnet: bool,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
            websocket: false,
            telnet: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to open config file: {0}")]
    Open(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub telnet: TelnetConfig,

    #[serde(default = "default_websocket")]
    pub websocket: WebsocketConfig,

    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub messages: MessageConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            telnet: TelnetConfig::default(),
            websocket: default_websocket(),
            game: GameConfig::default(),
            storage: StorageConfig::default(),
            messages: MessageConfig::default(),
        }
    }
}

impl Configuration {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from file: {}", path);
        let file = std::fs::File::open(path)?;
        let conf = serde_yaml::from_reader(file)?;
        Ok(conf)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TelnetConfig {
    #[serde(default = "default_telnet_listeners")]
    pub listeners: Vec<ListenerConfig>,
}

fn default_telnet_listeners() -> Vec<ListenerConfig> {
    vec![ListenerConfig::on_port(4000)]
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            listeners: default_telnet_listeners(),
        }
    }
}

/// One listening socket. `max_connections` of zero means unlimited.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub addr: EnvField<Binding>,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl ListenerConfig {
    fn on_port(port: u16) -> Self {
        Self {
            addr: EnvField::from(Binding::any(port)),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    100
}

pub type WebsocketConfig = ListenerConfig;

fn default_websocket() -> WebsocketConfig {
    ListenerConfig::on_port(8080)
}

/// Socket address a listener binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding(SocketAddr);

impl Binding {
    /// All interfaces on `port`
    pub fn any(port: u16) -> Self {
        Self(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
    }

    pub fn to_addr(&self) -> SocketAddr {
        self.0
    }

    pub fn to_ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn to_port(&self) -> u16 {
        self.0.port()
    }
}

impl FromStr for Binding {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Length of one world turn and the minimum gap between accepted commands
    #[serde(default = "default_turn_ms")]
    pub turn_ms: u64,

    /// Seconds a dropped player stays in the world. Zero disables zombies.
    #[serde(default = "default_zombie_seconds")]
    pub zombie_seconds: u64,

    /// Turns before a zombie is logged out. Derived from `zombie_seconds` when absent.
    #[serde(default)]
    pub zombie_expiration_turns: Option<u64>,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_start_room")]
    pub start_room: i64,
}

fn default_turn_ms() -> u64 {
    100
}

fn default_zombie_seconds() -> u64 {
    60
}

fn default_prompt() -> String {
    String::from("> ")
}

fn default_start_room() -> i64 {
    1
}

impl GameConfig {
    pub fn turn_duration(&self) -> Duration {
        Duration::from_millis(self.turn_ms.max(1))
    }

    pub fn zombies_enabled(&self) -> bool {
        self.zombie_seconds > 0
    }

    pub fn zombie_expiration(&self) -> u64 {
        self.zombie_expiration_turns
            .unwrap_or_else(|| self.zombie_seconds.saturating_mul(1000) / self.turn_ms.max(1))
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_ms: default_turn_ms(),
            zombie_seconds: default_zombie_seconds(),
            zombie_expiration_turns: None,
            prompt: default_prompt(),
            start_room: default_start_room(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_user_data")]
    pub user_data: EnvField<PathBuf>,

    /// Write `<file>.new` and rename over the original
    #[serde(default = "default_careful_save")]
    pub careful_save: bool,

    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
}

fn default_user_data() -> EnvField<PathBuf> {
    EnvField::from(PathBuf::from("data/users"))
}

fn default_careful_save() -> bool {
    true
}

fn default_password_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            user_data: default_user_data(),
            careful_save: default_careful_save(),
            password_cost: default_password_cost(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "default_welcome")]
    pub welcome: String,

    #[serde(default = "default_farewell")]
    pub farewell: String,

    /// Sent to connections refused at capacity. `{count}` is replaced.
    #[serde(default = "default_server_full")]
    pub server_full: String,
}

fn default_welcome() -> String {
    String::from("\nWelcome to Emberhold.\n\n")
}

fn default_farewell() -> String {
    String::from("\nThe server is shutting down. Farewell!\n")
}

fn default_server_full() -> String {
    String::from("\n\n\n!!! Server is full ({count} connections). Try again later. !!!\n\n\n")
}

impl MessageConfig {
    pub fn server_full(&self, count: usize) -> String {
        self.server_full.replace("{count}", &count.to_string())
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            farewell: default_farewell(),
            server_full: default_server_full(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_listeners() {
        let config = Configuration::default();
        assert_eq!(config.telnet.listeners.len(), 1);
        let telnet = &config.telnet.listeners[0];
        assert_eq!(telnet.addr.to_ip(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(telnet.addr.to_port(), 4000);
        assert_eq!(telnet.max_connections, 100);
        assert_eq!(config.websocket.addr.to_port(), 8080);
        assert_eq!(config.websocket.max_connections, 100);
    }

    #[test]
    fn test_binding_parse() {
        let binding: Binding = "127.0.0.1:4444".parse().unwrap();
        assert_eq!(binding.to_addr(), SocketAddr::from(([127, 0, 0, 1], 4444)));
        assert_eq!(binding.to_string(), "127.0.0.1:4444");
        assert!("localhost".parse::<Binding>().is_err());
    }

    #[test]
    fn test_game_config_zombie_expiration() {
        let mut config = GameConfig::default();
        assert!(config.zombies_enabled());
        assert_eq!(config.zombie_expiration(), 600);

        config.zombie_expiration_turns = Some(5);
        assert_eq!(config.zombie_expiration(), 5);

        config.zombie_seconds = 0;
        assert!(!config.zombies_enabled());
    }

    #[test]
    fn test_huge_zombie_seconds_saturate() {
        let config = GameConfig {
            zombie_seconds: u64::MAX / 2,
            turn_ms: 100,
            ..GameConfig::default()
        };
        assert_eq!(config.zombie_expiration(), u64::MAX / 100);
    }

    #[test]
    fn test_server_full_message() {
        let messages = MessageConfig::default();
        assert!(messages.server_full(12).contains("Server is full (12 connections)"));
    }

    #[test]
    fn test_configuration_new_from_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            r#"
telnet:
  listeners:
    - addr: 127.0.0.1:4001
      max_connections: 10
    - addr: 127.0.0.1:4444
      max_connections: 0
websocket:
  addr: 127.0.0.1:8081
game:
  turn_ms: 250
  zombie_seconds: 30
storage:
  user_data: /tmp/emberhold-users
  careful_save: false
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        unsafe {
            std::env::remove_var("EMBERHOLD_TELNET_ADDR");
            std::env::remove_var("EMBERHOLD_USER_DATA");
        }

        let config = Configuration::load(path).unwrap();

        assert_eq!(config.telnet.listeners.len(), 2);
        assert_eq!(config.telnet.listeners[0].addr.to_port(), 4001);
        assert_eq!(config.telnet.listeners[0].max_connections, 10);
        assert_eq!(config.telnet.listeners[1].max_connections, 0);
        assert_eq!(config.websocket.addr.to_port(), 8081);
        assert_eq!(config.game.turn_ms, 250);
        assert_eq!(config.game.zombie_expiration(), 120);
        assert_eq!(config.game.prompt, "> ");
        assert_eq!(
            config.storage.user_data.as_path(),
            std::path::Path::new("/tmp/emberhold-users")
        );
        assert!(!config.storage.careful_save);
    }

    #[test]
    fn test_configuration_env_override() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            r#"
telnet:
  listeners:
    - addr: "${{EMBERHOLD_TELNET_ADDR:-127.0.0.1:4000}}"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();

        unsafe {
            std::env::set_var("EMBERHOLD_TELNET_ADDR", "127.0.0.1:9000");
        }

        let config = Configuration::load(path).unwrap();

        unsafe {
            std::env::remove_var("EMBERHOLD_TELNET_ADDR");
        }

        assert_eq!(config.telnet.listeners[0].addr.to_port(), 9000);
        assert_eq!(config.telnet.listeners[0].max_connections, 100);
    }

    #[test]
    fn test_configuration_missing_file() {
        let result = Configuration::load("/nonexistent/emberhold.yaml");
        assert!(matches!(result, Err(ConfigError::Open(_))));
    }
}
