//! # Configuration Management Module
//!
//! Type-safe configuration for the world core, loaded from TOML. Every field
//! has a default so a partial file (or no file at all) yields a working
//! setup.
//!
//! ## Configuration Structure
//!
//! - [`WorldConfig`] - start room and container capacities
//! - [`SessionConfig`] - outbound queue sizing, overflow policy, session cap
//! - [`CommandsConfig`] - resolution error policy and alias depth guard
//! - [`LoggingConfig`] - log level and optional log files
//! - [`SecurityConfig`] - argon2 password hashing cost
//! - [`ServerConfig`] - bind address of the bundled line adapter
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mushcore::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("mushcore.toml").await?;
//!     let config = Config::load("mushcore.toml").await?;
//!     println!("Start room: {}", config.world.start_room_title);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [world]
//! start_room_title = "The Town Square"
//! start_room_id = "6f1c2a7e-3d5b-4c8e-9a0f-1b2c3d4e5f60"
//! inventory_capacity = 35
//!
//! [sessions]
//! queue_capacity = 256
//! overflow_policy = "drop_oldest"
//!
//! [commands]
//! error_policy = "uniform"
//! max_alias_depth = 8
//!
//! [security.argon2]
//! memory_kib = 19456
//! time_cost = 2
//! parallelism = 1
//! ```

use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::commands::ErrorPolicy;
use crate::session::OverflowPolicy;
use crate::world::container::INVENTORY_CAPACITY;
use crate::world::types::EntityId;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub start_room_title: String,
    pub start_room_area: String,
    /// Fixed id for the start room so saved contents find it again. A fresh
    /// id is generated when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_room_id: Option<EntityId>,
    pub inventory_capacity: usize,
    /// Slot count of rooms created without an explicit capacity.
    pub room_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            start_room_title: "The Town Square".to_string(),
            start_room_area: "town".to_string(),
            start_room_id: None,
            inventory_capacity: INVENTORY_CAPACITY,
            room_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// 0 disables the cap.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            overflow_policy: OverflowPolicy::DropOldest,
            max_sessions: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub error_policy: ErrorPolicy,
    pub max_alias_depth: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Uniform,
            max_alias_depth: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            security_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

impl SecurityConfig {
    /// Argon2id hasher for the configured cost; unset fields keep the crate
    /// defaults.
    pub fn hasher(&self) -> Result<Argon2<'static>> {
        let Some(a) = &self.argon2 else {
            return Ok(Argon2::default());
        };
        let base = Params::DEFAULT;
        let params = Params::new(
            a.memory_kib.unwrap_or(base.m_cost()),
            a.time_cost.unwrap_or(base.t_cost()),
            a.parallelism.unwrap_or(base.p_cost()),
            None,
        )
        .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:4000".to_string(),
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
