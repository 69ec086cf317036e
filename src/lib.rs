//! # Mushcore - Live-State Core for a Multiplayer Text World
//!
//! Mushcore holds the concurrently mutable state of a persistent text world
//! (characters, item templates and instances, rooms and inventories) and the
//! command pipeline that turns a player's typed line into a permission
//! checked mutation of that state.
//!
//! ## Features
//!
//! - **Entity Registry**: one authority for "what is X and where is it now"
//! - **Slotted Containers**: fixed-capacity rooms and inventories with atomic moves
//! - **Guarded Entities**: per-entity reader/writer locks behind accessors, whitelisted attributes
//! - **Command Tree**: branches, leaves and aliases resolved case-insensitively with argument binding
//! - **Player Sessions**: bounded outbound queues with an explicit overflow policy
//! - **Security**: Argon2id password hashing, redacted command logs, a separate security log target
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mushcore::config::Config;
//! use mushcore::world::World;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("mushcore.toml").await?;
//!     let bind = config.server.bind.clone();
//!     let world = Arc::new(World::new(config)?);
//!     mushcore::server::run(world, &bind).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`world`] - entities, containers, the registry and the [`world::World`] context
//! - [`commands`] - the command tree, resolution and the built-in commands
//! - [`session`] - player sessions and their outbound queues
//! - [`scripting`] - the script engine boundary and host callbacks
//! - [`server`] - a line-based TCP adapter
//! - [`config`] - configuration loading and defaults
//! - [`validation`] - character name and password rules
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Transport     │ ← server.rs (lines in, lines out)
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ CommandManager  │ ← resolve, check permissions, run handler
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  World / Entity │ ← registry, containers, guarded entities
//! │    Registry     │
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Outbound Queues │ ← one per PlayerSession, drained to the transport
//! └─────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod logutil;
pub mod metrics;
pub mod scripting;
pub mod server;
pub mod session;
pub mod validation;
pub mod world;
