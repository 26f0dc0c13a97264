//! # Space Game Server Library
//!
//! Authoritative server for a small multiplayer space game played over plain
//! HTTP polling. Clients never hold a connection: every request carries a
//! session token and one command, and every response carries a snapshot of
//! the whole world.
//!
//! ## Request Lifecycle
//!
//! The server process keeps no game state of its own. Each request
//!
//! 1. reads the clock once,
//! 2. rebuilds the caller's session from the shared cache (or starts a new
//!    one for an unknown token),
//! 3. applies the command to the caller's player,
//! 4. steps every entity the caller owns forward to the current time,
//! 5. writes the caller's entities back and encodes a snapshot.
//!
//! Entities are only simulated while their owner keeps polling. Entities of
//! other sessions are shown exactly as their owners last stored them.
//!
//! ## Module Organization
//!
//! ### Storage (`cache`, `registry`)
//! A key/value [`cache::Cache`] holds the active token list and one encoded
//! entity map per token. The durable [`registry::ClientStore`] decides which
//! tokens exist; [`registry::ClientRegistry`] mirrors it into the cache.
//!
//! ### Simulation (`physics`, `entity`)
//! Vector math on a wrapping 5000x5000 map, and the two entity kinds: players
//! integrated in sub-steps from thrust and turn intent, and projectiles that
//! drift in a straight line.
//!
//! ### Sessions (`session`, `game`)
//! [`session::Session`] is the per-request view of the world;
//! [`game::Game`] runs one request end to end.
//!
//! ### Transport (`network`, `clock`)
//! An `axum` router serving `GET`/`POST /server`, with an injectable clock.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::clock::SystemClock;
//! use server::game::Game;
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = Arc::new(Game::in_memory());
//!     let server = Server::bind("127.0.0.1:8080", game, Arc::new(SystemClock)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod entity;
pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod registry;
pub mod session;
