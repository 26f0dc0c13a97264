//! # Space Game Client Library
//!
//! Headless polling client for the space game server. It speaks the same
//! request/snapshot protocol as the browser client: every request carries a
//! session token and one command, and every response is the whole world.
//!
//! ## Architecture Overview
//!
//! ### Polling
//! There is no connection. The client issues a `refresh` on a fixed interval,
//! a `ping_request`/`pong` pair every couple of seconds so the server can
//! measure latency, and any command typed at the console as soon as it is
//! entered. The first response hands out a token and player id which every
//! later request carries.
//!
//! ### Local Mirror
//! Snapshots are merged into a local copy of the world. Entities that vanish
//! from a snapshot are dropped, older states never replace newer ones, and
//! positions are pushed forward by the measured round trip.
//!
//! ### Prediction
//! Our own player is simulated locally from the steering commands we sent and
//! only corrected from the server on every tenth packet.
//!
//! ## Module Organization
//!
//! - `game`: the local world mirror and own-player prediction
//! - `input`: console line parsing into commands
//! - `network`: the HTTP poll client
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("http://127.0.0.1:8080/server");
//!     client.send(Command::Refresh).await?;
//!     client.send(Command::Accelerate).await?;
//!     println!("{}", client.status());
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
