//! # SpeedBall Server Library
//!
//! This library provides the authoritative server for SpeedBall, a two-team
//! networked ball game. It owns the match state, validates and applies
//! client intent, advances the physics simulation, tracks connection
//! liveness and emits the replication stream every client renders from.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only real version of the match. Clients send intent
//! (select a player, move, shoot) and receive snapshots; they never decide
//! positions, possession or scores on their own.
//!
//! ### Session Management
//! Handles the lifecycle of client sessions including:
//! - Join handling and team assignment
//! - Heartbeat probes with idempotent resends and RTT measurement
//! - Timeout and explicit leave handling
//! - Cheat-score accumulation for protocol violations
//!
//! ### Replication
//! Every step broadcasts a snapshot (scores, controlled players, match
//! state) to all clients, followed by per-entity position updates while the
//! match is in play. When the match starts each client receives a welcome
//! and one spawn packet per world entity.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Step Function
//! All match and session state is mutated by [`server::GameServer::single_step`]
//! alone. Socket I/O runs in separate tokio tasks that only exchange raw
//! datagrams with the step through channels, so no state needs locking and
//! a step is a pure function of state, buffered datagrams and the injected
//! clock.
//!
//! ### Injected Collaborators
//! Time ([`clock::Clock`]), datagram I/O ([`transport::Transport`]),
//! collision handling ([`physics::Physics`]) and goal detection
//! ([`game::ScoringPolicy`]) are traits. Tests drive the server with a
//! manual clock and in-memory transport without touching the network.
//!
//! ## Module Organization
//!
//! - `client_manager`: sessions, heartbeats and cheat-scores
//! - `roster`: teams and the client-to-team assignment
//! - `entity`: world entities, ball carry and shots
//! - `physics`: rigid bodies and the arcade collision engine
//! - `game`: the match state machine and scoring
//! - `input`: validation of gameplay commands
//! - `server`: the tick orchestrator
//! - `network`: UDP runtime driving the orchestrator at the tick rate
//! - `level`, `config`, `clock`, `transport`, `error`: supporting types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use speedball_server::config::ServerConfig;
//! use speedball_server::level::LevelDescription;
//! use speedball_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let level = LevelDescription::testing();
//!     let server = Server::bind("127.0.0.1:8080", ServerConfig::default(), &level).await?;
//!
//!     // Receives datagrams, steps the match at 30Hz and sends the
//!     // resulting packets until the task is cancelled.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod game;
pub mod input;
pub mod level;
pub mod network;
pub mod physics;
pub mod roster;
pub mod server;
pub mod transport;
