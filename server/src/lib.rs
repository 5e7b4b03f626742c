//! # Match Server Library
//!
//! This library provides the dedicated authority for a two-player laser duel.
//! It owns every gameplay-affecting value of the match (identities, possession,
//! health and score) and replicates them to the connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Identity and Spawning
//! Each login receives the next player identity (0, then 1). The first body of
//! a player appears at the spawn marker tagged for their identity; later
//! respawns pick one of the two markers at random.
//!
//! ### Hit Confirmation
//! Clients trace their own shots and report the result. The server classifies
//! the reported impact against its own world view, applies damage to player
//! characters, awards kill credit and records a hit notification that every
//! other client replays for its beam effect.
//!
//! ### Replication
//! Health, score and hit notifications carry a version that increases on every
//! write. Clients apply an update only when it is newer than the last one they
//! accepted, so duplicated or reordered datagrams cannot roll a value back.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Match Loop
//! All datagrams are funnelled into one event loop that owns the
//! [`game::MatchState`]. Gameplay never runs concurrently with itself.
//!
//! ### UDP With a Reliable Channel
//! Each peer has a sequenced channel. Gameplay-critical packets (hit reports,
//! damage and score changes, possession) are resent until acknowledged and
//! delivered in order. Cosmetic packets (misses, hiding a body) go out bare.
//!
//! ## Module Organization
//!
//! ### Allocator Module (`allocator`)
//! - Identity assignment, strictly increasing and never reused
//! - Lazy collection of the `Player1`/`Player2` spawn markers
//! - Fixed initial spawn and random respawn selection
//!
//! ### Client Manager Module (`client_manager`)
//! - Connection tracking by address
//! - Per-client reliable channel
//! - Client timeout detection and cleanup
//!
//! ### Game Module (`game`)
//! - Characters, possession and the damage state machine
//! - Hit and miss confirmation, kill credit
//! - Respawn coordination and late-joiner snapshots
//!
//! ### Network Module (`network`)
//! - UDP socket tasks for receiving, sending and timeouts
//! - Routing of queued match packets to their audience
//! - Periodic resend of unacknowledged reliable datagrams
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     })
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod client_manager;
pub mod game;
pub mod network;
