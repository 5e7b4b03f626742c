//! # Duel Client Library
//!
//! This library provides the client side of the two-player laser duel. A
//! client never decides anything about health, score or possession; it draws
//! its own shots immediately, reports them to the authority and mirrors
//! whatever the authority replicates back.
//!
//! ## Architecture Overview
//!
//! ### Local Shot Prediction
//! When the possessed character fires, the client traces the beam against its
//! own copy of the level and characters and spawns the beam effect at once.
//! A blocking hit is reported reliably; a miss is reported as a cosmetic,
//! unreliable notice.
//!
//! ### Replicated Fields
//! Health, score and other players' shots arrive as versioned field updates.
//! Anything older than what was already applied is dropped, so resends and
//! reordering never roll a value back or replay a beam twice.
//!
//! ### Respawning
//! After losing its body the client asks for a new one. The request is
//! refused locally while a body is still possessed.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - Mirrors of characters, health and score
//! - Local shot prediction and report selection
//! - Replay of other players' shots
//!
//! ### Network Module (`network`)
//! - UDP socket, connect retry and heartbeat
//! - Reliable channel acks and resends
//! - Automatic fire and respawn for headless play
//!
//! ### Presentation Module (`presentation`)
//! - Log-backed beam, health bar and score output
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(ClientConfig::default()).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
pub mod presentation;
