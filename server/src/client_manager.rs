//! Client connection management for the match server
//!
//! This module handles the server-side bookkeeping of connected players:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Identity assignment through the match's `IdentityAllocator`
//! - One reliable-ordered channel per peer for sequencing, acks and resends
//! - Connection health monitoring and automatic cleanup
//!
//! The client manager decides which peers take part in the match; everything
//! gameplay related lives in `game::MatchState`.

use crate::allocator::IdentityAllocator;
use log::info;
use shared::{ExecutionContext, GameError, PlayerId, ReliableChannel};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents a connected peer and its delivery state
///
/// Each client maintains:
/// - Connection metadata (identity, address, last activity)
/// - The reliable channel used for every reliable packet to and from it
#[derive(Debug)]
pub struct Client {
    /// Identity assigned at login, never reassigned
    pub id: PlayerId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any datagram from this client
    pub last_seen: Instant,
    /// Sequencing, acknowledgement and resend state
    pub channel: ReliableChannel,
}

impl Client {
    /// Creates a new client with the given identity and network address
    pub fn new(id: PlayerId, addr: SocketAddr, resend_interval: Duration) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            channel: ReliableChannel::new(resend_interval),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if nothing has been received from this client within
    /// the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients of the two-player match
///
/// The ClientManager owns identity assignment, so an identity is only ever
/// issued together with a live connection. Identities are not recycled when
/// a player leaves.
pub struct ClientManager {
    /// Connected clients indexed by their identity
    clients: HashMap<PlayerId, Client>,
    /// Hands out identities 0 and 1
    identities: IdentityAllocator,
    ctx: ExecutionContext,
    resend_interval: Duration,
    timeout: Duration,
}

impl ClientManager {
    /// Creates an empty roster for the given authority context
    pub fn new(ctx: ExecutionContext, resend_interval: Duration, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            identities: IdentityAllocator::new(),
            ctx,
            resend_interval,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns the assigned identity, or `MatchFull` once both seats have
    /// been handed out during this match.
    pub fn add_client(&mut self, addr: SocketAddr) -> Result<PlayerId, GameError> {
        let id = self.identities.assign(&self.ctx)?;

        let client = Client::new(id, addr, self.resend_interval);
        info!("{} connected from {}", id, addr);
        self.clients.insert(id, client);

        Ok(id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone.
    pub fn remove_client(&mut self, id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!("{} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client identity by network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks a client as alive
    pub fn touch(&mut self, id: PlayerId) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.last_seen = Instant::now();
        }
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.clients.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed identities so the match can unpossess and remove
    /// their characters.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timeout = self.timeout;
        let timed_out: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            self.remove_client(id);
        }

        timed_out
    }

    /// Iterates clients mutably, for resend sweeps
    pub fn clients_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
