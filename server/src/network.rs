//! Server network layer handling UDP communications and match loop coordination

use crate::client_manager::ClientManager;
use crate::game::{MatchConfig, MatchState};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::level::Level;
use shared::weapon::Weapon;
use shared::{
    Datagram, Delivery, ExecutionContext, GameError, Packet, PlayerId, PROTOCOL_VERSION,
    RESEND_INTERVAL_MS,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Runtime settings for a match server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_duration: Duration,
    pub client_timeout: Duration,
    pub resend_interval: Duration,
    /// Seed for the respawn coin flip. Entropy when absent.
    pub seed: Option<u64>,
    pub validate_dynamic_hits: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_duration: Duration::from_millis(33),
            client_timeout: Duration::from_secs(5),
            resend_interval: Duration::from_millis(RESEND_INTERVAL_MS),
            seed: None,
            validate_dynamic_hits: false,
        }
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    DatagramReceived {
        datagram: Datagram,
        addr: SocketAddr,
    },
    ClientTimeout {
        player_id: PlayerId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the match loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendDatagram {
        datagram: Datagram,
        addr: SocketAddr,
    },
}

/// Dedicated authority coordinating networking and the match
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    match_state: MatchState,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let ctx = ExecutionContext::dedicated_server();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let match_config = MatchConfig {
            weapon: Weapon::without_effect(),
            validate_dynamic_hits: config.validate_dynamic_hits,
        };

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                ctx,
                config.resend_interval,
                config.client_timeout,
            ))),
            match_state: MatchState::new(ctx, Level::arena(), match_config, rng),
            tick_duration: config.tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn match_state(&self) -> &MatchState {
        &self.match_state
    }

    /// Spawns task that continuously listens for incoming datagrams
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(datagram) = deserialize::<Datagram>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::DatagramReceived { datagram, addr })
                            {
                                error!("Failed to send datagram to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize datagram from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing datagram queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendDatagram { datagram, addr } => {
                        if let Err(e) = Self::send_datagram_impl(&socket, &datagram, addr).await {
                            error!("Failed to send datagram to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for player_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { player_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_datagram_impl(
        socket: &UdpSocket,
        datagram: &Datagram,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(datagram)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_datagram(&self, datagram: Datagram, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendDatagram { datagram, addr }) {
            error!("Failed to queue datagram for sending: {}", e);
        }
    }

    /// Sends outside any channel, for peers that never got an identity
    fn send_unsequenced(&self, packet: Packet, addr: SocketAddr) {
        self.send_datagram(Datagram::Unreliable { packet }, addr);
    }

    /// Sends through the peer's channel so reliable packets are resent until
    /// acknowledged
    async fn send_to_player(&self, player: PlayerId, packet: Packet, delivery: Delivery) {
        let routed = {
            let mut clients = self.clients.write().await;
            clients
                .get_mut(player)
                .map(|client| (client.channel.wrap(packet, delivery, Instant::now()), client.addr))
        };

        match routed {
            Some((datagram, addr)) => self.send_datagram(datagram, addr),
            None => debug!("Dropping packet for {}, no longer connected", player),
        }
    }

    /// Routes everything the match queued to its audience
    async fn flush_outbox(&mut self) {
        let broadcasts = self.match_state.drain_outbox();
        if broadcasts.is_empty() {
            return;
        }

        let players = {
            let clients = self.clients.read().await;
            clients.ids()
        };

        for broadcast in broadcasts {
            for player in players.iter().copied() {
                if broadcast.audience.includes(player) {
                    self.send_to_player(player, broadcast.packet.clone(), broadcast.delivery)
                        .await;
                }
            }
        }
    }

    /// Acknowledges and unwraps a datagram, then handles its packets in order
    pub async fn handle_datagram(&mut self, datagram: Datagram, addr: SocketAddr) {
        let known = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        let Some(player) = known else {
            // Strangers may only connect
            match datagram {
                Datagram::Reliable { packet, .. } | Datagram::Unreliable { packet } => {
                    self.handle_stranger_packet(packet, addr).await;
                }
                Datagram::Ack { .. } => debug!("Ignoring ack from unknown peer {}", addr),
            }
            return;
        };

        let received = {
            let mut clients = self.clients.write().await;
            clients.touch(player);
            match clients.get_mut(player) {
                Some(client) => client.channel.receive(datagram),
                None => return,
            }
        };

        if let Some(ack) = received.ack {
            self.send_datagram(ack, addr);
        }

        for packet in received.packets {
            if let Err(e) = self.handle_packet(player, packet).await {
                warn!("Rejected packet from {}: {}", player, e);
            }
        }
        self.flush_outbox().await;
    }

    async fn handle_stranger_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let Packet::Connect { client_version } = packet else {
            warn!("Unexpected packet from unknown peer {}", addr);
            return;
        };

        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_unsequenced(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        let assigned = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        match assigned {
            Ok(player) => {
                if let Err(e) = self.match_state.player_joined(player) {
                    error!("Could not bring {} into the match: {}", player, e);
                }
                self.flush_outbox().await;
            }
            Err(GameError::MatchFull) => {
                self.send_unsequenced(
                    Packet::Disconnected {
                        reason: "Match full".to_string(),
                    },
                    addr,
                );
            }
            Err(e) => error!("Could not assign identity to {}: {}", addr, e),
        }
    }

    /// Processes a packet from a connected player
    async fn handle_packet(&mut self, player: PlayerId, packet: Packet) -> Result<(), GameError> {
        match packet {
            Packet::Connect { .. } => {
                // Our Connected was lost; repeat it without a new identity
                debug!("Repeated connect from {}", player);
                let welcome = Packet::Connected {
                    player_id: player,
                    level: self.match_state.level().clone(),
                };
                self.send_to_player(player, welcome, Delivery::Reliable).await;
            }

            Packet::Heartbeat => {}

            Packet::NotifyHit(notify) => {
                self.match_state.handle_notify_hit(player, &notify)?;
            }

            Packet::NotifyMiss { shoot_direction } => {
                self.match_state.handle_notify_miss(player, shoot_direction)?;
            }

            Packet::RespawnRequest => {
                self.match_state.handle_respawn_request(player)?;
            }

            Packet::Disconnect => {
                self.drop_player(player).await;
            }

            other => {
                warn!("Unexpected packet {:?} from {}", other, player);
            }
        }
        Ok(())
    }

    async fn drop_player(&mut self, player: PlayerId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&player);
        }
        self.match_state.player_left(player);
        self.flush_outbox().await;
    }

    /// Resends every reliable datagram whose acknowledgement is overdue
    async fn resend_unacked(&mut self) {
        let now = Instant::now();
        let resends: Vec<(Datagram, SocketAddr)> = {
            let mut clients = self.clients.write().await;
            clients
                .clients_mut()
                .flat_map(|client| {
                    let addr = client.addr;
                    client
                        .channel
                        .due_resends(now)
                        .into_iter()
                        .map(move |datagram| (datagram, addr))
                })
                .collect()
        };

        for (datagram, addr) in resends {
            self.send_datagram(datagram, addr);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::DatagramReceived { datagram, addr }) => {
                            self.handle_datagram(datagram, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { player_id }) => {
                            info!("{} timed out", player_id);
                            self.match_state.player_left(player_id);
                            self.flush_outbox().await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.resend_unacked().await;
                    self.match_state.tick += 1;

                    // Periodic status
                    if self.match_state.tick % 300 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };

                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {} characters, score {:?}",
                                   self.match_state.tick, client_count,
                                   self.match_state.character_count(), self.match_state.score());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
