use crate::game::ClientGameState;
use crate::presentation::LogPresentation;
use bincode::{deserialize, serialize};
use glam::Vec3;
use log::{error, info, warn};
use shared::weapon::Weapon;
use shared::{Datagram, Delivery, Packet, ReliableChannel, PROTOCOL_VERSION, RESEND_INTERVAL_MS};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Settings for a headless duelling client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub fake_ping_ms: u64,
    /// Zero disables automatic fire
    pub fire_interval: Duration,
    pub respawn_delay: Duration,
    pub draw_trails: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            fake_ping_ms: 0,
            fire_interval: Duration::from_millis(750),
            respawn_delay: Duration::from_secs(2),
            draw_trails: true,
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    channel: ReliableChannel,

    game_state: ClientGameState,
    presentation: LogPresentation,

    fake_ping_ms: u64,
    fire_interval: Duration,
    respawn_delay: Duration,
    unpossessed_since: Option<Instant>,
}

impl Client {
    pub async fn new(config: ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = config.server_addr.parse()?;

        let weapon = if config.draw_trails {
            Weapon::default()
        } else {
            Weapon::without_effect()
        };

        Ok(Client {
            socket,
            server_addr,
            channel: ReliableChannel::new(Duration::from_millis(RESEND_INTERVAL_MS)),
            game_state: ClientGameState::new(weapon),
            presentation: LogPresentation::default(),
            fake_ping_ms: config.fake_ping_ms,
            fire_interval: config.fire_interval,
            respawn_delay: config.respawn_delay,
            unpossessed_since: None,
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(packet, Delivery::Unreliable).await
    }

    async fn send_datagram(&self, datagram: &Datagram) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(datagram)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_packet(
        &mut self,
        packet: Packet,
        delivery: Delivery,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let datagram = self.channel.wrap(packet, delivery, Instant::now());
        self.send_datagram(&datagram).await
    }

    async fn handle_datagram(&mut self, datagram: Datagram) {
        let received = self.channel.receive(datagram);

        if let Some(ack) = received.ack {
            if let Err(e) = self.send_datagram(&ack).await {
                error!("Error sending ack: {}", e);
            }
        }

        for packet in received.packets {
            self.game_state.apply_packet(packet, &mut self.presentation);
        }
    }

    async fn fire(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let aim = self.game_state.aim_at_opponent().unwrap_or(Vec3::X);
        let Some(shot) = self.game_state.shoot(aim, &mut self.presentation) else {
            return Ok(());
        };

        if let Some((packet, delivery)) = shot.report {
            self.send_packet(packet, delivery).await?;
        }
        Ok(())
    }

    /// Requests a new body once we have been without one for the delay
    async fn maybe_respawn(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.game_state.possessed().is_some() || !self.game_state.is_connected() {
            self.unpossessed_since = None;
            return Ok(());
        }

        let since = *self.unpossessed_since.get_or_insert_with(Instant::now);
        if since.elapsed() < self.respawn_delay {
            return Ok(());
        }

        if let Some(request) = self.game_state.try_respawn() {
            self.send_packet(request, Delivery::Reliable).await?;
            self.unpossessed_since = Some(Instant::now());
        }
        Ok(())
    }

    async fn resend_unacked(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for datagram in self.channel.due_resends(Instant::now()) {
            self.send_datagram(&datagram).await?;
        }
        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut connect_interval = interval(Duration::from_millis(500));
        let mut heartbeat_interval = interval(Duration::from_secs(1));
        let mut resend_interval = interval(Duration::from_millis(RESEND_INTERVAL_MS / 2));
        let mut fire_interval = interval(self.fire_interval.max(Duration::from_millis(50)));
        let mut respawn_interval = interval(Duration::from_millis(250));

        let mut buffer = [0u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Datagram>(&buffer[0..len]) {
                                Ok(datagram) => self.handle_datagram(datagram).await,
                                Err(e) => warn!("Failed to deserialize datagram: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving datagram: {}", e),
                    }
                },

                _ = connect_interval.tick() => {
                    let waiting = !self.game_state.is_connected()
                        && self.game_state.disconnect_reason().is_none();
                    if waiting {
                        self.connect().await?;
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.game_state.is_connected() {
                        self.send_packet(Packet::Heartbeat, Delivery::Unreliable).await?;
                    }
                },

                _ = resend_interval.tick() => {
                    if let Err(e) = self.resend_unacked().await {
                        error!("Error resending: {}", e);
                    }
                },

                _ = fire_interval.tick(), if !self.fire_interval.is_zero() => {
                    if let Err(e) = self.fire().await {
                        error!("Error firing: {}", e);
                    }
                },

                _ = respawn_interval.tick() => {
                    if let Err(e) = self.maybe_respawn().await {
                        error!("Error requesting respawn: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving the match");
                    break;
                },
            }

            if let Some(reason) = self.game_state.disconnect_reason() {
                info!("Server closed the session: {}", reason);
                break;
            }
        }

        if self.game_state.is_connected() {
            let _ = self.send_packet(Packet::Disconnect, Delivery::Unreliable).await;
        }

        let score = self.game_state.score();
        info!(
            "Final score {} : {} after {} beams drawn",
            score.player1_score, score.player2_score, self.presentation.trails_drawn
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.draw_trails);
        assert!(!config.fire_interval.is_zero());
        assert!(config.server_addr.parse::<SocketAddr>().is_ok());
    }

    #[tokio::test]
    async fn test_client_binds_and_parses_server() {
        let client = Client::new(ClientConfig::default()).await.unwrap();
        assert_eq!(client.server_addr, "127.0.0.1:8080".parse().unwrap());
        assert!(!client.game_state.is_connected());
    }

    #[test]
    fn test_bad_server_address_is_an_error() {
        let config = ClientConfig {
            server_addr: "not an address".to_string(),
            ..ClientConfig::default()
        };
        assert!(tokio_test::block_on(Client::new(config)).is_err());
    }
}
