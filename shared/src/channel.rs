//! Datagram envelope and the per-peer reliable-ordered channel.
//!
//! Every UDP payload is a [`Datagram`]. Unreliable packets go out bare and may
//! be lost or reordered. Reliable packets carry a sequence number, are resent
//! until acknowledged and are handed to the application strictly in order.

use crate::protocol::Packet;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Out-of-order reliable packets buffered beyond this window are dropped and
/// will arrive again through resend.
pub const RECEIVE_WINDOW: u32 = 256;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Datagram {
    Reliable { sequence: u32, packet: Packet },
    Ack { sequence: u32 },
    Unreliable { packet: Packet },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Reliable,
    Unreliable,
}

#[derive(Debug)]
struct InFlight {
    packet: Packet,
    last_sent: Instant,
}

/// Result of feeding one inbound datagram into the channel.
#[derive(Debug, Default)]
pub struct Received {
    /// Acknowledgement to send back, for reliable datagrams.
    pub ack: Option<Datagram>,
    /// Packets now deliverable, in order.
    pub packets: Vec<Packet>,
}

#[derive(Debug)]
pub struct ReliableChannel {
    next_outgoing: u32,
    in_flight: BTreeMap<u32, InFlight>,
    next_incoming: u32,
    out_of_order: BTreeMap<u32, Packet>,
    resend_interval: Duration,
}

impl ReliableChannel {
    pub fn new(resend_interval: Duration) -> Self {
        Self {
            next_outgoing: 0,
            in_flight: BTreeMap::new(),
            next_incoming: 0,
            out_of_order: BTreeMap::new(),
            resend_interval,
        }
    }

    /// Wraps an outbound packet, registering it for resend when reliable.
    pub fn wrap(&mut self, packet: Packet, delivery: Delivery, now: Instant) -> Datagram {
        match delivery {
            Delivery::Unreliable => Datagram::Unreliable { packet },
            Delivery::Reliable => {
                let sequence = self.next_outgoing;
                self.next_outgoing += 1;
                self.in_flight.insert(
                    sequence,
                    InFlight {
                        packet: packet.clone(),
                        last_sent: now,
                    },
                );
                Datagram::Reliable { sequence, packet }
            }
        }
    }

    pub fn receive(&mut self, datagram: Datagram) -> Received {
        match datagram {
            Datagram::Unreliable { packet } => Received {
                ack: None,
                packets: vec![packet],
            },
            Datagram::Ack { sequence } => {
                self.in_flight.remove(&sequence);
                Received::default()
            }
            Datagram::Reliable { sequence, packet } => {
                let ack = Some(Datagram::Ack { sequence });

                if sequence < self.next_incoming {
                    debug!("Dropping duplicate reliable packet {}", sequence);
                    return Received {
                        ack,
                        packets: Vec::new(),
                    };
                }
                if sequence - self.next_incoming >= RECEIVE_WINDOW {
                    // Not acknowledged so the sender keeps trying
                    return Received::default();
                }

                self.out_of_order.insert(sequence, packet);

                let mut packets = Vec::new();
                while let Some(packet) = self.out_of_order.remove(&self.next_incoming) {
                    packets.push(packet);
                    self.next_incoming += 1;
                }

                Received { ack, packets }
            }
        }
    }

    /// Reliable datagrams whose last transmission is older than the resend
    /// interval. Marks them as sent at `now`.
    pub fn due_resends(&mut self, now: Instant) -> Vec<Datagram> {
        let interval = self.resend_interval;
        self.in_flight
            .iter_mut()
            .filter(|(_, pending)| now.duration_since(pending.last_sent) >= interval)
            .map(|(sequence, pending)| {
                pending.last_sent = now;
                Datagram::Reliable {
                    sequence: *sequence,
                    packet: pending.packet.clone(),
                }
            })
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;

    fn channel() -> ReliableChannel {
        ReliableChannel::new(Duration::from_millis(100))
    }

    fn removed(id: u32) -> Packet {
        Packet::CharacterRemoved {
            character: ActorId::Character(id),
        }
    }

    #[test]
    fn test_unreliable_is_not_tracked() {
        let mut sender = channel();
        let datagram = sender.wrap(Packet::Heartbeat, Delivery::Unreliable, Instant::now());
        assert_eq!(datagram, Datagram::Unreliable { packet: Packet::Heartbeat });
        assert_eq!(sender.in_flight(), 0);
    }

    #[test]
    fn test_reliable_delivery_and_ack() {
        let now = Instant::now();
        let mut sender = channel();
        let mut receiver = channel();

        let datagram = sender.wrap(removed(1), Delivery::Reliable, now);
        assert_eq!(sender.in_flight(), 1);

        let received = receiver.receive(datagram);
        assert_eq!(received.packets, vec![removed(1)]);

        sender.receive(received.ack.unwrap());
        assert_eq!(sender.in_flight(), 0);
    }

    #[test]
    fn test_out_of_order_packets_are_released_in_order() {
        let now = Instant::now();
        let mut sender = channel();
        let mut receiver = channel();

        let first = sender.wrap(removed(1), Delivery::Reliable, now);
        let second = sender.wrap(removed(2), Delivery::Reliable, now);
        let third = sender.wrap(removed(3), Delivery::Reliable, now);

        assert!(receiver.receive(third).packets.is_empty());
        assert!(receiver.receive(second).packets.is_empty());
        assert_eq!(
            receiver.receive(first).packets,
            vec![removed(1), removed(2), removed(3)]
        );
    }

    #[test]
    fn test_duplicates_are_acked_but_not_redelivered() {
        let now = Instant::now();
        let mut sender = channel();
        let mut receiver = channel();

        let datagram = sender.wrap(removed(1), Delivery::Reliable, now);
        assert_eq!(receiver.receive(datagram.clone()).packets.len(), 1);

        let again = receiver.receive(datagram);
        assert!(again.packets.is_empty());
        assert_eq!(again.ack, Some(Datagram::Ack { sequence: 0 }));
    }

    #[test]
    fn test_resend_after_interval() {
        let start = Instant::now();
        let mut sender = channel();
        sender.wrap(removed(1), Delivery::Reliable, start);

        assert!(sender.due_resends(start + Duration::from_millis(50)).is_empty());

        let resent = sender.due_resends(start + Duration::from_millis(150));
        assert_eq!(resent.len(), 1);
        assert!(matches!(resent[0], Datagram::Reliable { sequence: 0, .. }));

        // Just resent, so not due again immediately
        assert!(sender.due_resends(start + Duration::from_millis(160)).is_empty());
    }

    #[test]
    fn test_far_future_sequence_is_not_acked() {
        let mut receiver = channel();
        let received = receiver.receive(Datagram::Reliable {
            sequence: RECEIVE_WINDOW + 5,
            packet: Packet::Heartbeat,
        });
        assert!(received.ack.is_none());
        assert!(received.packets.is_empty());
    }
}
