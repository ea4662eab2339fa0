//! Simulated packets and their delivery bookkeeping.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Bitflag set recording what happened to a packet on its way through the
/// simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDeliveryStatus(u32);

impl PacketDeliveryStatus {
    pub const NONE: PacketDeliveryStatus = PacketDeliveryStatus(0);
    /// The sender's copy made it onto the wire.
    pub const INET_SENT: PacketDeliveryStatus = PacketDeliveryStatus(1 << 0);
    /// Dropped by path reliability before reaching the destination.
    pub const INET_DROPPED: PacketDeliveryStatus = PacketDeliveryStatus(1 << 1);
    /// Queued at the destination's upstream router.
    pub const ROUTER_ENQUEUED: PacketDeliveryStatus = PacketDeliveryStatus(1 << 2);
    /// Dequeued from the destination's upstream router.
    pub const ROUTER_DEQUEUED: PacketDeliveryStatus = PacketDeliveryStatus(1 << 3);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: PacketDeliveryStatus) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: PacketDeliveryStatus) -> PacketDeliveryStatus {
        PacketDeliveryStatus(self.0 | other.0)
    }
}

/// A unit of simulated network traffic.
///
/// Packets are shared between the sending and receiving timelines as
/// `Arc<Packet>`; the status word is atomic so either side may stamp it.
/// Payload bytes themselves are not modeled, only their length; a length
/// of zero marks a control packet, which is exempt from reliability drops.
#[derive(Debug)]
pub struct Packet {
    source: (Ipv4Addr, u16),
    destination: (Ipv4Addr, u16),
    payload_len: usize,
    status: AtomicU32,
}

impl Packet {
    pub fn new(source: (Ipv4Addr, u16), destination: (Ipv4Addr, u16), payload_len: usize) -> Self {
        Self {
            source,
            destination,
            payload_len,
            status: AtomicU32::new(0),
        }
    }

    pub fn source_ip(&self) -> Ipv4Addr {
        self.source.0
    }

    pub fn source_port(&self) -> u16 {
        self.source.1
    }

    pub fn destination_ip(&self) -> Ipv4Addr {
        self.destination.0
    }

    pub fn destination_port(&self) -> u16 {
        self.destination.1
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// True for zero-length control packets.
    pub fn is_control(&self) -> bool {
        self.payload_len == 0
    }

    /// Stamp a delivery-status flag onto the packet.
    pub fn add_delivery_status(&self, status: PacketDeliveryStatus) {
        self.status.fetch_or(status.bits(), Ordering::Relaxed);
    }

    pub fn delivery_status(&self) -> PacketDeliveryStatus {
        PacketDeliveryStatus(self.status.load(Ordering::Relaxed))
    }

    /// Produce the destination timeline's copy of this packet.
    ///
    /// The copy snapshots the current status and evolves independently from
    /// then on: stamps on the delivered copy do not appear on the sender's
    /// original, matching how each side accounts for its own half of the
    /// path.
    pub fn copy_for_delivery(&self) -> Arc<Packet> {
        Arc::new(Packet {
            source: self.source,
            destination: self.destination,
            payload_len: self.payload_len,
            status: AtomicU32::new(self.status.load(Ordering::Relaxed)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_packet(payload_len: usize) -> Packet {
        Packet::new(
            (Ipv4Addr::new(11, 0, 0, 1), 9000),
            (Ipv4Addr::new(11, 0, 0, 2), 9001),
            payload_len,
        )
    }

    #[test]
    fn test_status_flags_accumulate() {
        let p = test_packet(100);
        assert_eq!(p.delivery_status(), PacketDeliveryStatus::NONE);

        p.add_delivery_status(PacketDeliveryStatus::INET_SENT);
        p.add_delivery_status(PacketDeliveryStatus::ROUTER_ENQUEUED);

        let status = p.delivery_status();
        assert!(status.contains(PacketDeliveryStatus::INET_SENT));
        assert!(status.contains(PacketDeliveryStatus::ROUTER_ENQUEUED));
        assert!(!status.contains(PacketDeliveryStatus::INET_DROPPED));
    }

    #[test]
    fn test_control_packet() {
        assert!(test_packet(0).is_control());
        assert!(!test_packet(1).is_control());
    }

    #[test]
    fn test_copy_for_delivery_diverges() {
        let p = test_packet(64);
        p.add_delivery_status(PacketDeliveryStatus::INET_SENT);

        let copy = p.copy_for_delivery();
        assert!(copy
            .delivery_status()
            .contains(PacketDeliveryStatus::INET_SENT));

        copy.add_delivery_status(PacketDeliveryStatus::ROUTER_ENQUEUED);
        assert!(!p
            .delivery_status()
            .contains(PacketDeliveryStatus::ROUTER_ENQUEUED));
    }
}
