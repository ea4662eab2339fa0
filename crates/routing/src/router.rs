//! Per-host upstream packet queue.

use crate::{Packet, PacketDeliveryStatus};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// The queue that delivered packets land in at their destination host.
///
/// A delivery event enqueues the packet here; the host's network stack
/// dequeues at its own pace. The queue is a plain FIFO behind a mutex:
/// only the destination host's events touch it, so contention is nil.
#[derive(Debug, Default)]
pub struct Router {
    queue: Mutex<VecDeque<Arc<Packet>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a delivered packet into the upstream queue.
    pub fn enqueue(&self, packet: Arc<Packet>) {
        packet.add_delivery_status(PacketDeliveryStatus::ROUTER_ENQUEUED);
        self.queue.lock().push_back(packet);
    }

    /// Hand the oldest queued packet to the host's network stack.
    pub fn dequeue(&self) -> Option<Arc<Packet>> {
        let packet = self.queue.lock().pop_front();
        if let Some(p) = &packet {
            p.add_delivery_status(PacketDeliveryStatus::ROUTER_DEQUEUED);
        }
        packet
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn packet() -> Arc<Packet> {
        Arc::new(Packet::new(
            (Ipv4Addr::new(11, 0, 0, 1), 80),
            (Ipv4Addr::new(11, 0, 0, 2), 80),
            10,
        ))
    }

    #[test]
    fn test_fifo_order_and_status() {
        let router = Router::new();
        let (a, b) = (packet(), packet());
        router.enqueue(a.clone());
        router.enqueue(b.clone());
        assert_eq!(router.len(), 2);
        assert!(a
            .delivery_status()
            .contains(PacketDeliveryStatus::ROUTER_ENQUEUED));

        let first = router.dequeue().unwrap();
        assert!(Arc::ptr_eq(&first, &a));
        assert!(first
            .delivery_status()
            .contains(PacketDeliveryStatus::ROUTER_DEQUEUED));

        assert!(Arc::ptr_eq(&router.dequeue().unwrap(), &b));
        assert!(router.dequeue().is_none());
        assert!(router.is_empty());
    }
}
