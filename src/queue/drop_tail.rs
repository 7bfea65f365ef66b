//! 尾丢弃队列

use std::collections::VecDeque;

use super::{PacketQueue, QueueDrops};
use crate::net::WirePacket;
use tracing::trace;

#[derive(Debug)]
pub struct DropTailQueue {
    capacity: u64,
    occupied: u64,
    peak: u64,
    drops: QueueDrops,
    pkts: VecDeque<WirePacket>,
}

impl DropTailQueue {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            occupied: 0,
            peak: 0,
            drops: QueueDrops::default(),
            pkts: VecDeque::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(u64::MAX)
    }
}

impl PacketQueue for DropTailQueue {
    fn enqueue(&mut self, pkt: WirePacket) -> Result<(), WirePacket> {
        let size = u64::from(pkt.size_bytes());
        let after = self.occupied.saturating_add(size);
        if after > self.capacity {
            self.drops.record(&pkt.header);
            trace!(
                pkt_id = pkt.id,
                kind = pkt.header.kind(),
                occupied = self.occupied,
                "尾丢弃"
            );
            return Err(pkt);
        }
        self.occupied = after;
        self.peak = self.peak.max(after);
        self.pkts.push_back(pkt);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<WirePacket> {
        let pkt = self.pkts.pop_front()?;
        self.occupied = self.occupied.saturating_sub(u64::from(pkt.size_bytes()));
        Some(pkt)
    }

    fn len(&self) -> usize {
        self.pkts.len()
    }

    fn bytes(&self) -> u64 {
        self.occupied
    }

    fn peak_bytes(&self) -> u64 {
        self.peak
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity
    }

    fn drops(&self) -> QueueDrops {
        self.drops
    }
}
