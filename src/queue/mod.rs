//! 链路出口队列
//!
//! 按字节计容量，丢弃按 Interest / NACK / Data 分开计数，
//! 方便区分是请求还是回程被挤掉。目前只有 DropTail。

use crate::ndn::NdnPacket;
use crate::net::WirePacket;
use serde::Serialize;

mod drop_tail;

pub use drop_tail::DropTailQueue;

/// 按包数配置队列时使用的平均包长
pub const DEFAULT_PKT_BYTES: u64 = 1500;

pub fn mem_from_pkt(pkts: u64) -> u64 {
    pkts.saturating_mul(DEFAULT_PKT_BYTES)
}

/// 分类型的丢弃计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDrops {
    pub interests: u64,
    pub nacks: u64,
    pub data: u64,
}

impl QueueDrops {
    pub fn record(&mut self, header: &NdnPacket) {
        match header {
            NdnPacket::Interest(i) if i.is_nack() => self.nacks += 1,
            NdnPacket::Interest(_) => self.interests += 1,
            NdnPacket::Data(_) => self.data += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.interests + self.nacks + self.data
    }
}

pub trait PacketQueue: std::fmt::Debug + Send {
    /// 队列满时原样退回
    fn enqueue(&mut self, pkt: WirePacket) -> Result<(), WirePacket>;
    fn dequeue(&mut self) -> Option<WirePacket>;

    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn bytes(&self) -> u64;
    /// 运行以来的最高占用
    fn peak_bytes(&self) -> u64;
    fn capacity_bytes(&self) -> u64;
    fn drops(&self) -> QueueDrops;
}
