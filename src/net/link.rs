//! 链路类型
//!
//! 单向链路：出口队列 + 串行化时延 + 传播时延。

use super::id::NodeId;
use crate::ndn::FaceId;
use crate::queue::{DropTailQueue, PacketQueue};
use crate::sim::SimTime;

/// 网络链路
#[derive(Debug)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
    /// 接收端的接口
    pub to_face: FaceId,
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    /// ECN 标记阈值（bytes）。None 表示不开启 CE 标记。
    pub ecn_threshold_bytes: Option<u64>,
    pub queue: Box<dyn PacketQueue>,
    pub(crate) transmitting: bool,
    pub tx_pkts: u64,
    pub tx_bytes: u64,
}

impl Link {
    /// 创建新链路
    pub fn new(
        from: NodeId,
        to: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
        queue_bytes: u64,
    ) -> Self {
        Self {
            from,
            to,
            to_face: FaceId(u32::MAX),
            latency,
            bandwidth_bps,
            ecn_threshold_bytes: None,
            queue: Box::new(DropTailQueue::new(queue_bytes)),
            transmitting: false,
            tx_pkts: 0,
            tx_bytes: 0,
        }
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u32) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = u128::from(bytes).saturating_mul(8);
        let bps = u128::from(self.bandwidth_bps);
        let nanos = (bits.saturating_mul(1_000_000_000) + (bps - 1)) / bps;
        SimTime(nanos.min(u128::from(u64::MAX)) as u64)
    }

    /// 队列字节数超过阈值时需要打 CE
    pub(crate) fn should_mark(&self) -> bool {
        self.ecn_threshold_bytes
            .is_some_and(|th| self.queue.bytes() >= th)
    }
}
