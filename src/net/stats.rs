//! 统计信息
//!
//! 链路层统计；转发层计数见 [`crate::ndn::ForwarderStats`]。

use serde::Serialize;

/// 网络统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// 开始在链路上发送的报文数
    pub tx_pkts: u64,
    pub tx_bytes: u64,
    /// 到达节点的报文数
    pub delivered_pkts: u64,
    pub queue_drops: u64,
    pub ce_marks: u64,
    /// 标签无法解码而丢弃
    pub malformed: u64,
}
