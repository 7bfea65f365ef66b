//! Interest / Data 报文头
//!
//! NACK 复用 Interest 报文，用 `nack` 字段区分；BCube 路由标签不属于报文头，
//! 由 [`crate::net::Packet`] 信封单独携带。

use super::name::Name;
use crate::sim::SimTime;
use bytes::Bytes;

/// NACK 类型（与 Interest 共用报文格式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NackCode {
    #[default]
    Normal,
    Loop,
    Congestion,
    GiveupPit,
}

impl NackCode {
    /// 线上编码值
    pub fn code(self) -> u8 {
        match self {
            NackCode::Normal => 0,
            NackCode::Loop => 10,
            NackCode::Congestion => 11,
            NackCode::GiveupPit => 12,
        }
    }

    pub fn is_nack(self) -> bool {
        self != NackCode::Normal
    }
}

/// 下游真实请求者收到的 NACK：全额惩罚
pub const INTRA_SHARING_FULL: u32 = 120;

pub const DEFAULT_INTEREST_LIFETIME: SimTime = SimTime::from_secs(2);

const INTEREST_HEADER_BYTES: u32 = 24;
const DATA_HEADER_BYTES: u32 = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub nack: NackCode,
    /// 仅对 NACK 有意义：>100 表示全额惩罚，[0,100] 表示按百分比惩罚
    pub intra_sharing: u32,
    pub lifetime: SimTime,
}

impl Interest {
    pub fn new(name: Name, nonce: u32) -> Self {
        Self {
            name,
            nonce,
            nack: NackCode::Normal,
            intra_sharing: INTRA_SHARING_FULL,
            lifetime: DEFAULT_INTEREST_LIFETIME,
        }
    }

    pub fn with_lifetime(mut self, lifetime: SimTime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// 名字最后一个分量携带的序列号
    pub fn seq(&self) -> Option<u32> {
        self.name.seq()
    }

    pub fn is_nack(&self) -> bool {
        self.nack.is_nack()
    }

    /// 由本 Interest 派生的 NACK
    pub fn to_nack(&self, code: NackCode, intra_sharing: u32) -> Interest {
        Interest {
            nack: code,
            intra_sharing,
            ..self.clone()
        }
    }

    /// NACK 还原成普通 Interest（用于重试转发）
    pub fn to_normal(&self) -> Interest {
        Interest {
            nack: NackCode::Normal,
            intra_sharing: INTRA_SHARING_FULL,
            ..self.clone()
        }
    }

    pub fn wire_size(&self) -> u32 {
        INTEREST_HEADER_BYTES + name_bytes(&self.name)
    }
}

/// Data 的拥塞标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CongestionMark {
    #[default]
    NotMarked,
    /// 途经队列超过阈值
    Experienced,
    /// 由本节点缓存直接命中
    LocalHit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub payload: Bytes,
    pub ce: CongestionMark,
}

impl Data {
    pub fn new(name: Name, payload: Bytes) -> Self {
        Self {
            name,
            payload,
            ce: CongestionMark::NotMarked,
        }
    }

    pub fn wire_size(&self) -> u32 {
        DATA_HEADER_BYTES + name_bytes(&self.name) + self.payload.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdnPacket {
    Interest(Interest),
    Data(Data),
}

impl NdnPacket {
    pub fn name(&self) -> &Name {
        match self {
            NdnPacket::Interest(i) => &i.name,
            NdnPacket::Data(d) => &d.name,
        }
    }

    pub fn wire_size(&self) -> u32 {
        match self {
            NdnPacket::Interest(i) => i.wire_size(),
            NdnPacket::Data(d) => d.wire_size(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NdnPacket::Interest(i) if i.is_nack() => "nack",
            NdnPacket::Interest(_) => "interest",
            NdnPacket::Data(_) => "data",
        }
    }
}

fn name_bytes(name: &Name) -> u32 {
    name.components()
        .iter()
        .map(|c| c.len() as u32 + 2)
        .sum()
}
