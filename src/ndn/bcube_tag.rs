//! BCube 源路由标签
//!
//! 每个报文随带的小型旁路记录，不属于 NDN 报文头。Interest 方向携带路径置换
//! （permutation）以及本跳在置换中的位置，中间节点据此确定下一跳；Data/NACK
//! 方向只携带交换机出端口（next hop），即上游节点记录下的本地端口。
//!
//! 置换编码：第 i 个十进制位（从低位数）保存第 i 跳修正的层号加一，0 表示结束，
//! 因此一个 `u32` 最多描述 [`MAX_HOPS`] 层。
//!
//! 线上格式（大端，共 14 字节）：
//!
//! ```text
//! metric: u32 | cur: u8 | interest: u8 | next_hop: u32 | prev_hop: u32
//! ```

use crate::error::TagError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 置换最多容纳的层数（十进制位数）
pub const MAX_HOPS: u8 = 9;

/// 未设置的端口
pub const UNSET_HOP: u32 = u32::MAX;

/// 把层号序列编码成置换整数
pub fn encode_permutation(levels: &[u8]) -> u32 {
    assert!(levels.len() <= MAX_HOPS as usize, "permutation too long: {levels:?}");
    levels.iter().rev().fold(0u32, |acc, &level| {
        assert!(level < MAX_HOPS, "level {level} does not fit one digit");
        acc * 10 + u32::from(level) + 1
    })
}

/// 解码置换整数为层号序列
pub fn permutation_levels(mut permutation: u32) -> Vec<u8> {
    let mut levels = Vec::new();
    while permutation % 10 != 0 {
        levels.push((permutation % 10 - 1) as u8);
        permutation /= 10;
    }
    levels
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BCubeTag {
    metric: u32,
    cur: u8,
    interest: bool,
    next_hop: u32,
    prev_hop: u32,
}

impl Default for BCubeTag {
    fn default() -> Self {
        Self {
            metric: 0,
            cur: 0,
            interest: true,
            next_hop: UNSET_HOP,
            prev_hop: UNSET_HOP,
        }
    }
}

impl BCubeTag {
    pub const SERIALIZED_SIZE: usize = 4 + 1 + 1 + 4 + 4;

    /// Interest 方向的标签
    pub fn for_interest(permutation: u32, cur: u8, prev_hop: u32, next_hop: u32) -> Self {
        assert!(cur < MAX_HOPS, "hop index {cur} out of range");
        Self {
            metric: permutation,
            cur,
            interest: true,
            next_hop,
            prev_hop,
        }
    }

    /// Data/NACK 方向的标签：只需交换机出端口
    pub fn for_data(next_hop: u32) -> Self {
        Self {
            interest: false,
            next_hop,
            ..Self::default()
        }
    }

    pub fn permutation(&self) -> u32 {
        self.metric
    }

    pub fn cur(&self) -> u8 {
        self.cur
    }

    pub fn is_interest(&self) -> bool {
        self.interest
    }

    pub fn next_hop(&self) -> u32 {
        self.next_hop
    }

    pub fn prev_hop(&self) -> u32 {
        self.prev_hop
    }

    pub fn set_prev_hop(&mut self, port: u32) {
        self.prev_hop = port;
    }

    /// 置换的第 `k` 个十进制位
    pub fn digit(&self, k: u8) -> u32 {
        if k >= 10 {
            return 0;
        }
        (self.metric / 10u32.pow(u32::from(k))) % 10
    }

    /// 第 `k` 跳修正的层号
    pub fn level_at(&self, k: u8) -> Option<u8> {
        match self.digit(k) {
            0 => None,
            d => Some(d as u8 - 1),
        }
    }

    /// 发出本报文的那一跳所使用的层
    pub fn current_level(&self) -> Option<u8> {
        self.level_at(self.cur)
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.metric);
        buf.put_u8(self.cur);
        buf.put_u8(u8::from(self.interest));
        buf.put_u32(self.next_hop);
        buf.put_u32(self.prev_hop);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, TagError> {
        if buf.remaining() < Self::SERIALIZED_SIZE {
            return Err(TagError::Truncated {
                need: Self::SERIALIZED_SIZE,
                have: buf.remaining(),
            });
        }
        let metric = buf.get_u32();
        let cur = buf.get_u8();
        if cur >= MAX_HOPS {
            return Err(TagError::HopOutOfRange(cur));
        }
        let interest = match buf.get_u8() {
            0 => false,
            1 => true,
            other => return Err(TagError::InvalidKind(other)),
        };
        let next_hop = buf.get_u32();
        let prev_hop = buf.get_u32();
        Ok(Self {
            metric,
            cur,
            interest,
            next_hop,
            prev_hop,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SERIALIZED_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn from_bytes(bytes: &Bytes) -> Result<Self, TagError> {
        Self::decode(&mut bytes.clone())
    }
}
