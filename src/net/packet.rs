//! 报文信封
//!
//! 节点内部使用 [`Packet`]：NDN 报文头 + 可选的 BCube 标签（已解码）。
//! 链路上传输 [`WirePacket`]：标签以 14 字节的线上格式随行，
//! 到达下一节点时重新解码。

use crate::error::TagError;
use crate::ndn::{BCubeTag, CongestionMark, NdnPacket};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: u64,
    pub header: NdnPacket,
    pub tag: Option<BCubeTag>,
}

impl Packet {
    pub fn size_bytes(&self) -> u32 {
        let tag = if self.tag.is_some() {
            BCubeTag::SERIALIZED_SIZE as u32
        } else {
            0
        };
        self.header.wire_size() + tag
    }

    /// 编码标签，准备上链路
    pub fn into_wire(self) -> WirePacket {
        WirePacket {
            id: self.id,
            tag: self.tag.map(|t| t.to_bytes()),
            header: self.header,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WirePacket {
    pub id: u64,
    pub header: NdnPacket,
    pub tag: Option<Bytes>,
}

impl WirePacket {
    pub fn size_bytes(&self) -> u32 {
        self.header.wire_size() + self.tag.as_ref().map_or(0, |t| t.len() as u32)
    }

    /// 解码标签
    pub fn into_packet(self) -> Result<Packet, TagError> {
        let tag = self.tag.as_ref().map(BCubeTag::from_bytes).transpose()?;
        Ok(Packet {
            id: self.id,
            header: self.header,
            tag,
        })
    }

    /// 给 Data 打上 CE 标记；返回是否新打了标记
    pub fn mark_ce(&mut self) -> bool {
        match &mut self.header {
            NdnPacket::Data(d) if d.ce == CongestionMark::NotMarked => {
                d.ce = CongestionMark::Experienced;
                true
            }
            _ => false,
        }
    }
}
