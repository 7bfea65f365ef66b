//! 接口（Face）
//!
//! 接口分两类：本地应用接口与网络链路接口，用显式的 [`FaceKind`] 区分。
//! 每个网络接口自带一个出方向令牌桶。

use super::limits::LimitsDeltaRate;
use super::packet::NdnPacket;
use crate::net::LinkId;
use serde::Serialize;

/// 节点内的接口序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u32);

/// 节点内的应用序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    Application { app: AppId },
    /// `port` 是服务器上的端口号，在 BCube 中等于所连交换机的层号
    NetworkLink { link: LinkId, port: u8 },
}

/// 每接口收发计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FaceCounters {
    pub in_interests: u64,
    pub in_nacks: u64,
    pub in_data: u64,
    pub out_interests: u64,
    pub out_nacks: u64,
    pub out_data: u64,
    pub send_failures: u64,
}

impl FaceCounters {
    pub(crate) fn record_in(&mut self, pkt: &NdnPacket) {
        match pkt {
            NdnPacket::Interest(i) if i.is_nack() => self.in_nacks += 1,
            NdnPacket::Interest(_) => self.in_interests += 1,
            NdnPacket::Data(_) => self.in_data += 1,
        }
    }

    pub(crate) fn record_out(&mut self, pkt: &NdnPacket) {
        match pkt {
            NdnPacket::Interest(i) if i.is_nack() => self.out_nacks += 1,
            NdnPacket::Interest(_) => self.out_interests += 1,
            NdnPacket::Data(_) => self.out_data += 1,
        }
    }
}

#[derive(Debug)]
pub struct Face {
    id: FaceId,
    kind: FaceKind,
    up: bool,
    pub limits: LimitsDeltaRate,
    pub counters: FaceCounters,
}

impl Face {
    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    pub fn is_app(&self) -> bool {
        matches!(self.kind, FaceKind::Application { .. })
    }

    pub fn port(&self) -> Option<u8> {
        match self.kind {
            FaceKind::NetworkLink { port, .. } => Some(port),
            FaceKind::Application { .. } => None,
        }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn set_up(&mut self, up: bool) {
        self.up = up;
    }
}

/// 节点上的接口表，`FaceId` 即下标
#[derive(Debug, Default)]
pub struct FaceTable {
    faces: Vec<Face>,
    next_port: u8,
}

impl FaceTable {
    fn push(&mut self, kind: FaceKind) -> FaceId {
        let id = FaceId(self.faces.len() as u32);
        self.faces.push(Face {
            id,
            kind,
            up: true,
            limits: LimitsDeltaRate::default(),
            counters: FaceCounters::default(),
        });
        id
    }

    pub fn add_app_face(&mut self, app: AppId) -> FaceId {
        self.push(FaceKind::Application { app })
    }

    /// 新增网络接口，端口号按添加顺序递增
    pub fn add_link_face(&mut self, link: LinkId) -> FaceId {
        let port = self.next_port;
        self.next_port = self.next_port.wrapping_add(1);
        self.push(FaceKind::NetworkLink { link, port })
    }

    pub fn get(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(id.0 as usize)
    }

    pub fn is_app(&self, id: FaceId) -> bool {
        self.get(id).is_some_and(Face::is_app)
    }

    pub fn is_up(&self, id: FaceId) -> bool {
        self.get(id).is_some_and(Face::is_up)
    }

    /// 本节点全部应用接口
    pub fn app_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.iter().filter(|f| f.is_app()).map(Face::id)
    }

    pub fn app_face_of(&self, app: AppId) -> Option<FaceId> {
        self.faces
            .iter()
            .find(|f| f.kind == FaceKind::Application { app })
            .map(Face::id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Face> {
        self.faces.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
