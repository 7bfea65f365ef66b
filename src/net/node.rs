//! 节点类型
//!
//! 定义网络节点 trait 和 BCube 交换机。服务器节点见 [`super::Server`]。

use super::id::{LinkId, NodeId};
use super::network::Network;
use super::packet::Packet;
use super::server::Server;
use crate::ndn::FaceId;
use crate::sim::Simulator;
use tracing::{debug, trace};

/// 节点接口
pub trait Node: Send {
    /// 获取节点标识符
    fn id(&self) -> NodeId;

    /// 获取节点名称
    fn name(&self) -> &str;

    /// 接上一条出方向链路，返回本地接口号
    fn add_port(&mut self, link: LinkId, bandwidth_bps: u64) -> FaceId;

    /// 启动周期任务
    fn start(&mut self, _sim: &mut Simulator) {}

    /// 处理从 `in_face` 到达的数据包
    fn on_packet(&mut self, in_face: FaceId, pkt: Packet, sim: &mut Simulator, net: &mut Network);

    fn as_server(&self) -> Option<&Server> {
        None
    }

    fn as_server_mut(&mut self) -> Option<&mut Server> {
        None
    }
}

/// BCube 交换机：不查表，只按标签里的下一跳端口转发
#[derive(Debug)]
pub struct Switch {
    id: NodeId,
    name: String,
    ports: Vec<LinkId>,
    forwarded: u64,
    dropped: u64,
}

impl Switch {
    /// 创建新交换机
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ports: Vec::new(),
            forwarded: 0,
            dropped: 0,
        }
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// 出端口队列满而丢弃的包数
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Node for Switch {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn add_port(&mut self, link: LinkId, _bandwidth_bps: u64) -> FaceId {
        self.ports.push(link);
        FaceId((self.ports.len() - 1) as u32)
    }

    #[tracing::instrument(skip(self, pkt, sim, net), fields(node_name = %self.name, pkt_id = pkt.id))]
    fn on_packet(&mut self, in_face: FaceId, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        // 交换机只连服务器，服务器发出的网络报文一定带标签
        let Some(tag) = pkt.tag else {
            panic!(
                "switch {} received untagged {} for {}",
                self.name,
                pkt.header.kind(),
                pkt.header.name()
            );
        };
        let port = tag.next_hop() as usize;
        let Some(&link) = self.ports.get(port) else {
            panic!(
                "switch {} has no port {port} (tag {tag:?}, {} ports)",
                self.name,
                self.ports.len()
            );
        };
        trace!(?in_face, port, kind = pkt.header.kind(), "🔀 Switch 按标签转发");
        match net.transmit(link, pkt, sim) {
            Ok(()) => self.forwarded += 1,
            Err(dropped) => {
                self.dropped += 1;
                debug!(pkt_id = dropped.id, port, "出端口队列满，丢弃");
            }
        }
    }
}
