//! 网络拓扑管理
//!
//! 节点、链路、报文在链路上的排队/串行化/传播，以及统计信息。

use std::collections::HashMap;

use super::deliver_packet::DeliverPacket;
use super::id::{LinkId, NodeId};
use super::link::Link;
use super::link_ready::LinkReady;
use super::node::{Node, Switch};
use super::packet::{Packet, WirePacket};
use super::server::Server;
use super::stats::Stats;
use crate::ndn::{FaceId, ForwarderConfig, LimitsConfig};
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace, warn};

/// 网络拓扑
#[derive(Default)]
pub struct Network {
    nodes: Vec<Option<Box<dyn Node>>>,
    names: HashMap<String, NodeId>,
    links: Vec<Link>,
    next_pkt_id: u64,
    pub stats: Stats,
}

impl Network {
    fn push_node(&mut self, name: String, node: Box<dyn Node>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.names.insert(name, id);
        self.nodes.push(Some(node));
        id
    }

    /// 添加服务器节点
    pub fn add_server(
        &mut self,
        name: impl Into<String>,
        address: Vec<u8>,
        fw_cfg: ForwarderConfig,
        limits: LimitsConfig,
    ) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len());
        let server = Server::new(id, name.clone(), address, fw_cfg, limits);
        self.push_node(name, Box::new(server))
    }

    /// 添加交换机节点
    pub fn add_switch(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len());
        self.push_node(name.clone(), Box::new(Switch::new(id, name)))
    }

    /// 用一对单向链路连接两个节点，返回两端的接口号
    pub fn connect(
        &mut self,
        a: NodeId,
        b: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
        queue_bytes: u64,
    ) -> (FaceId, FaceId) {
        let ab = LinkId(self.links.len());
        self.links
            .push(Link::new(a, b, latency, bandwidth_bps, queue_bytes));
        let ba = LinkId(self.links.len());
        self.links
            .push(Link::new(b, a, latency, bandwidth_bps, queue_bytes));

        let face_a = self.node_mut(a).add_port(ab, bandwidth_bps);
        let face_b = self.node_mut(b).add_port(ba, bandwidth_bps);
        self.links[ab.0].to_face = face_b;
        self.links[ba.0].to_face = face_a;
        trace!(?a, ?b, ?face_a, ?face_b, "连接节点");
        (face_a, face_b)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut dyn Node {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_deref_mut())
            .unwrap_or_else(|| panic!("node {id:?} is missing"))
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        self.nodes.get(id.0).and_then(|n| n.as_deref())
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn server(&self, id: NodeId) -> Option<&Server> {
        self.node(id).and_then(Node::as_server)
    }

    pub fn server_mut(&mut self, id: NodeId) -> Option<&mut Server> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_deref_mut())
            .and_then(Node::as_server_mut)
    }

    /// 按编号顺序遍历所有服务器
    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.nodes
            .iter()
            .filter_map(|n| n.as_deref().and_then(Node::as_server))
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(id.0)
    }

    /// 为所有链路设置 CE 标记阈值
    pub fn set_ecn_threshold(&mut self, bytes: Option<u64>) {
        for link in &mut self.links {
            link.ecn_threshold_bytes = bytes;
        }
    }

    pub fn next_packet_id(&mut self) -> u64 {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        id
    }

    /// 暂时取出服务器调用 `f`，避免 &mut self 与 &mut node 的重叠借用
    pub fn with_server<R>(
        &mut self,
        id: NodeId,
        sim: &mut Simulator,
        f: impl FnOnce(&mut Server, &mut Simulator, &mut Network) -> R,
    ) -> Option<R> {
        let mut node = self.nodes.get_mut(id.0)?.take()?;
        let out = node.as_server_mut().map(|s| f(s, sim, self));
        self.nodes[id.0] = Some(node);
        out
    }

    /// 启动所有节点的周期任务
    pub fn start(&mut self, sim: &mut Simulator) {
        for node in self.nodes.iter_mut().flatten() {
            node.start(sim);
        }
        debug!(nodes = self.nodes.len(), links = self.links.len(), "🚦 网络启动");
    }

    /// 撤销所有服务器的周期任务
    pub fn stop(&mut self, sim: &mut Simulator) {
        for node in self.nodes.iter_mut().flatten() {
            if let Some(s) = node.as_server_mut() {
                s.stop(sim);
            }
        }
    }

    pub fn set_face_up(&mut self, node: NodeId, face: FaceId, up: bool, sim: &mut Simulator) {
        match self.server_mut(node) {
            Some(s) => s.set_face_up(face, up, sim),
            None => warn!(?node, "只有服务器接口可以上下线"),
        }
    }

    /// 报文进入链路出口队列；队列满时原样返回
    pub fn transmit(
        &mut self,
        link_id: LinkId,
        pkt: Packet,
        sim: &mut Simulator,
    ) -> Result<(), WirePacket> {
        let mut wire = pkt.into_wire();
        let link = &mut self.links[link_id.0];
        if link.should_mark() && wire.mark_ce() {
            self.stats.ce_marks += 1;
        }
        if let Err(dropped) = link.queue.enqueue(wire) {
            self.stats.queue_drops += 1;
            debug!(
                ?link_id,
                pkt_id = dropped.id,
                queue_bytes = link.queue.bytes(),
                "队列满，丢弃"
            );
            return Err(dropped);
        }
        if !link.transmitting {
            self.start_tx(link_id, sim);
        }
        Ok(())
    }

    fn start_tx(&mut self, link_id: LinkId, sim: &mut Simulator) {
        let link = &mut self.links[link_id.0];
        let Some(wire) = link.queue.dequeue() else {
            link.transmitting = false;
            return;
        };
        link.transmitting = true;
        let size = wire.size_bytes();
        let now = sim.now();
        let depart = now.saturating_add(link.tx_time(size));
        let arrive = depart.saturating_add(link.latency);
        link.tx_pkts += 1;
        link.tx_bytes += u64::from(size);
        self.stats.tx_pkts += 1;
        self.stats.tx_bytes += u64::from(size);
        trace!(?link_id, pkt_id = wire.id, ?depart, ?arrive, "开始发送");

        let (to, face) = (link.to, link.to_face);
        sim.schedule(arrive, DeliverPacket { to, face, pkt: wire });
        sim.schedule(depart, LinkReady { link_id });
    }

    /// 链路完成一次串行化
    pub(crate) fn on_link_ready(&mut self, link_id: LinkId, sim: &mut Simulator) {
        self.links[link_id.0].transmitting = false;
        self.start_tx(link_id, sim);
    }

    /// 将数据包交付给节点处理；标签无法解码的报文丢弃
    #[tracing::instrument(skip(self, pkt, sim), fields(pkt_id = pkt.id))]
    pub fn deliver(&mut self, to: NodeId, face: FaceId, pkt: WirePacket, sim: &mut Simulator) {
        self.stats.delivered_pkts += 1;
        let pkt = match pkt.into_packet() {
            Ok(p) => p,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(error = %e, "标签解码失败，丢弃");
                return;
            }
        };
        let Some(mut node) = self.nodes.get_mut(to.0).and_then(Option::take) else {
            warn!(?to, "目的节点不存在");
            return;
        };
        node.on_packet(face, pkt, sim, self);
        self.nodes[to.0] = Some(node);
    }
}
