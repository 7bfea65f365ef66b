//! 数据包交付事件

use super::id::NodeId;
use super::net_world::NetWorld;
use super::packet::WirePacket;
use crate::ndn::FaceId;
use crate::sim::{Event, Simulator, World, world_mut};
use tracing::trace;

/// 事件：报文经链路到达节点的某个接口
#[derive(Debug)]
pub struct DeliverPacket {
    pub to: NodeId,
    pub face: FaceId,
    pub pkt: WirePacket,
}

impl Event for DeliverPacket {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { to, face, pkt } = *self;
        trace!(pkt_id = pkt.id, ?to, ?face, now = ?sim.now(), "📨 数据包到达");
        let w = world_mut::<NetWorld>(world);
        w.net.deliver(to, face, pkt, sim);
    }
}
