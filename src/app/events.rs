//! 应用事件
//!
//! 应用挂在服务器上，事件只携带 (节点, 应用) 坐标，执行时借出服务器。

use crate::ndn::{AppId, NdnPacket};
use crate::net::{NetWorld, NodeId};
use crate::sim::{Event, Simulator, World, world_mut};

/// 事件：把转发器的输出交给本地应用
#[derive(Debug)]
pub struct DeliverToApp {
    pub node: NodeId,
    pub app: AppId,
    pub packet: NdnPacket,
}

impl Event for DeliverToApp {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverToApp { node, app, packet } = *self;
        let w = world_mut::<NetWorld>(world);
        w.net
            .with_server(node, sim, |s, sim, net| s.on_app_packet(app, packet, sim, net));
    }
}

/// 事件：consumer 开始发送
#[derive(Debug)]
pub struct StartConsumer {
    pub node: NodeId,
    pub app: AppId,
}

impl Event for StartConsumer {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = world_mut::<NetWorld>(world);
        w.net.with_server(self.node, sim, |s, sim, _| {
            s.on_consumer_start(self.app, sim)
        });
    }
}

/// 事件：consumer 发送下一个 Interest
#[derive(Debug)]
pub struct SendInterest {
    pub node: NodeId,
    pub app: AppId,
}

impl Event for SendInterest {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = world_mut::<NetWorld>(world);
        w.net.with_server(self.node, sim, |s, sim, net| {
            s.on_consumer_send(self.app, sim, net)
        });
    }
}

/// 事件：周期上报 consumer 当前速率
#[derive(Debug)]
pub struct ShowInterestLimit {
    pub node: NodeId,
    pub app: AppId,
}

impl Event for ShowInterestLimit {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = world_mut::<NetWorld>(world);
        w.net.with_server(self.node, sim, |s, sim, _| {
            s.on_consumer_report(self.app, sim)
        });
    }
}

/// 事件：consumer 停止
#[derive(Debug)]
pub struct StopConsumer {
    pub node: NodeId,
    pub app: AppId,
}

impl Event for StopConsumer {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = world_mut::<NetWorld>(world);
        w.net.with_server(self.node, sim, |s, sim, _| {
            s.on_consumer_stop(self.app, sim)
        });
    }
}
