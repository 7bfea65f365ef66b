//! 链路串行化结束事件

use super::id::LinkId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World, world_mut};

/// 上一个报文离开发送端时触发，接着发送出口队列里的下一个
#[derive(Debug)]
pub struct LinkReady {
    pub link_id: LinkId,
}

impl Event for LinkReady {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        world_mut::<NetWorld>(world)
            .net
            .on_link_ready(self.link_id, sim);
    }
}
