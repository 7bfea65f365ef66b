//! 服务器上的周期任务
//!
//! 每个任务执行后自我重调度，句柄保存在拥有它的实体里（接口限速器、
//! FIB 表项、服务器本身），实体停止时撤销。

use super::id::NodeId;
use super::net_world::NetWorld;
use crate::ndn::{FaceId, Name};
use crate::sim::{Event, Simulator, World, world_mut};

/// 事件：接口令牌桶周期重置
#[derive(Debug)]
pub struct LimitsTick {
    pub node: NodeId,
    pub face: FaceId,
}

impl Event for LimitsTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let LimitsTick { node, face } = *self;
        let w = world_mut::<NetWorld>(world);
        w.net
            .with_server(node, sim, |s, sim, _| s.on_limits_tick(face, sim));
    }
}

/// 事件：FIB 表项比例重平衡
#[derive(Debug)]
pub struct FibTick {
    pub node: NodeId,
    pub prefix: Name,
}

impl Event for FibTick {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let FibTick { node, prefix } = *self;
        let w = world_mut::<NetWorld>(world);
        w.net
            .with_server(node, sim, |s, sim, _| s.on_fib_tick(&prefix, sim));
    }
}

/// 事件：PIT 清扫
#[derive(Debug)]
pub struct PitSweep {
    pub node: NodeId,
}

impl Event for PitSweep {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let PitSweep { node } = *self;
        let w = world_mut::<NetWorld>(world);
        w.net.with_server(node, sim, |s, sim, _| s.on_pit_sweep(sim));
    }
}
