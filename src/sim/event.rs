//! 事件与世界 trait
//!
//! 事件由仿真器调度执行；世界（World）由业务层实现，事件执行时通过
//! [`world_mut`] 取回具体的世界类型。

use super::simulator::Simulator;
use std::any::{Any, type_name};

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}

/// 仿真世界：由业务层实现（例如网络拓扑/统计等）。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}

/// 把 `&mut dyn World` 还原为具体类型。
///
/// 世界类型与事件类型不匹配属于装配错误，直接 panic。
pub fn world_mut<T: World>(world: &mut dyn World) -> &mut T {
    world
        .as_any_mut()
        .downcast_mut::<T>()
        .unwrap_or_else(|| panic!("world must be {}", type_name::<T>()))
}
