//! 网络世界实现

use super::network::Network;
use crate::sim::World;
use std::any::Any;

/// 持有 Network 的世界，所有网络与应用事件都在它上面执行。
#[derive(Default)]
pub struct NetWorld {
    pub net: Network,
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
