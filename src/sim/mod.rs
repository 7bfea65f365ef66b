//! 仿真核心模块
//!
//! 此模块包含事件驱动仿真的核心组件：仿真时间、事件、世界、仿真器，
//! 以及 JSON 场景描述。

mod event;
mod scenario;
mod simulator;
mod time;

pub use event::{Event, World, world_mut};
pub use scenario::{
    ConsumerSpec, FibSpec, ForwardingSpec, LimitsSpec, PitSpec, ProducerSpec, ScenarioSpec,
    StrategySpec, TopologySpec,
};
pub use simulator::{EventId, Simulator};
pub use time::SimTime;
