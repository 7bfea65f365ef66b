//! 拓扑构建与场景装配

pub mod bcube;
pub mod scenario;
