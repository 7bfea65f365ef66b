//! NDN 转发与拥塞控制
//!
//! 每个服务器节点上一份：接口表、PIT、FIB（含每接口度量与比例重平衡）、
//! 内容缓存、出接口选择策略，以及把它们串起来的转发状态机。

mod bcube_tag;
mod content_store;
mod face;
mod fib;
mod forwarder;
mod limits;
mod name;
mod packet;
mod pit;
mod strategy;

pub use bcube_tag::{BCubeTag, MAX_HOPS, UNSET_HOP, encode_permutation, permutation_levels};
pub use content_store::ContentStore;
pub use face::{AppId, Face, FaceCounters, FaceId, FaceKind, FaceTable};
pub use fib::{
    FaceMetric, FaceStatus, Fib, FibConfig, FibEntry, INVALID_ROUTING_COST, MAX_ROUTES_PER_FACE,
    RebalanceStep, RouteLabel, unpack_routing_cost,
};
pub use forwarder::{Forwarder, ForwarderConfig, ForwarderStats, Output, Propagation};
pub use limits::{LimitsConfig, LimitsDeltaRate};
pub use name::Name;
pub use packet::{
    CongestionMark, DEFAULT_INTEREST_LIFETIME, Data, INTRA_SHARING_FULL, Interest, NackCode,
    NdnPacket,
};
pub use pit::{IncomingFace, OutgoingFace, Pit, PitCleanup, PitConfig, PitEntry};
pub use strategy::{
    BCubeSelector, BestRouteSelector, Choice, FaceSelector, SelectionRequest, StrategyKind,
};
