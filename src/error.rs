//! 错误类型
//!
//! 可恢复的转发事件（拥塞、重复、发送失败、PIT 资源不足）只计入统计，
//! 不会以错误形式出现；这里只收录配置/装配错误与致命的路由不一致。

use crate::ndn::FaceId;
use crate::net::NodeId;
use thiserror::Error;

/// BCube 路由标签编解码错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("bcube tag truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("bcube tag hop index {0} out of range")]
    HopOutOfRange(u8),
    #[error("bcube tag has invalid kind byte {0}")]
    InvalidKind(u8),
}

#[derive(Debug, Error)]
pub enum NdnError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scenario json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid name {0:?}: names must start with '/'")]
    InvalidName(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown server {0:?}")]
    UnknownServer(String),

    #[error(
        "routing inconsistency at {node:?}: no face carries permutation {permutation} \
         (hop {cur}) for {name}"
    )]
    RoutingInconsistency {
        node: NodeId,
        name: String,
        permutation: u32,
        cur: u8,
    },

    #[error("routing loop at {node:?}: face {face:?} would revisit hop {hop} <= {cur} for {name}")]
    RoutingLoop {
        node: NodeId,
        face: FaceId,
        name: String,
        hop: u8,
        cur: u8,
    },

    #[error(transparent)]
    Tag(#[from] TagError),
}
