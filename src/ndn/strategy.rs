//! 出接口选择策略
//!
//! [`FaceSelector`] 只负责“选哪个接口”，能否发送（重传配额、令牌桶）
//! 以及 NACK 处理由 [`super::Forwarder`] 统一完成。

use super::bcube_tag::BCubeTag;
use super::face::{FaceId, FaceTable};
use super::fib::{FaceMetric, FaceStatus, FibEntry, RouteLabel};
use super::packet::Interest;
use crate::error::NdnError;
use crate::net::NodeId;
use std::fmt;

/// 一次选择的输入
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub node: NodeId,
    pub in_face: FaceId,
    pub interest: &'a Interest,
    pub tag: Option<&'a BCubeTag>,
}

/// 选中的接口与要写入源路由标签的路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub face: FaceId,
    pub label: Option<RouteLabel>,
}

pub trait FaceSelector: fmt::Debug + Send {
    /// `Ok(None)` 表示没有可用候选；`Err` 表示路由状态不一致
    fn select(
        &self,
        req: &SelectionRequest<'_>,
        fib: &FibEntry,
        faces: &FaceTable,
    ) -> Result<Option<Choice>, NdnError>;
}

/// 按名称选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// 本地优先 → 中间节点源路由 → 源端按比例分流
    #[default]
    BCube,
    /// 依次尝试排名最好的非 RED 接口
    BestRoute,
}

impl StrategyKind {
    pub fn selector(self) -> Box<dyn FaceSelector> {
        match self {
            StrategyKind::BCube => Box::new(BCubeSelector),
            StrategyKind::BestRoute => Box::new(BestRouteSelector),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BCubeSelector;

impl BCubeSelector {
    /// 中间节点：按标签中的置换找到唯一出接口
    fn source_routed(
        req: &SelectionRequest<'_>,
        fib: &FibEntry,
    ) -> Result<Option<Choice>, NdnError> {
        let Some(tag) = req.tag.filter(|t| t.is_interest()) else {
            return Ok(None);
        };
        for m in fib.faces_ranked() {
            let Some(label) = m.route_for(tag.permutation()) else {
                continue;
            };
            if label.hop <= tag.cur() {
                return Err(NdnError::RoutingLoop {
                    node: req.node,
                    face: m.face(),
                    name: req.interest.name.to_string(),
                    hop: label.hop,
                    cur: tag.cur(),
                });
            }
            return Ok(Some(Choice {
                face: m.face(),
                label: Some(*label),
            }));
        }
        Err(NdnError::RoutingInconsistency {
            node: req.node,
            name: req.interest.name.to_string(),
            permutation: tag.permutation(),
            cur: tag.cur(),
        })
    }

    /// 源端：`seq mod 总比例` 决定落在哪个接口，同一序列号总走同一路径
    fn weighted_split(req: &SelectionRequest<'_>, fib: &FibEntry) -> Option<Choice> {
        let candidates: Vec<&FaceMetric> = fib
            .faces_ranked()
            .filter(|m| m.face() != req.in_face && m.status() != FaceStatus::Red)
            .collect();
        let total: f64 = candidates.iter().map(|m| m.fraction()).sum();
        if total <= 0.0 {
            return None;
        }
        let total = (total as u64).max(1);
        let seq = req.interest.seq().unwrap_or(req.interest.nonce);
        let target = (u64::from(seq) % total) as f64;

        let mut coin = 0.0;
        for m in candidates {
            coin += m.fraction();
            if coin >= target {
                let routes = m.routes();
                let label = (!routes.is_empty()).then(|| routes[seq as usize % routes.len()]);
                return Some(Choice {
                    face: m.face(),
                    label,
                });
            }
        }
        None
    }
}

impl FaceSelector for BCubeSelector {
    fn select(
        &self,
        req: &SelectionRequest<'_>,
        fib: &FibEntry,
        faces: &FaceTable,
    ) -> Result<Option<Choice>, NdnError> {
        if let Some(local) = fib.faces_ranked().find(|m| faces.is_app(m.face())) {
            return Ok(Some(Choice {
                face: local.face(),
                label: None,
            }));
        }
        if !faces.is_app(req.in_face) {
            return Self::source_routed(req, fib);
        }
        Ok(Self::weighted_split(req, fib))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BestRouteSelector;

impl FaceSelector for BestRouteSelector {
    fn select(
        &self,
        req: &SelectionRequest<'_>,
        fib: &FibEntry,
        _faces: &FaceTable,
    ) -> Result<Option<Choice>, NdnError> {
        for skip in 0..fib.face_count() {
            let Some(m) = fib.find_best_candidate(skip) else {
                break;
            };
            if m.face() == req.in_face || m.status() == FaceStatus::Red {
                continue;
            }
            let label = req
                .tag
                .filter(|t| t.is_interest())
                .and_then(|t| m.route_for(t.permutation()))
                .or_else(|| m.routes().first())
                .copied();
            return Ok(Some(Choice {
                face: m.face(),
                label,
            }));
        }
        Ok(None)
    }
}
