//! 待定兴趣表（PIT）
//!
//! 每个在途名字一条表项：已见过的 nonce、请求方（incoming）、已发往的接口
//! （outgoing）、所属 FIB 前缀、重传配额与过期/软删除标记。
//!
//! 满足或放弃后的表项只做软删除（`mark_erased`），在宽限期内仍能吸收
//! 重复 Interest，由周期清扫事件 [`Pit::cleanup`] 回收。

use super::bcube_tag::BCubeTag;
use super::face::FaceId;
use super::name::Name;
use crate::sim::SimTime;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// 同一表项两次提高重传配额之间的最小间隔
const RETX_ALLOWANCE_GAP: SimTime = SimTime::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct PitConfig {
    /// 0 表示不限
    pub max_size: usize,
    pub erase_grace: SimTime,
    pub sweep_interval: SimTime,
}

impl Default for PitConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            erase_grace: SimTime::from_millis(100),
            sweep_interval: SimTime::from_millis(50),
        }
    }
}

/// 请求方记录；`local_port` 是数据返回时交换机应使用的端口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingFace {
    pub face: FaceId,
    pub local_port: u32,
    pub arrival: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingFace {
    pub face: FaceId,
    pub send_time: SimTime,
    pub retx_count: u32,
    pub waiting_in_vain: bool,
}

#[derive(Debug)]
pub struct PitEntry {
    name: Name,
    fib_prefix: Name,
    nonces: HashSet<u32>,
    incoming: Vec<IncomingFace>,
    outgoing: Vec<OutgoingFace>,
    max_retx_count: u32,
    last_retx_allowance: Option<SimTime>,
    expire_at: SimTime,
    erased_at: Option<SimTime>,
    /// 首个 Interest 的源路由标签，NACK 后重试时沿用
    route_tag: Option<BCubeTag>,
}

impl PitEntry {
    fn new(name: Name, fib_prefix: Name, now: SimTime, lifetime: SimTime) -> Self {
        Self {
            name,
            fib_prefix,
            nonces: HashSet::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            max_retx_count: 0,
            last_retx_allowance: None,
            expire_at: now.saturating_add(lifetime),
            erased_at: None,
            route_tag: None,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn fib_prefix(&self) -> &Name {
        &self.fib_prefix
    }

    pub fn is_nonce_seen(&self, nonce: u32) -> bool {
        self.nonces.contains(&nonce)
    }

    pub fn add_seen_nonce(&mut self, nonce: u32) -> bool {
        self.nonces.insert(nonce)
    }

    /// 记录请求方；同一 (face, port) 只记一次
    pub fn add_incoming(&mut self, face: FaceId, local_port: u32, now: SimTime) -> bool {
        if self
            .incoming
            .iter()
            .any(|r| r.face == face && r.local_port == local_port)
        {
            return false;
        }
        self.incoming.push(IncomingFace {
            face,
            local_port,
            arrival: now,
        });
        true
    }

    pub fn remove_incoming(&mut self, face: FaceId) {
        self.incoming.retain(|r| r.face != face);
    }

    pub fn incoming(&self) -> &[IncomingFace] {
        &self.incoming
    }

    pub fn has_incoming_face(&self, face: FaceId) -> bool {
        self.incoming.iter().any(|r| r.face == face)
    }

    /// 记录一次发送；已发过的接口视为重传
    pub fn add_outgoing(&mut self, face: FaceId, now: SimTime) -> &OutgoingFace {
        let idx = match self.outgoing.iter().position(|o| o.face == face) {
            Some(idx) => {
                let o = &mut self.outgoing[idx];
                o.retx_count += 1;
                o.send_time = now;
                o.waiting_in_vain = false;
                idx
            }
            None => {
                self.outgoing.push(OutgoingFace {
                    face,
                    send_time: now,
                    retx_count: 0,
                    waiting_in_vain: false,
                });
                self.outgoing.len() - 1
            }
        };
        &self.outgoing[idx]
    }

    pub fn outgoing(&self) -> &[OutgoingFace] {
        &self.outgoing
    }

    pub fn find_outgoing(&self, face: FaceId) -> Option<&OutgoingFace> {
        self.outgoing.iter().find(|o| o.face == face)
    }

    pub fn set_waiting_in_vain(&mut self, face: FaceId) {
        if let Some(o) = self.outgoing.iter_mut().find(|o| o.face == face) {
            o.waiting_in_vain = true;
        }
    }

    /// 没有任何出接口时同样为真
    pub fn are_all_outgoing_in_vain(&self) -> bool {
        self.outgoing.iter().all(|o| o.waiting_in_vain)
    }

    pub fn clear_incoming(&mut self) {
        self.incoming.clear();
    }

    pub fn clear_outgoing(&mut self) {
        self.outgoing.clear();
    }

    pub fn max_retx_count(&self) -> u32 {
        self.max_retx_count
    }

    /// 提高允许的重传次数，100ms 内至多一次
    pub fn increase_allowed_retx_count(&mut self, now: SimTime) {
        let due = self
            .last_retx_allowance
            .is_none_or(|last| now.saturating_sub(last) >= RETX_ALLOWANCE_GAP);
        if due {
            self.max_retx_count += 1;
            self.last_retx_allowance = Some(now);
        }
    }

    /// 延长过期时间，并撤销软删除
    pub fn update_lifetime(&mut self, now: SimTime, lifetime: SimTime) {
        self.expire_at = self.expire_at.max(now.saturating_add(lifetime));
        self.erased_at = None;
    }

    pub fn expire_at(&self) -> SimTime {
        self.expire_at
    }

    pub fn is_erased(&self) -> bool {
        self.erased_at.is_some()
    }

    pub fn route_tag(&self) -> Option<BCubeTag> {
        self.route_tag
    }

    pub(crate) fn remember_route_tag(&mut self, tag: Option<BCubeTag>) {
        if self.route_tag.is_none() {
            self.route_tag = tag.filter(BCubeTag::is_interest);
        }
    }
}

/// 一次清扫的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PitCleanup {
    pub reaped: usize,
    pub timed_out: usize,
}

#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<Name, PitEntry>,
    cfg: PitConfig,
}

impl Pit {
    pub fn new(cfg: PitConfig) -> Self {
        Self {
            entries: HashMap::new(),
            cfg,
        }
    }

    pub fn config(&self) -> &PitConfig {
        &self.cfg
    }

    /// 查找表项，软删除的表项同样返回
    pub fn lookup(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn lookup_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name)
    }

    /// 只返回仍在等待数据的表项
    pub fn lookup_pending_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name).filter(|e| !e.is_erased())
    }

    /// 新建表项；表满时返回 None
    pub fn create(
        &mut self,
        name: &Name,
        fib_prefix: &Name,
        now: SimTime,
        lifetime: SimTime,
    ) -> Option<&mut PitEntry> {
        if self.cfg.max_size > 0 && self.entries.len() >= self.cfg.max_size {
            return None;
        }
        let entry = self
            .entries
            .entry(name.clone())
            .or_insert_with(|| PitEntry::new(name.clone(), fib_prefix.clone(), now, lifetime));
        Some(entry)
    }

    pub fn mark_erased(&mut self, name: &Name, now: SimTime) {
        if let Some(e) = self.entries.get_mut(name) {
            e.erased_at = Some(now);
        }
    }

    /// 回收过了宽限期的软删除表项与超时表项
    pub fn cleanup(&mut self, now: SimTime) -> PitCleanup {
        let grace = self.cfg.erase_grace;
        let mut out = PitCleanup::default();
        self.entries.retain(|name, e| match e.erased_at {
            Some(at) if now.saturating_sub(at) >= grace => {
                out.reaped += 1;
                false
            }
            Some(_) => true,
            None if e.expire_at <= now => {
                trace!(name = %name, "PIT 表项超时");
                out.timed_out += 1;
                false
            }
            None => true,
        });
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitEntry> {
        self.entries.values()
    }
}
