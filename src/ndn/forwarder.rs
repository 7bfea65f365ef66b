//! 每节点的转发状态机
//!
//! 串起 PIT、FIB、内容缓存与出接口选择。转发器本身不接触链路：
//! 所有发出的报文先放进 outbox，由所在节点取走后交给链路或本地应用。
//!
//! 表项生命周期：NEW → PENDING（已发出，等待 Data/NACK）→ SATISFIED
//! （Data 已下发）| EXHAUSTED（所有出接口无望，已向上游发 NACK），
//! 之后软删除，宽限期后由清扫回收。

use super::bcube_tag::{BCubeTag, UNSET_HOP};
use super::content_store::ContentStore;
use super::face::{FaceId, FaceTable};
use super::fib::{Fib, FibConfig, RebalanceStep};
use super::name::Name;
use super::packet::{CongestionMark, Data, INTRA_SHARING_FULL, Interest, NackCode, NdnPacket};
use super::pit::{IncomingFace, Pit, PitCleanup, PitConfig, PitEntry};
use super::strategy::{Choice, FaceSelector, SelectionRequest, StrategyKind};
use crate::error::NdnError;
use crate::net::NodeId;
use crate::sim::SimTime;
use serde::Serialize;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ForwarderConfig {
    pub strategy: StrategyKind,
    pub enable_nacks: bool,
    pub detect_retransmissions: bool,
    pub cache_unsolicited_data: bool,
    /// 0 表示关闭缓存
    pub cs_capacity: usize,
    pub pit: PitConfig,
    pub fib: FibConfig,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::BCube,
            enable_nacks: true,
            detect_retransmissions: true,
            cache_unsolicited_data: false,
            cs_capacity: 100,
            pit: PitConfig::default(),
            fib: FibConfig::default(),
        }
    }
}

/// 转发计数（trace 计数器）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwarderStats {
    pub in_interests: u64,
    pub in_nacks: u64,
    pub in_data: u64,
    pub out_interests: u64,
    pub out_nacks: u64,
    pub out_data: u64,
    pub drop_interests: u64,
    pub drop_nacks: u64,
    pub drop_data: u64,
    pub duplicates: u64,
    pub suppressed: u64,
    pub cache_hits: u64,
    pub unsolicited_data: u64,
    pub satisfied: u64,
    pub exhausted: u64,
    /// 选中但因令牌桶或重传配额无法发送
    pub blocked: u64,
    pub extra_nacks: u64,
    pub timed_out: u64,
}

/// 转发器产生的动作
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// 从接口发出；应用接口则交给对应应用
    Send {
        face: FaceId,
        packet: NdnPacket,
        tag: Option<BCubeTag>,
    },
    /// 直接通知本地应用的补充 NACK（不经过接口计数）
    NotifyApp { face: FaceId, nack: Interest },
}

/// 一次出接口选择的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Sent(FaceId),
    /// 选中的接口无法发送（令牌桶耗尽或重传配额用完）
    Blocked(FaceId),
    NoCandidate,
}

impl Propagation {
    pub fn is_sent(self) -> bool {
        matches!(self, Propagation::Sent(_))
    }

    fn bottleneck(self) -> Option<FaceId> {
        match self {
            Propagation::Blocked(face) => Some(face),
            _ => None,
        }
    }
}

/// 源端重复的非重传 Interest 是否应被聚合
fn should_suppress_incoming(entry: &PitEntry, in_face: FaceId, detect_retx: bool) -> bool {
    if entry.incoming().is_empty() && entry.outgoing().is_empty() {
        return false;
    }
    if entry.find_outgoing(in_face).is_some() {
        return false;
    }
    let is_retx = detect_retx && entry.has_incoming_face(in_face);
    !is_retx
}

#[derive(Debug)]
pub struct Forwarder {
    node: NodeId,
    cfg: ForwarderConfig,
    selector: Box<dyn FaceSelector>,
    pit: Pit,
    fib: Fib,
    cs: ContentStore,
    stats: ForwarderStats,
    outbox: Vec<Output>,
}

impl Forwarder {
    pub fn new(node: NodeId, cfg: ForwarderConfig) -> Self {
        Self {
            node,
            selector: cfg.strategy.selector(),
            pit: Pit::new(cfg.pit.clone()),
            fib: Fib::default(),
            cs: ContentStore::new(cfg.cs_capacity),
            stats: ForwarderStats::default(),
            outbox: Vec::new(),
            cfg,
        }
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.cfg
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn pit_mut(&mut self) -> &mut Pit {
        &mut self.pit
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_mut(&mut self) -> &mut Fib {
        &mut self.fib
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.cs
    }

    pub fn stats(&self) -> &ForwarderStats {
        &self.stats
    }

    /// 取走待发送的动作
    pub fn take_outbox(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.outbox)
    }

    /// 链路层入队失败，补记为丢弃
    pub(crate) fn record_send_failure(&mut self, packet: &NdnPacket) {
        match packet {
            NdnPacket::Interest(i) if i.is_nack() => self.stats.drop_nacks += 1,
            NdnPacket::Interest(_) => self.stats.drop_interests += 1,
            NdnPacket::Data(_) => self.stats.drop_data += 1,
        }
    }

    fn send(
        &mut self,
        faces: &mut FaceTable,
        face: FaceId,
        packet: NdnPacket,
        tag: Option<BCubeTag>,
    ) -> bool {
        let Some(f) = faces.get_mut(face) else {
            return false;
        };
        if !f.is_up() {
            f.counters.send_failures += 1;
            return false;
        }
        f.counters.record_out(&packet);
        self.outbox.push(Output::Send { face, packet, tag });
        true
    }

    /// 向一个请求方回 NACK，网络接口带上其本地端口
    fn send_nack(&mut self, faces: &mut FaceTable, face: FaceId, local_port: u32, nack: Interest) {
        let tag = (!faces.is_app(face)).then(|| BCubeTag::for_data(local_port));
        if self.send(faces, face, NdnPacket::Interest(nack), tag) {
            self.stats.out_nacks += 1;
        } else {
            self.stats.drop_nacks += 1;
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(node = ?self.node, face = ?in_face, name = %interest.name, nonce = interest.nonce)
    )]
    pub fn on_interest(
        &mut self,
        faces: &mut FaceTable,
        in_face: FaceId,
        interest: Interest,
        tag: Option<BCubeTag>,
        now: SimTime,
    ) -> Result<(), NdnError> {
        if interest.is_nack() {
            return self.on_nack(faces, in_face, interest, now);
        }
        self.stats.in_interests += 1;
        let local_port = tag.map_or(UNSET_HOP, |t| t.prev_hop());
        let name = interest.name.clone();

        let created = if self.pit.lookup(&name).is_some() {
            false
        } else {
            let Some(prefix) = self
                .fib
                .longest_prefix_match(&name)
                .map(|e| e.prefix().clone())
            else {
                debug!("没有匹配的 FIB 前缀，丢弃 Interest");
                self.stats.drop_interests += 1;
                return Ok(());
            };
            if self
                .pit
                .create(&name, &prefix, now, interest.lifetime)
                .is_none()
            {
                warn!(pit_size = self.pit.len(), "PIT 已满，丢弃 Interest");
                self.stats.drop_interests += 1;
                return Ok(());
            }
            trace!(prefix = %prefix, "新建 PIT 表项");
            true
        };
        let Some(entry) = self.pit.lookup_mut(&name) else {
            return Ok(());
        };

        if entry.is_nonce_seen(interest.nonce) {
            entry.add_incoming(in_face, local_port, now);
            self.stats.duplicates += 1;
            self.stats.drop_interests += 1;
            debug!("🔁 重复 nonce，吸收");
            if self.cfg.enable_nacks {
                let nack = interest.to_nack(NackCode::Loop, INTRA_SHARING_FULL);
                self.send_nack(faces, in_face, local_port, nack);
            }
            return Ok(());
        }
        entry.add_seen_nonce(interest.nonce);

        if let Some(data) = self.cs.lookup(&name) {
            entry.add_incoming(in_face, local_port, now);
            self.stats.cache_hits += 1;
            debug!("缓存命中");
            self.satisfy_pending_interest(faces, None, data, now);
            return Ok(());
        }

        if !created
            && !entry.is_erased()
            && should_suppress_incoming(entry, in_face, self.cfg.detect_retransmissions)
        {
            entry.add_incoming(in_face, local_port, now);
            self.stats.suppressed += 1;
            self.stats.drop_interests += 1;
            debug!("聚合到已在途的 Interest");
            return Ok(());
        }

        self.propagate_interest(faces, in_face, interest, tag, now)
    }

    fn propagate_interest(
        &mut self,
        faces: &mut FaceTable,
        in_face: FaceId,
        interest: Interest,
        tag: Option<BCubeTag>,
        now: SimTime,
    ) -> Result<(), NdnError> {
        let local_port = tag.map_or(UNSET_HOP, |t| t.prev_hop());
        let Some(entry) = self.pit.lookup_mut(&interest.name) else {
            return Ok(());
        };
        let is_retx = self.cfg.detect_retransmissions && entry.has_incoming_face(in_face);
        entry.add_incoming(in_face, local_port, now);
        entry.update_lifetime(now, interest.lifetime);
        entry.remember_route_tag(tag);

        let mut outcome = self.do_propagate_interest(faces, in_face, &interest, tag.as_ref(), now)?;
        if !outcome.is_sent() && is_retx {
            if let Some(entry) = self.pit.lookup_mut(&interest.name) {
                entry.increase_allowed_retx_count(now);
            }
            outcome = self.do_propagate_interest(faces, in_face, &interest, tag.as_ref(), now)?;
        }
        if !outcome.is_sent()
            && self
                .pit
                .lookup(&interest.name)
                .is_some_and(PitEntry::are_all_outgoing_in_vain)
        {
            self.did_exhaust_forwarding_options(faces, in_face, &interest, outcome.bottleneck(), now);
        }
        Ok(())
    }

    /// 选出接口、检查配额并发送
    pub fn do_propagate_interest(
        &mut self,
        faces: &mut FaceTable,
        in_face: FaceId,
        interest: &Interest,
        tag: Option<&BCubeTag>,
        now: SimTime,
    ) -> Result<Propagation, NdnError> {
        let Some(entry) = self.pit.lookup(&interest.name) else {
            return Ok(Propagation::NoCandidate);
        };
        let prefix = entry.fib_prefix().clone();
        let Some(fib_entry) = self.fib.find(&prefix) else {
            return Ok(Propagation::NoCandidate);
        };
        let req = SelectionRequest {
            node: self.node,
            in_face,
            interest,
            tag,
        };
        let Some(choice) = self.selector.select(&req, fib_entry, faces)? else {
            trace!("没有可用的候选接口");
            return Ok(Propagation::NoCandidate);
        };

        if !self.can_send_out_interest(faces, in_face, choice.face, entry) {
            // 已回过 NACK 的接口在 on_nack 里计过一次，重试时不再重复计
            let already_nacked = entry
                .find_outgoing(choice.face)
                .is_some_and(|o| o.waiting_in_vain);
            if !already_nacked {
                if let Some(m) = self
                    .fib
                    .find_mut(&prefix)
                    .and_then(|e| e.metric_mut(choice.face))
                {
                    m.increase_nack();
                }
                self.stats.blocked += 1;
            }
            trace!(out_face = ?choice.face, already_nacked, "选中的接口无法发送");
            return Ok(Propagation::Blocked(choice.face));
        }

        if let Some(face) = faces.get_mut(choice.face) {
            face.limits.borrow_limit();
        }
        self.try_send_out_interest(faces, interest, choice, now);
        if let Some(m) = self
            .fib
            .find_mut(&prefix)
            .and_then(|e| e.metric_mut(choice.face))
        {
            m.increase_interest();
        }
        Ok(Propagation::Sent(choice.face))
    }

    fn can_send_out_interest(
        &self,
        faces: &FaceTable,
        in_face: FaceId,
        out_face: FaceId,
        entry: &PitEntry,
    ) -> bool {
        if out_face == in_face {
            return false;
        }
        if faces
            .get(out_face)
            .is_some_and(|f| !f.limits.is_below_limit())
        {
            return false;
        }
        match entry.find_outgoing(out_face) {
            Some(o) => self.cfg.detect_retransmissions && o.retx_count < entry.max_retx_count(),
            None => true,
        }
    }

    fn try_send_out_interest(
        &mut self,
        faces: &mut FaceTable,
        interest: &Interest,
        choice: Choice,
        now: SimTime,
    ) {
        if let Some(entry) = self.pit.lookup_mut(&interest.name) {
            entry.add_outgoing(choice.face, now);
        }
        let tag = choice.label.map(|l| {
            BCubeTag::for_interest(
                l.permutation,
                l.hop,
                u32::from(l.prev_hop),
                u32::from(l.next_hop),
            )
        });
        trace!(out_face = ?choice.face, ?tag, "发出 Interest");
        if self.send(faces, choice.face, NdnPacket::Interest(interest.clone()), tag) {
            self.stats.out_interests += 1;
        } else {
            self.stats.drop_interests += 1;
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(node = ?self.node, face = ?in_face, name = %data.name)
    )]
    pub fn on_data(&mut self, faces: &mut FaceTable, in_face: FaceId, data: Data, now: SimTime) {
        self.stats.in_data += 1;
        let Some(entry) = self.pit.lookup_pending_mut(&data.name) else {
            self.stats.unsolicited_data += 1;
            if self.cfg.cache_unsolicited_data {
                self.cs.add(data);
            } else {
                self.stats.drop_data += 1;
            }
            debug!("未请求的 Data");
            return;
        };
        let prefix = entry.fib_prefix().clone();
        let send_time = entry.find_outgoing(in_face).map(|o| o.send_time);
        let incoming: Vec<FaceId> = entry.incoming().iter().map(|r| r.face).collect();

        if let Some(fib_entry) = self.fib.find_mut(&prefix) {
            fib_entry.increase_data();
            // 请求方本身就是 FIB 接口时，该子树已由别处计过
            let update = !incoming.iter().any(|f| fib_entry.metric(*f).is_some());
            if update {
                match fib_entry.metric_mut(in_face) {
                    Some(m) => {
                        m.increase_data_in();
                        if data.ce == CongestionMark::Experienced {
                            m.increase_data_ce();
                        }
                    }
                    None => trace!("Data 来自 FIB 之外的接口"),
                }
            }
            if let Some(sent) = send_time {
                fib_entry.update_face_rtt(in_face, now.saturating_sub(sent));
            }
        }
        self.cs.add(data.clone());
        self.satisfy_pending_interest(faces, Some(in_face), data, now);
    }

    /// 向所有请求方下发 Data，随后软删除表项
    fn satisfy_pending_interest(
        &mut self,
        faces: &mut FaceTable,
        in_face: Option<FaceId>,
        data: Data,
        now: SimTime,
    ) {
        let Some(entry) = self.pit.lookup_mut(&data.name) else {
            return;
        };
        if let Some(face) = in_face {
            entry.remove_incoming(face);
        }
        let incoming: Vec<IncomingFace> = entry.incoming().to_vec();
        entry.clear_incoming();
        entry.clear_outgoing();
        self.pit.mark_erased(&data.name, now);

        for rec in incoming {
            let mut d = data.clone();
            let tag = if faces.is_app(rec.face) {
                if in_face.is_none() {
                    d.ce = CongestionMark::LocalHit;
                }
                None
            } else {
                Some(BCubeTag::for_data(rec.local_port))
            };
            if self.send(faces, rec.face, NdnPacket::Data(d), tag) {
                self.stats.out_data += 1;
            } else {
                self.stats.drop_data += 1;
            }
        }
        self.stats.satisfied += 1;
    }

    #[tracing::instrument(
        skip_all,
        fields(node = ?self.node, face = ?in_face, name = %nack.name, code = nack.nack.code())
    )]
    fn on_nack(
        &mut self,
        faces: &mut FaceTable,
        in_face: FaceId,
        nack: Interest,
        now: SimTime,
    ) -> Result<(), NdnError> {
        self.stats.in_nacks += 1;
        let Some(entry) = self.pit.lookup_pending_mut(&nack.name) else {
            debug!("NACK 没有对应的 PIT 表项");
            self.stats.drop_nacks += 1;
            return Ok(());
        };
        let prefix = entry.fib_prefix().clone();

        if let Some(face) = faces.get_mut(in_face) {
            face.limits.increase_nack();
        }
        if nack.nack == NackCode::GiveupPit {
            if let Some(m) = self
                .fib
                .find_mut(&prefix)
                .and_then(|e| e.metric_mut(in_face))
            {
                m.increase_nack();
            }
        }
        self.did_receive_valid_nack(faces, in_face, nack, now)
    }

    fn did_receive_valid_nack(
        &mut self,
        faces: &mut FaceTable,
        in_face: FaceId,
        nack: Interest,
        now: SimTime,
    ) -> Result<(), NdnError> {
        let Some(entry) = self.pit.lookup_pending_mut(&nack.name) else {
            self.stats.drop_nacks += 1;
            return Ok(());
        };
        if nack.nack == NackCode::GiveupPit {
            entry.remove_incoming(in_face);
        }
        entry.set_waiting_in_vain(in_face);
        if !entry.are_all_outgoing_in_vain() {
            trace!("仍有出接口在等待，暂不上报");
            self.stats.drop_nacks += 1;
            return Ok(());
        }

        // 以原请求方的身份重试一次
        let retry_face = entry.incoming().first().map_or(in_face, |r| r.face);
        let retry_tag = entry.route_tag();
        let interest = nack.to_normal();
        let outcome =
            self.do_propagate_interest(faces, retry_face, &interest, retry_tag.as_ref(), now)?;
        if !outcome.is_sent() {
            self.did_exhaust_forwarding_options(faces, retry_face, &interest, Some(in_face), now);
        }
        Ok(())
    }

    /// 所有出接口无望：向请求方回 GIVEUP_PIT，并按瓶颈接口的比例通知其他本地应用
    fn did_exhaust_forwarding_options(
        &mut self,
        faces: &mut FaceTable,
        in_face: FaceId,
        interest: &Interest,
        bottleneck: Option<FaceId>,
        now: SimTime,
    ) {
        let name = interest.name.clone();
        if self.cfg.enable_nacks {
            let Some(entry) = self.pit.lookup(&name) else {
                return;
            };
            let incoming = entry.incoming().to_vec();
            let prefix = entry.fib_prefix().clone();
            debug!(
                face = ?in_face,
                requesters = incoming.len(),
                ?bottleneck,
                "❌ 转发选项耗尽，发送 NACK"
            );
            for rec in &incoming {
                let nack = interest.to_nack(NackCode::GiveupPit, INTRA_SHARING_FULL);
                self.send_nack(faces, rec.face, rec.local_port, nack);
            }

            let fraction = bottleneck
                .filter(|f| !faces.is_app(*f))
                .and_then(|f| self.fib.find(&prefix)?.metric(f))
                .map(|m| m.fraction());
            if let Some(fraction) = fraction {
                let intra = (100.0 - fraction).round().clamp(0.0, 100.0) as u32;
                let apps: Vec<FaceId> = faces
                    .app_faces()
                    .filter(|a| !incoming.iter().any(|r| r.face == *a))
                    .collect();
                for app in apps {
                    self.outbox.push(Output::NotifyApp {
                        face: app,
                        nack: interest.to_nack(NackCode::GiveupPit, intra),
                    });
                    self.stats.extra_nacks += 1;
                }
            }
            if let Some(entry) = self.pit.lookup_mut(&name) {
                entry.clear_outgoing();
            }
        }

        let Some(entry) = self.pit.lookup_mut(&name) else {
            return;
        };
        if entry.are_all_outgoing_in_vain() {
            entry.clear_incoming();
            entry.clear_outgoing();
            self.pit.mark_erased(&name, now);
            self.stats.drop_interests += 1;
            self.stats.exhausted += 1;
        }
    }

    /// PIT 周期清扫
    pub fn sweep_pit(&mut self, now: SimTime) -> PitCleanup {
        let out = self.pit.cleanup(now);
        self.stats.timed_out += out.timed_out as u64;
        out
    }

    /// 对一个前缀执行一次比例重平衡
    pub fn rebalance(&mut self, prefix: &Name) -> Option<RebalanceStep> {
        let cfg = &self.cfg.fib;
        self.fib.find_mut(prefix).map(|e| e.rebalance(cfg))
    }
}
