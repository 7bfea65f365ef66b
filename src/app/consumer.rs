//! AIMD consumer
//!
//! 发送间隔为 `1/limit` 秒：
//! - 收到非本地缓存命中的 Data：`limit += alpha/limit`，`alpha += 1/limit`（不超过 `alpha_max`）；
//!   本地命中不调整速率，立即发下一个 Interest。
//! - 收到本前缀的 GIVEUP_PIT NACK：`intra_sharing >= 100` 时 `limit -= beta`；
//!   否则按比例 `limit -= beta * intra/100`，同时 `alpha -= intra/100`（不低于 1）。
//! - `limit` 不低于 `init_limit`。

use crate::ndn::{CongestionMark, Data, DEFAULT_INTEREST_LIFETIME, Interest, NackCode, Name};
use crate::sim::{EventId, SimTime};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerConfig {
    pub prefix: Name,
    /// 初始速率（个/秒），同时是速率下限
    pub init_limit: f64,
    pub alpha_max: f64,
    pub beta: f64,
    /// 速率上报周期
    pub limit_interval: SimTime,
    /// 最大请求序列号（含）
    pub max_seq: u32,
    pub lifetime: SimTime,
    pub start: SimTime,
    pub stop: Option<SimTime>,
    /// nonce 随机数种子
    pub seed: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            prefix: Name::root(),
            init_limit: 10.0,
            alpha_max: 20.0,
            beta: 1.1,
            limit_interval: SimTime::from_secs(1),
            max_seq: u32::MAX,
            lifetime: DEFAULT_INTEREST_LIFETIME,
            start: SimTime::ZERO,
            stop: None,
            seed: 1,
        }
    }
}

/// 收到 Data 后 consumer 的要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerAction {
    None,
    /// 本地缓存命中，立即发送下一个
    SendNow,
}

/// 一次速率上报
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitSample {
    pub time_s: f64,
    pub limit: f64,
    pub interests: u64,
    pub data: u64,
    pub nacks: u64,
    pub extra_nacks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerTotals {
    pub interests: u64,
    pub data: u64,
    pub local_hits: u64,
    pub nacks: u64,
    /// 按比例折算的 NACK（intra_sharing < 100）
    pub extra_nacks: u64,
    /// 其他前缀的 NACK，忽略
    pub foreign_nacks: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct IntervalCounters {
    interests: u64,
    data: u64,
    nacks: u64,
    extra_nacks: u64,
}

#[derive(Debug)]
pub struct Consumer {
    cfg: ConsumerConfig,
    limit: f64,
    alpha: f64,
    inited: bool,
    active: bool,
    next_seq: Option<u32>,
    rng: StdRng,
    interval: IntervalCounters,
    totals: ConsumerTotals,
    samples: Vec<LimitSample>,
    send_timer: Option<EventId>,
    report_timer: Option<EventId>,
}

impl Consumer {
    pub fn new(cfg: ConsumerConfig) -> Self {
        Self {
            limit: cfg.init_limit,
            alpha: cfg.alpha_max,
            inited: false,
            active: false,
            next_seq: Some(0),
            rng: StdRng::seed_from_u64(cfg.seed),
            interval: IntervalCounters::default(),
            totals: ConsumerTotals::default(),
            samples: Vec::new(),
            send_timer: None,
            report_timer: None,
            cfg,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.cfg
    }

    pub fn prefix(&self) -> &Name {
        &self.cfg.prefix
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn totals(&self) -> ConsumerTotals {
        self.totals
    }

    pub fn samples(&self) -> &[LimitSample] {
        &self.samples
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// 当前速率下两次发送的间隔
    pub fn send_interval(&self) -> SimTime {
        SimTime::from_secs_f64(1.0 / self.limit)
    }

    /// 下一个 Interest；未启动或序列号用完时返回 None
    pub fn next_interest(&mut self) -> Option<Interest> {
        if !self.active {
            return None;
        }
        let seq = self.next_seq?;
        self.next_seq = if seq < self.cfg.max_seq {
            seq.checked_add(1)
        } else {
            None
        };
        let interest = Interest::new(self.cfg.prefix.with_seq(seq), self.rng.next_u32())
            .with_lifetime(self.cfg.lifetime);
        self.interval.interests += 1;
        self.totals.interests += 1;
        trace!(seq, nonce = interest.nonce, limit = self.limit, "> Interest");
        Some(interest)
    }

    pub fn on_data(&mut self, data: &Data) -> ConsumerAction {
        if !self.cfg.prefix.is_prefix_of(&data.name) {
            return ConsumerAction::None;
        }
        if !self.inited {
            self.alpha = self.cfg.alpha_max;
            self.inited = true;
        }
        self.interval.data += 1;
        self.totals.data += 1;

        if data.ce == CongestionMark::LocalHit {
            self.totals.local_hits += 1;
            return ConsumerAction::SendNow;
        }
        self.limit += self.alpha / self.limit;
        self.alpha = (self.alpha + 1.0 / self.limit).min(self.cfg.alpha_max);
        ConsumerAction::None
    }

    pub fn on_nack(&mut self, nack: &Interest) {
        if !self.cfg.prefix.is_prefix_of(&nack.name) {
            self.totals.foreign_nacks += 1;
            trace!(name = %nack.name, "忽略其他前缀的 NACK");
            return;
        }
        if nack.nack != NackCode::GiveupPit {
            return;
        }
        if nack.intra_sharing >= 100 {
            self.limit -= self.cfg.beta;
            self.interval.nacks += 1;
            self.totals.nacks += 1;
        } else {
            let share = f64::from(nack.intra_sharing) / 100.0;
            self.limit -= self.cfg.beta * share;
            self.alpha = (self.alpha - share).max(1.0);
            self.interval.extra_nacks += 1;
            self.totals.extra_nacks += 1;
        }
        if self.limit <= self.cfg.init_limit {
            self.limit = self.cfg.init_limit;
        }
        debug!(
            name = %nack.name,
            intra = nack.intra_sharing,
            limit = self.limit,
            alpha = self.alpha,
            "收到 NACK，降速"
        );
    }

    /// 记录当前速率并清零周期计数
    pub fn report(&mut self, now: SimTime) -> LimitSample {
        let sample = LimitSample {
            time_s: now.as_secs_f64(),
            limit: self.limit,
            interests: self.interval.interests,
            data: self.interval.data,
            nacks: self.interval.nacks,
            extra_nacks: self.interval.extra_nacks,
        };
        self.interval = IntervalCounters::default();
        self.samples.push(sample.clone());
        sample
    }

    pub(crate) fn send_timer(&self) -> Option<EventId> {
        self.send_timer
    }

    pub(crate) fn set_send_timer(&mut self, timer: Option<EventId>) {
        self.send_timer = timer;
    }

    pub(crate) fn report_timer(&self) -> Option<EventId> {
        self.report_timer
    }

    pub(crate) fn set_report_timer(&mut self, timer: Option<EventId>) {
        self.report_timer = timer;
    }
}
