//! 每个出接口的令牌桶（LimitsDeltaRate）
//!
//! 桶只在周期边界清空：每个 `reset_interval` 由定时事件调用
//! [`LimitsDeltaRate::update_bucket`]，把当前计数保存到 `bucket_old` 后归零。
//! 周期内每转发一个 Interest 借一个令牌，计数单调不减。

use crate::sim::{EventId, SimTime};
use tracing::trace;

/// 每个接口限速参数（对应 `EnableLimits(avgRtt, avgData, avgInterest)`）
#[derive(Debug, Clone, PartialEq)]
pub struct LimitsConfig {
    pub enabled: bool,
    pub avg_rtt: SimTime,
    pub avg_data_bytes: u32,
    pub avg_interest_bytes: u32,
    pub reset_interval: SimTime,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            avg_rtt: SimTime::from_millis(200),
            avg_data_bytes: 40,
            avg_interest_bytes: 1100,
            reset_interval: SimTime::from_secs(1),
        }
    }
}

impl LimitsConfig {
    /// 链路带宽能承载的最大 Interest 速率（个/秒）
    pub fn max_rate_for(&self, bandwidth_bps: u64) -> f64 {
        let per_pair = f64::from(self.avg_data_bytes + self.avg_interest_bytes).max(1.0);
        bandwidth_bps as f64 / 8.0 / per_pair
    }
}

#[derive(Debug, Clone)]
pub struct LimitsDeltaRate {
    enabled: bool,
    max_rate: f64,
    max_delay: SimTime,
    reset_interval: SimTime,
    bucket_max: f64,
    bucket: f64,
    bucket_old: f64,
    nack: f64,
    timer: Option<EventId>,
}

impl Default for LimitsDeltaRate {
    fn default() -> Self {
        Self::new(SimTime::from_secs(1))
    }
}

impl LimitsDeltaRate {
    /// 未启用的限速器，`set_limits` 之后生效
    pub fn new(reset_interval: SimTime) -> Self {
        Self {
            enabled: false,
            max_rate: 0.0,
            max_delay: SimTime::ZERO,
            reset_interval,
            bucket_max: 0.0,
            bucket: 0.0,
            bucket_old: 0.0,
            nack: 0.0,
            timer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 设置最大速率（个/秒）与时延，重算桶容量
    pub fn set_limits(&mut self, max_rate: f64, max_delay: SimTime) {
        self.enabled = true;
        self.max_rate = max_rate;
        self.max_delay = max_delay;
        self.bucket_max = max_rate * self.reset_interval.as_secs_f64();
    }

    /// 直接指定当前速率上限
    pub fn update_current_limit(&mut self, limit: f64) {
        assert!(limit >= 0.0, "limit must be non-negative, got {limit}");
        self.bucket_max = limit * self.reset_interval.as_secs_f64();
    }

    pub fn is_below_limit(&self) -> bool {
        !self.enabled || self.bucket_max - self.bucket >= 1.0
    }

    /// 借一个令牌；调用方必须先确认 `is_below_limit`
    pub fn borrow_limit(&mut self) {
        if !self.enabled {
            return;
        }
        assert!(
            self.bucket_max - self.bucket >= 1.0,
            "borrow_limit without headroom: bucket={} max={}",
            self.bucket,
            self.bucket_max
        );
        self.bucket += 1.0;
    }

    /// 令牌按时间泄漏，不按归还
    pub fn return_limit(&mut self) {}

    pub fn available_interest_increment(&self) -> f64 {
        (self.bucket_max - self.bucket).max(0.0)
    }

    /// 周期边界：保存本周期计数并清零
    pub fn update_bucket(&mut self) {
        trace!(
            bucket = self.bucket,
            bucket_max = self.bucket_max,
            nack = self.nack,
            available = self.available_interest_increment(),
            "令牌桶周期重置"
        );
        self.bucket_old = self.bucket;
        self.bucket = 0.0;
    }

    pub fn increase_nack(&mut self) {
        self.nack += 1.0;
    }

    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }

    pub fn max_delay(&self) -> SimTime {
        self.max_delay
    }

    pub fn reset_interval(&self) -> SimTime {
        self.reset_interval
    }

    pub fn current_limit(&self) -> f64 {
        self.bucket_max
    }

    pub fn current_counter(&self) -> f64 {
        self.bucket
    }

    pub fn previous_counter(&self) -> f64 {
        self.bucket_old
    }

    pub fn nack(&self) -> f64 {
        self.nack
    }

    pub(crate) fn timer(&self) -> Option<EventId> {
        self.timer
    }

    pub(crate) fn set_timer(&mut self, timer: Option<EventId>) {
        self.timer = timer;
    }
}
