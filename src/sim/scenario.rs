//! JSON 场景描述
//!
//! 场景文件选择拓扑形状、链路参数、转发与限速配置，以及 producer/consumer。
//! 未给出的字段取各配置结构的默认值。

use crate::app::{ConsumerConfig, ProducerConfig};
use crate::error::NdnError;
use crate::ndn::{FibConfig, ForwarderConfig, LimitsConfig, Name, PitConfig, StrategyKind};
use crate::sim::SimTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub topology: TopologySpec,
    #[serde(default)]
    pub forwarding: ForwardingSpec,
    #[serde(default)]
    pub limits: LimitsSpec,
    #[serde(default)]
    pub producers: Vec<ProducerSpec>,
    #[serde(default)]
    pub consumers: Vec<ConsumerSpec>,
    /// 仿真时长；命令行参数优先
    #[serde(default)]
    pub until_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Bcube {
        n: u8,
        k: u8,
        #[serde(default)]
        link_mbps: Option<u64>,
        #[serde(default)]
        link_latency_us: Option<u64>,
        #[serde(default)]
        queue_pkts: Option<u64>,
        #[serde(default)]
        ecn_threshold_pkts: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategySpec {
    Bcube,
    BestRoute,
}

impl From<StrategySpec> for StrategyKind {
    fn from(s: StrategySpec) -> Self {
        match s {
            StrategySpec::Bcube => StrategyKind::BCube,
            StrategySpec::BestRoute => StrategyKind::BestRoute,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardingSpec {
    #[serde(default)]
    pub strategy: Option<StrategySpec>,
    #[serde(default)]
    pub enable_nacks: Option<bool>,
    #[serde(default)]
    pub detect_retransmissions: Option<bool>,
    #[serde(default)]
    pub cache_unsolicited_data: Option<bool>,
    #[serde(default)]
    pub cs_capacity: Option<usize>,
    #[serde(default)]
    pub pit: Option<PitSpec>,
    #[serde(default)]
    pub fib: Option<FibSpec>,
}

impl ForwardingSpec {
    pub fn to_config(&self) -> ForwarderConfig {
        let d = ForwarderConfig::default();
        ForwarderConfig {
            strategy: self.strategy.map_or(d.strategy, StrategyKind::from),
            enable_nacks: self.enable_nacks.unwrap_or(d.enable_nacks),
            detect_retransmissions: self
                .detect_retransmissions
                .unwrap_or(d.detect_retransmissions),
            cache_unsolicited_data: self
                .cache_unsolicited_data
                .unwrap_or(d.cache_unsolicited_data),
            cs_capacity: self.cs_capacity.unwrap_or(d.cs_capacity),
            pit: self.pit.as_ref().map_or(d.pit, PitSpec::to_config),
            fib: self.fib.as_ref().map_or(d.fib, FibSpec::to_config),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitSpec {
    #[serde(default)]
    pub max_size: Option<usize>,
    #[serde(default)]
    pub erase_grace_ms: Option<u64>,
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,
}

impl PitSpec {
    pub fn to_config(&self) -> PitConfig {
        let d = PitConfig::default();
        PitConfig {
            max_size: self.max_size.unwrap_or(d.max_size),
            erase_grace: self.erase_grace_ms.map_or(d.erase_grace, SimTime::from_millis),
            sweep_interval: self
                .sweep_interval_ms
                .map_or(d.sweep_interval, SimTime::from_millis),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FibSpec {
    #[serde(default)]
    pub update_interval_ms: Option<u64>,
    #[serde(default)]
    pub first_update_ms: Option<u64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub w_lower_bound: Option<f64>,
    #[serde(default)]
    pub w_upper_bound: Option<f64>,
    #[serde(default)]
    pub max_bound: Option<f64>,
}

impl FibSpec {
    pub fn to_config(&self) -> FibConfig {
        let d = FibConfig::default();
        FibConfig {
            update_interval: self
                .update_interval_ms
                .map_or(d.update_interval, SimTime::from_millis),
            first_update: self
                .first_update_ms
                .map_or(d.first_update, SimTime::from_millis),
            alpha: self.alpha.unwrap_or(d.alpha),
            w_lower_bound: self.w_lower_bound.unwrap_or(d.w_lower_bound),
            w_upper_bound: self.w_upper_bound.unwrap_or(d.w_upper_bound),
            max_bound: self.max_bound.unwrap_or(d.max_bound),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub avg_rtt_ms: Option<u64>,
    #[serde(default)]
    pub avg_data_bytes: Option<u32>,
    #[serde(default)]
    pub avg_interest_bytes: Option<u32>,
    #[serde(default)]
    pub reset_interval_ms: Option<u64>,
}

impl LimitsSpec {
    pub fn to_config(&self) -> LimitsConfig {
        let d = LimitsConfig::default();
        LimitsConfig {
            enabled: self.enabled.unwrap_or(d.enabled),
            avg_rtt: self.avg_rtt_ms.map_or(d.avg_rtt, SimTime::from_millis),
            avg_data_bytes: self.avg_data_bytes.unwrap_or(d.avg_data_bytes),
            avg_interest_bytes: self.avg_interest_bytes.unwrap_or(d.avg_interest_bytes),
            reset_interval: self
                .reset_interval_ms
                .map_or(d.reset_interval, SimTime::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerSpec {
    /// 服务器名，如 `S11`
    pub server: String,
    pub prefix: String,
    #[serde(default)]
    pub payload_bytes: Option<usize>,
}

impl ProducerSpec {
    pub fn to_config(&self) -> Result<ProducerConfig, NdnError> {
        let d = ProducerConfig::default();
        Ok(ProducerConfig {
            prefix: Name::parse(&self.prefix)?,
            payload_bytes: self.payload_bytes.unwrap_or(d.payload_bytes),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerSpec {
    pub server: String,
    pub prefix: String,
    #[serde(default)]
    pub init_limit: Option<f64>,
    #[serde(default)]
    pub alpha_max: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub limit_interval_ms: Option<u64>,
    #[serde(default)]
    pub max_seq: Option<u32>,
    #[serde(default)]
    pub lifetime_ms: Option<u64>,
    #[serde(default)]
    pub start_ms: Option<u64>,
    #[serde(default)]
    pub stop_ms: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ConsumerSpec {
    /// `index` 用于在未指定种子时区分各 consumer
    pub fn to_config(&self, index: usize) -> Result<ConsumerConfig, NdnError> {
        let d = ConsumerConfig::default();
        let init_limit = self.init_limit.unwrap_or(d.init_limit);
        let alpha_max = self.alpha_max.unwrap_or(d.alpha_max);
        let beta = self.beta.unwrap_or(d.beta);
        // 发送间隔是 1/limit，非正的初始速率会让 consumer 原地空转
        if !(init_limit.is_finite() && init_limit > 0.0) {
            return Err(NdnError::InvalidConfig(format!(
                "consumer on {}: init_limit must be positive, got {init_limit}",
                self.server
            )));
        }
        if !(alpha_max.is_finite() && alpha_max > 0.0) {
            return Err(NdnError::InvalidConfig(format!(
                "consumer on {}: alpha_max must be positive, got {alpha_max}",
                self.server
            )));
        }
        if !(beta.is_finite() && beta >= 0.0) {
            return Err(NdnError::InvalidConfig(format!(
                "consumer on {}: beta must not be negative, got {beta}",
                self.server
            )));
        }
        Ok(ConsumerConfig {
            prefix: Name::parse(&self.prefix)?,
            init_limit,
            alpha_max,
            beta,
            limit_interval: self
                .limit_interval_ms
                .map_or(d.limit_interval, SimTime::from_millis),
            max_seq: self.max_seq.unwrap_or(d.max_seq),
            lifetime: self.lifetime_ms.map_or(d.lifetime, SimTime::from_millis),
            start: self.start_ms.map_or(d.start, SimTime::from_millis),
            stop: self.stop_ms.map(SimTime::from_millis),
            seed: self.seed.unwrap_or(d.seed + index as u64),
        })
    }
}

impl ScenarioSpec {
    pub fn from_json(text: &str) -> Result<Self, NdnError> {
        Ok(serde_json::from_str(text)?)
    }

    /// 内置场景：BCube(2,1)，S00 上的 consumer 经两条不相交路径请求 S11 的 `/prefix11`
    pub fn two_path() -> Self {
        Self {
            name: Some("bcube-2-1-two-path".to_string()),
            topology: TopologySpec::Bcube {
                n: 2,
                k: 1,
                link_mbps: None,
                link_latency_us: None,
                queue_pkts: None,
                ecn_threshold_pkts: None,
            },
            forwarding: ForwardingSpec::default(),
            limits: LimitsSpec::default(),
            producers: vec![ProducerSpec {
                server: "S11".to_string(),
                prefix: "/prefix11".to_string(),
                payload_bytes: None,
            }],
            consumers: vec![ConsumerSpec {
                server: "S00".to_string(),
                prefix: "/prefix11".to_string(),
                init_limit: None,
                alpha_max: None,
                beta: None,
                limit_interval_ms: None,
                max_seq: None,
                lifetime_ms: None,
                start_ms: None,
                stop_ms: None,
                seed: None,
            }],
            until_ms: Some(5_000),
        }
    }
}
