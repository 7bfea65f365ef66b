//! 转发信息表（FIB）与每接口度量
//!
//! 每个前缀一条 [`FibEntry`]，内含以接口为键的 [`FaceMetric`] 映射，
//! 以及按 (状态, 路由代价) 排好序的接口列表，支持“第 n 好的候选”查询。
//!
//! 路由代价沿用十进制打包约定：一条路径的标签为 `prev_hop*10 + next_hop`，
//! 新接口的代价为 `label*10 + 1`；同一接口再加一条路径时，旧值左移两位、
//! 最低位（路径数）加一：`count + 1 + (cost - count)*100 + label*10`。
//! 除打包值外，每个接口还保存显式的 [`RouteLabel`] 列表，源路由按列表匹配。
//!
//! 比例重平衡每个 `update_interval` 运行一次：衰减计数 → 汇总 NACK →
//! 偏差 → 有界步长 → tanh 阻尼更新。

use super::face::FaceId;
use super::name::Name;
use crate::sim::{EventId, SimTime};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 打包进路由代价的路径数上限，再多会溢出 `i32`；显式路径列表不受此限
pub const MAX_ROUTES_PER_FACE: usize = 4;

/// 接口失效后的路由代价
pub const INVALID_ROUTING_COST: i32 = u16::MAX as i32;

const RTT_ALPHA: f64 = 1.0 / 8.0;
const RTT_BETA: f64 = 1.0 / 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FibConfig {
    pub update_interval: SimTime,
    /// 首次重平衡时刻（相对仿真开始）
    pub first_update: SimTime,
    /// 计数器指数衰减系数
    pub alpha: f64,
    pub w_lower_bound: f64,
    pub w_upper_bound: f64,
    pub max_bound: f64,
}

impl Default for FibConfig {
    fn default() -> Self {
        Self {
            update_interval: SimTime::from_secs(1),
            first_update: SimTime::from_millis(1),
            alpha: 1.0 / 16.0,
            w_lower_bound: 5.0,
            w_upper_bound: 100.0,
            max_bound: 1e7,
        }
    }
}

/// 接口可达性
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaceStatus {
    Green = 1,
    Yellow = 2,
    Red = 3,
}

/// 经由某接口的一条源路由路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteLabel {
    /// 路径置换（见 `bcube_tag`）
    pub permutation: u32,
    /// 本接口在置换中的位置
    pub hop: u8,
    /// 本节点在该层交换机上的端口
    pub prev_hop: u8,
    /// 交换机应转发到的端口
    pub next_hop: u8,
}

impl RouteLabel {
    pub fn metric(&self) -> i32 {
        i32::from(self.prev_hop) * 10 + i32::from(self.next_hop)
    }
}

/// 把打包的路由代价拆回各条路径的标签（最新的在前）
pub fn unpack_routing_cost(cost: i32) -> Vec<i32> {
    let count = cost % 10;
    let mut rest = cost / 10;
    (0..count)
        .map(|_| {
            let label = rest % 100;
            rest /= 100;
            label
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FaceMetric {
    face: FaceId,
    status: FaceStatus,
    routing_cost: i32,
    routes: Vec<RouteLabel>,
    srtt: Option<f64>,
    rttvar: f64,
    real_delay: SimTime,
    nack: f64,
    nack_old: f64,
    data_in: f64,
    data_in_old: f64,
    data_ce: f64,
    data_ce_old: f64,
    interest_count: u64,
    fraction: f64,
}

impl FaceMetric {
    fn with_cost(face: FaceId, status: FaceStatus, routing_cost: i32) -> Self {
        Self {
            face,
            status,
            routing_cost,
            routes: Vec::new(),
            srtt: None,
            rttvar: 0.0,
            real_delay: SimTime::ZERO,
            nack: 0.0,
            nack_old: 0.0,
            data_in: 0.0,
            data_in_old: 0.0,
            data_ce: 0.0,
            data_ce_old: 0.0,
            interest_count: 0,
            fraction: 1.0,
        }
    }

    pub fn face(&self) -> FaceId {
        self.face
    }

    pub fn status(&self) -> FaceStatus {
        self.status
    }

    pub fn routing_cost(&self) -> i32 {
        self.routing_cost
    }

    pub fn routes(&self) -> &[RouteLabel] {
        &self.routes
    }

    /// 本接口承载的、置换为 `permutation` 的路径
    pub fn route_for(&self, permutation: u32) -> Option<&RouteLabel> {
        self.routes.iter().find(|r| r.permutation == permutation)
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn set_fraction(&mut self, fraction: f64) {
        self.fraction = fraction;
    }

    pub fn srtt(&self) -> Option<f64> {
        self.srtt
    }

    pub fn rttvar(&self) -> f64 {
        self.rttvar
    }

    pub fn real_delay(&self) -> SimTime {
        self.real_delay
    }

    pub fn nack(&self) -> f64 {
        self.nack
    }

    pub fn nack_old(&self) -> f64 {
        self.nack_old
    }

    pub fn data_in(&self) -> f64 {
        self.data_in
    }

    pub fn data_in_old(&self) -> f64 {
        self.data_in_old
    }

    pub fn data_ce(&self) -> f64 {
        self.data_ce
    }

    pub fn data_ce_old(&self) -> f64 {
        self.data_ce_old
    }

    pub fn interest_count(&self) -> u64 {
        self.interest_count
    }

    pub fn increase_nack(&mut self) {
        self.nack += 1.0;
    }

    pub fn increase_data_in(&mut self) {
        self.data_in += 1.0;
    }

    pub fn increase_data_ce(&mut self) {
        self.data_ce += 1.0;
    }

    pub fn increase_interest(&mut self) {
        self.interest_count += 1;
    }

    /// RFC 2988 平滑 RTT
    pub fn update_rtt(&mut self, sample: SimTime) {
        let r = sample.as_secs_f64();
        match self.srtt {
            None => {
                self.srtt = Some(r);
                self.rttvar = r / 2.0;
            }
            Some(srtt) => {
                self.rttvar = (1.0 - RTT_BETA) * self.rttvar + RTT_BETA * (srtt - r).abs();
                self.srtt = Some((1.0 - RTT_ALPHA) * srtt + RTT_ALPHA * r);
            }
        }
    }

    /// 把本周期计数并入指数平均并清零
    pub fn decay_counters(&mut self, alpha: f64) {
        self.nack_old = alpha * self.nack + (1.0 - alpha) * self.nack_old;
        self.data_in_old = alpha * self.data_in + (1.0 - alpha) * self.data_in_old;
        self.data_ce_old = alpha * self.data_ce + (1.0 - alpha) * self.data_ce_old;
        self.nack = 0.0;
        self.data_in = 0.0;
        self.data_ce = 0.0;
        self.interest_count = 0;
    }

    /// 记录一条复用路径；只有前 `MAX_ROUTES_PER_FACE` 条计入打包代价
    fn pack_route(&mut self, label: RouteLabel) -> bool {
        if self.routes.contains(&label) {
            return true;
        }
        self.routes.push(label);
        self.status = FaceStatus::Yellow;
        if self.routes.len() > MAX_ROUTES_PER_FACE {
            return false;
        }
        let cost = self.routing_cost;
        let count = cost % 10;
        self.routing_cost = count + 1 + (cost - count) * 100 + label.metric() * 10;
        true
    }
}

/// 一次重平衡的中间量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RebalanceStep {
    pub q_mean: f64,
    pub q_var: f64,
    pub k_bound: f64,
    pub k: f64,
    /// 上一周期收到的 Data 总数
    pub data: u64,
}

#[derive(Debug)]
pub struct FibEntry {
    prefix: Name,
    faces: HashMap<FaceId, FaceMetric>,
    ranked: Vec<FaceId>,
    inited: bool,
    data: u64,
    last_data: u64,
    timer: Option<EventId>,
}

impl FibEntry {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            faces: HashMap::new(),
            ranked: Vec::new(),
            inited: false,
            data: 0,
            last_data: 0,
            timer: None,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    fn rerank(&mut self) {
        let faces = &self.faces;
        self.ranked.sort_by_key(|id| {
            let m = &faces[id];
            (m.status, m.routing_cost, m.face)
        });
    }

    /// 新接口插入打包后的初始代价；已知接口则追加一条复用路径
    pub fn add_or_update_routing_metric(&mut self, face: FaceId, label: RouteLabel) {
        match self.faces.get_mut(&face) {
            Some(m) => {
                if !m.pack_route(label) {
                    debug!(
                        prefix = %self.prefix,
                        face = ?face,
                        permutation = label.permutation,
                        "路径数超出打包容量，不计入路由代价"
                    );
                }
            }
            None => {
                let mut m = FaceMetric::with_cost(face, FaceStatus::Yellow, label.metric() * 10 + 1);
                m.routes.push(label);
                self.faces.insert(face, m);
                self.ranked.push(face);
            }
        }
        self.rerank();
    }

    /// 本地应用接口：代价 0，恒为 GREEN
    pub fn add_local_face(&mut self, face: FaceId) {
        if !self.faces.contains_key(&face) {
            self.faces
                .insert(face, FaceMetric::with_cost(face, FaceStatus::Green, 0));
            self.ranked.push(face);
        }
        self.rerank();
    }

    /// 未知接口返回 -1
    pub fn get_routing_metric(&self, face: FaceId) -> i32 {
        self.faces.get(&face).map_or(-1, |m| m.routing_cost)
    }

    pub fn invalidate(&mut self) {
        for m in self.faces.values_mut() {
            m.routing_cost = INVALID_ROUTING_COST;
            m.status = FaceStatus::Red;
        }
        self.rerank();
    }

    pub fn update_status(&mut self, face: FaceId, status: FaceStatus) -> bool {
        let Some(m) = self.faces.get_mut(&face) else {
            return false;
        };
        m.status = status;
        self.rerank();
        true
    }

    pub fn update_face_rtt(&mut self, face: FaceId, sample: SimTime) -> bool {
        match self.faces.get_mut(&face) {
            Some(m) => {
                m.update_rtt(sample);
                true
            }
            None => false,
        }
    }

    pub fn set_real_delay_to_producer(&mut self, face: FaceId, delay: SimTime) -> bool {
        match self.faces.get_mut(&face) {
            Some(m) => {
                m.real_delay = delay;
                true
            }
            None => false,
        }
    }

    /// 按 (状态, 代价) 排名第 `skip % n` 的接口
    pub fn find_best_candidate(&self, skip: usize) -> Option<&FaceMetric> {
        if self.ranked.is_empty() {
            return None;
        }
        let id = self.ranked[skip % self.ranked.len()];
        self.faces.get(&id)
    }

    /// 按排名遍历
    pub fn faces_ranked(&self) -> impl Iterator<Item = &FaceMetric> + '_ {
        self.ranked.iter().filter_map(|id| self.faces.get(id))
    }

    pub fn metric(&self, face: FaceId) -> Option<&FaceMetric> {
        self.faces.get(&face)
    }

    pub fn metric_mut(&mut self, face: FaceId) -> Option<&mut FaceMetric> {
        self.faces.get_mut(&face)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_inited(&self) -> bool {
        self.inited
    }

    pub fn increase_data(&mut self) {
        self.data += 1;
    }

    pub fn data(&self) -> u64 {
        self.data
    }

    pub fn last_data(&self) -> u64 {
        self.last_data
    }

    pub(crate) fn timer(&self) -> Option<EventId> {
        self.timer
    }

    pub(crate) fn set_timer(&mut self, timer: Option<EventId>) {
        self.timer = timer;
    }

    /// 周期性比例重平衡
    ///
    /// `q_mean` 取各接口衰减后 NACK 的总和，`fraction * q_mean / 100` 即该接口
    /// 按比例应分担的 NACK 份额；偏离份额越多，比例调整越大。
    pub fn rebalance(&mut self, cfg: &FibConfig) -> RebalanceStep {
        for m in self.faces.values_mut() {
            m.decay_counters(cfg.alpha);
        }
        let mut step = RebalanceStep {
            data: self.data,
            ..RebalanceStep::default()
        };
        self.last_data = self.data;
        self.data = 0;

        let n = self.faces.len();
        if n == 0 {
            return step;
        }

        let q_mean: f64 = self.faces.values().map(|m| m.nack_old).sum();
        let mut k_bound = cfg.max_bound;
        let mut q_var = 0.0;
        for m in self.faces.values() {
            let tmp = m.fraction * q_mean / 100.0 - m.nack_old;
            q_var += tmp * tmp;
            if tmp > 0.0 {
                k_bound = k_bound.min((cfg.w_upper_bound - m.fraction) / tmp);
            } else if tmp < 0.0 {
                k_bound = k_bound.min((cfg.w_lower_bound - m.fraction) / tmp);
            }
        }
        let k_bound = k_bound.max(0.0);
        let q_var = q_var.sqrt() / n as f64;
        let k = k_bound * (q_var / (1.0 + q_mean) / 5.0).tanh();

        for m in self.faces.values_mut() {
            let next = if self.inited {
                m.fraction + k * (m.fraction * q_mean / 100.0 - m.nack_old)
            } else {
                100.0 / n as f64
            };
            m.fraction = next.clamp(cfg.w_lower_bound, cfg.w_upper_bound);
        }
        self.inited = true;

        step.q_mean = q_mean;
        step.q_var = q_var;
        step.k_bound = k_bound;
        step.k = k;
        debug!(
            prefix = %self.prefix,
            q_mean,
            q_var,
            k_bound,
            k,
            data = step.data,
            "⚖️  FIB 比例重平衡"
        );
        step
    }
}

/// 以前缀为键的 FIB
#[derive(Debug, Default)]
pub struct Fib {
    entries: BTreeMap<Name, FibEntry>,
}

impl Fib {
    /// 取出或新建前缀表项
    pub fn entry(&mut self, prefix: &Name) -> &mut FibEntry {
        self.entries
            .entry(prefix.clone())
            .or_insert_with(|| FibEntry::new(prefix.clone()))
    }

    pub fn add(&mut self, prefix: &Name, face: FaceId, label: RouteLabel) -> &mut FibEntry {
        let entry = self.entry(prefix);
        entry.add_or_update_routing_metric(face, label);
        entry
    }

    /// 最长前缀匹配
    pub fn longest_prefix_match(&self, name: &Name) -> Option<&FibEntry> {
        (0..=name.len())
            .rev()
            .find_map(|n| self.entries.get(&name.prefix(n)))
    }

    pub fn find(&self, prefix: &Name) -> Option<&FibEntry> {
        self.entries.get(prefix)
    }

    pub fn find_mut(&mut self, prefix: &Name) -> Option<&mut FibEntry> {
        self.entries.get_mut(prefix)
    }

    /// 删除表项；调用方负责撤销其定时器
    pub fn remove(&mut self, prefix: &Name) -> Option<FibEntry> {
        self.entries.remove(prefix)
    }

    pub fn invalidate_all(&mut self) {
        for e in self.entries.values_mut() {
            e.invalidate();
        }
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FibEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
