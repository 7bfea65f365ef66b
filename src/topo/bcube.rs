//! BCube 拓扑构建
//!
//! BCube(n, k)：`n^(k+1)` 台服务器，`k+1` 层，每层 `n^k` 台 n 口交换机。
//! 服务器地址为 `k+1` 位 n 进制数字 `d0 d1 .. dk`，名字写作 `S<d0><d1>..<dk>`。
//! 第 `l` 层交换机把“除第 `l` 位外都相同”的 n 台服务器连在一起，
//! 交换机的 `p` 号端口连第 `l` 位为 `p` 的服务器；服务器的 `l` 号端口连第 `l` 层。
//!
//! 静态路由：对 producer `P` 和其他每台服务器 `X`，沿 k+1 个轮转的层序
//! `[i, i-1, .., 0, k, .., i+1]` 逐位纠正地址，每个层序给出一条路径，
//! `X` 上记录的是该路径第一跳所在的层（即出接口）。

use crate::app::{App, Consumer, ConsumerConfig, Producer, ProducerConfig};
use crate::error::NdnError;
use crate::ndn::{AppId, FaceId, ForwarderConfig, LimitsConfig, MAX_HOPS, RouteLabel, encode_permutation};
use crate::net::{NetWorld, NodeId};
use crate::queue::mem_from_pkt;
use crate::sim::SimTime;
use tracing::{debug, info};

/// BCube 拓扑配置选项
#[derive(Debug, Clone)]
pub struct BCubeOpts {
    pub n: u8,
    pub k: u8,
    pub link_bps: u64,
    pub link_latency: SimTime,
    pub queue_bytes: u64,
    /// 出口队列超过该字节数时给 Data 打 CE
    pub ecn_threshold_bytes: Option<u64>,
    pub forwarding: ForwarderConfig,
    pub limits: LimitsConfig,
}

impl Default for BCubeOpts {
    fn default() -> Self {
        Self {
            n: 2,
            k: 1,
            link_bps: 10_000_000,
            link_latency: SimTime::from_millis(1),
            queue_bytes: mem_from_pkt(100),
            ecn_threshold_bytes: None,
            forwarding: ForwarderConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BCubeTopology {
    pub n: u8,
    pub k: u8,
    /// 下标即地址的 n 进制值（d0 为最低位）
    pub servers: Vec<NodeId>,
    /// `switches[l]` 为第 `l` 层的交换机
    pub switches: Vec<Vec<NodeId>>,
}

impl BCubeTopology {
    pub fn levels(&self) -> usize {
        usize::from(self.k) + 1
    }

    pub fn address_of(&self, index: usize) -> Vec<u8> {
        address_of(index, self.n, self.k)
    }

    pub fn index_of(&self, address: &[u8]) -> Option<usize> {
        if address.len() != self.levels() || address.iter().any(|d| *d >= self.n) {
            return None;
        }
        Some(
            address
                .iter()
                .rev()
                .fold(0usize, |acc, d| acc * usize::from(self.n) + usize::from(*d)),
        )
    }

    pub fn server_at(&self, address: &[u8]) -> Option<NodeId> {
        self.index_of(address).map(|i| self.servers[i])
    }

    /// 按名字（`S01` 之类）查服务器
    pub fn server_named(&self, name: &str) -> Result<NodeId, NdnError> {
        let digits = name
            .strip_prefix('S')
            .filter(|d| !d.is_empty())
            .and_then(|d| {
                d.chars()
                    .map(|c| c.to_digit(10).map(|v| v as u8))
                    .collect::<Option<Vec<u8>>>()
            })
            .ok_or_else(|| NdnError::UnknownServer(name.to_string()))?;
        self.server_at(&digits)
            .ok_or_else(|| NdnError::UnknownServer(name.to_string()))
    }
}

/// 第 `index` 台服务器的地址，`address[l]` 为第 `l` 位
pub fn address_of(index: usize, n: u8, k: u8) -> Vec<u8> {
    let n = usize::from(n);
    let mut rest = index;
    (0..=k)
        .map(|_| {
            let d = (rest % n) as u8;
            rest /= n;
            d
        })
        .collect()
}

pub fn server_name(address: &[u8]) -> String {
    let digits: String = address.iter().map(|d| char::from(b'0' + d)).collect();
    format!("S{digits}")
}

/// 服务器在第 `level` 层所连交换机的序号：去掉该位后剩余各位的 n 进制值
fn switch_index(address: &[u8], level: usize, n: u8) -> usize {
    address
        .iter()
        .enumerate()
        .filter(|(l, _)| *l != level)
        .rev()
        .fold(0usize, |acc, (_, d)| acc * usize::from(n) + usize::from(*d))
}

/// 第 `start` 个轮转层序：`[start, start-1, .., 0, k, .., start+1]`
pub fn rotated_levels(start: u8, k: u8) -> Vec<u8> {
    (0..=k).map(|i| (start + k + 1 - i) % (k + 1)).collect()
}

/// 从 `from` 到 `to` 的 k+1 条路径在 `from` 上的第一跳
///
/// 返回 (出接口层号, 路径标签)；`from == to` 时为空。
pub fn first_hops(from: &[u8], to: &[u8], k: u8) -> Vec<(u8, RouteLabel)> {
    (0..=k)
        .filter_map(|start| {
            let order = rotated_levels(start, k);
            let (pos, level) = order
                .iter()
                .enumerate()
                .find(|(_, l)| from[usize::from(**l)] != to[usize::from(**l)])?;
            let l = usize::from(*level);
            Some((
                *level,
                RouteLabel {
                    permutation: encode_permutation(&order),
                    hop: pos as u8,
                    prev_hop: from[l],
                    next_hop: to[l],
                },
            ))
        })
        .collect()
}

/// 构建 BCube 拓扑
pub fn build_bcube(world: &mut NetWorld, opts: &BCubeOpts) -> Result<BCubeTopology, NdnError> {
    if !(2..=10).contains(&opts.n) {
        return Err(NdnError::InvalidTopology(format!(
            "BCube n must be in 2..=10, got {}",
            opts.n
        )));
    }
    if opts.k >= MAX_HOPS {
        return Err(NdnError::InvalidTopology(format!(
            "BCube k must be below {MAX_HOPS}, got {}",
            opts.k
        )));
    }
    let n = usize::from(opts.n);
    let levels = usize::from(opts.k) + 1;
    let server_count = n.pow(levels as u32);
    let per_level = n.pow(u32::from(opts.k));

    let mut servers = Vec::with_capacity(server_count);
    for idx in 0..server_count {
        let address = address_of(idx, opts.n, opts.k);
        let id = world.net.add_server(
            server_name(&address),
            address,
            opts.forwarding.clone(),
            opts.limits.clone(),
        );
        servers.push(id);
    }
    let switches: Vec<Vec<NodeId>> = (0..levels)
        .map(|l| {
            (0..per_level)
                .map(|j| world.net.add_switch(format!("W{l}_{j}")))
                .collect()
        })
        .collect();

    // 服务器按地址升序连接，交换机端口号因此等于该层的地址位
    for (idx, server) in servers.iter().enumerate() {
        let address = address_of(idx, opts.n, opts.k);
        for (level, row) in switches.iter().enumerate() {
            let sw = row[switch_index(&address, level, opts.n)];
            world.net.connect(
                *server,
                sw,
                opts.link_latency,
                opts.link_bps,
                opts.queue_bytes,
            );
        }
    }
    world.net.set_ecn_threshold(opts.ecn_threshold_bytes);

    info!(
        n = opts.n,
        k = opts.k,
        servers = servers.len(),
        switches = levels * per_level,
        "🧱 BCube 拓扑构建完成"
    );
    Ok(BCubeTopology {
        n: opts.n,
        k: opts.k,
        servers,
        switches,
    })
}

/// 在 `server` 上安装 producer，并在其余服务器上写入到该前缀的静态路由
///
/// 须在 `Network::start` 之前调用，FIB 重平衡定时器在启动时创建。
pub fn install_producer(
    world: &mut NetWorld,
    topo: &BCubeTopology,
    server: NodeId,
    cfg: ProducerConfig,
) -> Result<AppId, NdnError> {
    let prefix = cfg.prefix.clone();
    let target = world
        .net
        .server_mut(server)
        .ok_or_else(|| NdnError::UnknownServer(format!("{server:?}")))?;
    let to = target.address().to_vec();
    let (app, face) = target.install_app(App::Producer(Producer::new(cfg)));
    target.register_local_prefix(&prefix, face);

    let mut routes = 0usize;
    for &other in &topo.servers {
        if other == server {
            continue;
        }
        let Some(s) = world.net.server_mut(other) else {
            continue;
        };
        let from = s.address().to_vec();
        for (level, label) in first_hops(&from, &to, topo.k) {
            s.register_route(&prefix, FaceId(u32::from(level)), label);
            routes += 1;
        }
    }
    debug!(%prefix, ?server, routes, "静态路由安装完成");
    Ok(app)
}

/// 在 `server` 上安装 consumer
pub fn install_consumer(
    world: &mut NetWorld,
    server: NodeId,
    cfg: ConsumerConfig,
) -> Result<AppId, NdnError> {
    let s = world
        .net
        .server_mut(server)
        .ok_or_else(|| NdnError::UnknownServer(format!("{server:?}")))?;
    let (app, _) = s.install_app(App::Consumer(Consumer::new(cfg)));
    Ok(app)
}
