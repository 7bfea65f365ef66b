//! 运行报告
//!
//! 仿真结束后汇总 consumer 速率曲线、各服务器转发计数、接口与 FIB 状态，
//! 以 JSON 输出。

use crate::app::{App, ConsumerTotals, LimitSample};
use crate::ndn::{FaceCounters, ForwarderStats};
use crate::net::{Network, Node, Stats};
use crate::queue::QueueDrops;
use crate::sim::Simulator;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub scenario: Option<String>,
    pub sim_time_s: f64,
    pub events: u64,
    pub network: Stats,
    pub consumers: Vec<ConsumerSummary>,
    pub producers: Vec<ProducerSummary>,
    pub servers: Vec<ServerSummary>,
    pub links: Vec<LinkSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumerSummary {
    pub server: String,
    pub prefix: String,
    pub final_limit: f64,
    pub totals: ConsumerTotals,
    pub samples: Vec<LimitSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProducerSummary {
    pub server: String,
    pub prefix: String,
    pub served: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    pub name: String,
    pub forwarder: ForwarderStats,
    pub pit_entries: usize,
    pub cs_entries: usize,
    pub cs_hits: u64,
    pub faces: Vec<FaceSummary>,
    pub fib: Vec<FibSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceSummary {
    pub face: u32,
    pub app: bool,
    pub port: Option<u8>,
    pub up: bool,
    pub counters: FaceCounters,
    /// 当前周期令牌桶上限，未限速时为 0
    pub limit: f64,
    pub limiter_nacks: f64,
}

/// 单向链路及其出口队列
#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub from: String,
    pub to: String,
    pub tx_pkts: u64,
    pub tx_bytes: u64,
    pub peak_queue_bytes: u64,
    pub drops: QueueDrops,
}

#[derive(Debug, Clone, Serialize)]
pub struct FibSummary {
    pub prefix: String,
    pub faces: Vec<FibFaceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FibFaceSummary {
    pub face: u32,
    pub status: String,
    pub routing_cost: i32,
    pub routes: usize,
    pub fraction: f64,
    pub srtt_ms: Option<f64>,
}

impl SimReport {
    pub fn collect(net: &Network, sim: &Simulator, scenario: Option<String>) -> Self {
        let mut consumers = Vec::new();
        let mut producers = Vec::new();
        let mut servers = Vec::new();

        for s in net.servers() {
            for app in s.apps() {
                match app {
                    App::Consumer(c) => consumers.push(ConsumerSummary {
                        server: s.name().to_string(),
                        prefix: c.prefix().to_string(),
                        final_limit: c.limit(),
                        totals: c.totals(),
                        samples: c.samples().to_vec(),
                    }),
                    App::Producer(p) => producers.push(ProducerSummary {
                        server: s.name().to_string(),
                        prefix: p.prefix().to_string(),
                        served: p.served(),
                    }),
                }
            }

            let faces = s
                .faces()
                .iter()
                .map(|f| FaceSummary {
                    face: f.id().0,
                    app: f.is_app(),
                    port: f.port(),
                    up: f.is_up(),
                    counters: f.counters.clone(),
                    limit: f.limits.current_limit(),
                    limiter_nacks: f.limits.nack(),
                })
                .collect();
            let fib = s
                .forwarder()
                .fib()
                .iter()
                .map(|e| FibSummary {
                    prefix: e.prefix().to_string(),
                    faces: e
                        .faces_ranked()
                        .map(|m| FibFaceSummary {
                            face: m.face().0,
                            status: format!("{:?}", m.status()),
                            routing_cost: m.routing_cost(),
                            routes: m.routes().len(),
                            fraction: m.fraction(),
                            srtt_ms: m.srtt().map(|s| s * 1e3),
                        })
                        .collect(),
                })
                .collect();
            let fw = s.forwarder();
            servers.push(ServerSummary {
                name: s.name().to_string(),
                forwarder: fw.stats().clone(),
                pit_entries: fw.pit().len(),
                cs_entries: fw.content_store().len(),
                cs_hits: fw.content_store().hits(),
                faces,
                fib,
            });
        }

        let node_name = |id| net.node(id).map_or("?", |n| n.name()).to_string();
        let links = net
            .links()
            .iter()
            .map(|l| LinkSummary {
                from: node_name(l.from),
                to: node_name(l.to),
                tx_pkts: l.tx_pkts,
                tx_bytes: l.tx_bytes,
                peak_queue_bytes: l.queue.peak_bytes(),
                drops: l.queue.drops(),
            })
            .collect();

        Self {
            scenario,
            sim_time_s: sim.now().as_secs_f64(),
            events: sim.executed_events(),
            network: net.stats.clone(),
            consumers,
            producers,
            servers,
            links,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
