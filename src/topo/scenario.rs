//! 把 JSON 场景装配到 BCube 拓扑上

use super::bcube::{BCubeOpts, BCubeTopology, build_bcube, install_consumer, install_producer};
use crate::error::NdnError;
use crate::ndn::AppId;
use crate::net::{NetWorld, NodeId};
use crate::queue::mem_from_pkt;
use crate::sim::{ScenarioSpec, SimTime, TopologySpec};
use tracing::info;

/// 未指定时长时的默认仿真时间
pub const DEFAULT_UNTIL: SimTime = SimTime::from_secs(5);

#[derive(Debug, Clone)]
pub struct Scenario {
    pub topo: BCubeTopology,
    pub producers: Vec<(NodeId, AppId)>,
    pub consumers: Vec<(NodeId, AppId)>,
    pub until: SimTime,
}

pub fn bcube_opts(spec: &ScenarioSpec) -> BCubeOpts {
    let d = BCubeOpts::default();
    let TopologySpec::Bcube {
        n,
        k,
        link_mbps,
        link_latency_us,
        queue_pkts,
        ecn_threshold_pkts,
    } = spec.topology;
    BCubeOpts {
        n,
        k,
        link_bps: link_mbps.map_or(d.link_bps, |m| m.saturating_mul(1_000_000)),
        link_latency: link_latency_us.map_or(d.link_latency, SimTime::from_micros),
        queue_bytes: queue_pkts.map_or(d.queue_bytes, mem_from_pkt),
        ecn_threshold_bytes: ecn_threshold_pkts.map(mem_from_pkt),
        forwarding: spec.forwarding.to_config(),
        limits: spec.limits.to_config(),
    }
}

/// 构建拓扑并安装全部应用；调用方随后 `Network::start` 并运行仿真
pub fn build_scenario(world: &mut NetWorld, spec: &ScenarioSpec) -> Result<Scenario, NdnError> {
    let topo = build_bcube(world, &bcube_opts(spec))?;

    let mut producers = Vec::with_capacity(spec.producers.len());
    for p in &spec.producers {
        let server = topo.server_named(&p.server)?;
        let app = install_producer(world, &topo, server, p.to_config()?)?;
        producers.push((server, app));
    }
    let mut consumers = Vec::with_capacity(spec.consumers.len());
    for (i, c) in spec.consumers.iter().enumerate() {
        let server = topo.server_named(&c.server)?;
        let app = install_consumer(world, server, c.to_config(i)?)?;
        consumers.push((server, app));
    }
    info!(
        scenario = spec.name.as_deref().unwrap_or("-"),
        producers = producers.len(),
        consumers = consumers.len(),
        "场景装配完成"
    );
    Ok(Scenario {
        topo,
        producers,
        consumers,
        until: spec.until_ms.map_or(DEFAULT_UNTIL, SimTime::from_millis),
    })
}
