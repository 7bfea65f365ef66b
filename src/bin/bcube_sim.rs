//! BCube 上的 NDN 拥塞控制仿真
//!
//! 默认运行内置的 BCube(2,1) 双路径场景：S00 上的 consumer 请求 S11 的 `/prefix11`。

use clap::Parser;
use ndncc_rs::error::NdnError;
use ndncc_rs::net::NetWorld;
use ndncc_rs::report::SimReport;
use ndncc_rs::sim::{ScenarioSpec, SimTime, Simulator};
use ndncc_rs::topo::scenario::build_scenario;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bcube-sim", about = "BCube 拓扑上的 NDN 转发与拥塞控制仿真")]
struct Args {
    /// 场景 JSON；缺省使用内置双路径场景
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// 仿真运行到多少毫秒（覆盖场景中的 until_ms）
    #[arg(long)]
    until_ms: Option<u64>,

    /// 运行报告输出路径
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// 关闭 NACK
    #[arg(long)]
    no_nacks: bool,

    /// 关闭每接口令牌桶限速
    #[arg(long)]
    no_limits: bool,
}

fn main() -> Result<(), NdnError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut spec = match &args.scenario {
        Some(path) => ScenarioSpec::from_json(&fs::read_to_string(path)?)?,
        None => ScenarioSpec::two_path(),
    };
    if args.no_nacks {
        spec.forwarding.enable_nacks = Some(false);
    }
    if args.no_limits {
        spec.limits.enabled = Some(false);
    }

    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let scenario = build_scenario(&mut world, &spec)?;
    let until = args.until_ms.map_or(scenario.until, SimTime::from_millis);

    world.net.start(&mut sim);
    sim.run_until(until, &mut world);
    world.net.stop(&mut sim);

    let report = SimReport::collect(&world.net, &sim, spec.name.clone());
    for c in &report.consumers {
        println!(
            "consumer {} {} interests={} data={} nacks={} extra_nacks={} final_limit={:.3}",
            c.server,
            c.prefix,
            c.totals.interests,
            c.totals.data,
            c.totals.nacks,
            c.totals.extra_nacks,
            c.final_limit
        );
    }
    for p in &report.producers {
        println!("producer {} {} served={}", p.server, p.prefix, p.served);
    }
    println!(
        "network tx_pkts={} queue_drops={} ce_marks={} malformed={}",
        report.network.tx_pkts,
        report.network.queue_drops,
        report.network.ce_marks,
        report.network.malformed
    );

    if let Some(path) = &args.report_json {
        fs::write(path, report.to_json_pretty()?)?;
        eprintln!("wrote report to {}", path.display());
    }
    Ok(())
}
