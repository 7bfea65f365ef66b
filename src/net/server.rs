//! BCube 服务器节点
//!
//! 服务器持有完整的 NDN 协议栈：接口表、转发器和本地应用。
//! 第 `l` 层交换机连到服务器的 `l` 号端口，网络接口先于应用接口创建，
//! 因此网络接口号与端口号一致。

use super::id::{LinkId, NodeId};
use super::network::Network;
use super::node::Node;
use super::packet::Packet;
use super::timers::{FibTick, LimitsTick, PitSweep};
use crate::app::{
    App, Consumer, ConsumerAction, DeliverToApp, SendInterest, ShowInterestLimit, StartConsumer,
    StopConsumer,
};
use crate::ndn::{
    AppId, BCubeTag, Face, FaceId, FaceKind, FaceStatus, FaceTable, Forwarder, ForwarderConfig,
    LimitsConfig, LimitsDeltaRate, Name, NdnPacket, Output, RouteLabel,
};
use crate::sim::{EventId, SimTime, Simulator};
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
pub struct Server {
    id: NodeId,
    name: String,
    address: Vec<u8>,
    faces: FaceTable,
    fw: Forwarder,
    limits: LimitsConfig,
    apps: Vec<App>,
    pit_timer: Option<EventId>,
}

impl Server {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        address: Vec<u8>,
        fw_cfg: ForwarderConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            address,
            faces: FaceTable::default(),
            fw: Forwarder::new(id, fw_cfg),
            limits,
            apps: Vec::new(),
            pit_timer: None,
        }
    }

    /// BCube 地址，`address[l]` 为第 `l` 层的数字
    pub fn address(&self) -> &[u8] {
        &self.address
    }

    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.fw
    }

    pub fn forwarder_mut(&mut self) -> &mut Forwarder {
        &mut self.fw
    }

    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    pub fn consumer(&self, app: AppId) -> Option<&Consumer> {
        self.apps.get(app.0).and_then(App::as_consumer)
    }

    /// 安装应用并为它创建应用接口
    pub fn install_app(&mut self, app: App) -> (AppId, FaceId) {
        let id = AppId(self.apps.len());
        self.apps.push(app);
        let face = self.faces.add_app_face(id);
        debug!(server = %self.name, app = id.0, ?face, "安装应用");
        (id, face)
    }

    /// 静态路由：`prefix` 经 `face` 沿 `label` 描述的路径可达
    pub fn register_route(&mut self, prefix: &Name, face: FaceId, label: RouteLabel) {
        self.fw.fib_mut().add(prefix, face, label);
    }

    /// 本地应用提供 `prefix`
    pub fn register_local_prefix(&mut self, prefix: &Name, face: FaceId) {
        self.fw.fib_mut().entry(prefix).add_local_face(face);
    }

    /// 接口上下线；下线接口的限速定时器撤销，FIB 中标为 RED
    pub fn set_face_up(&mut self, face: FaceId, up: bool, sim: &mut Simulator) {
        let node = self.id;
        let Some(f) = self.faces.get_mut(face) else {
            warn!(server = %self.name, ?face, "接口不存在");
            return;
        };
        if f.is_up() == up {
            return;
        }
        f.set_up(up);
        if up {
            if f.limits.is_enabled() {
                let t = sim.schedule_in(f.limits.reset_interval(), LimitsTick { node, face });
                f.limits.set_timer(Some(t));
            }
        } else if let Some(t) = f.limits.timer() {
            sim.cancel(t);
            f.limits.set_timer(None);
        }

        let status = if up { FaceStatus::Yellow } else { FaceStatus::Red };
        let prefixes: Vec<Name> = self.fw.fib().prefixes().cloned().collect();
        for prefix in prefixes {
            if let Some(e) = self.fw.fib_mut().find_mut(&prefix) {
                e.update_status(face, status);
            }
        }
        info!(server = %self.name, ?face, up, "接口状态变化");
    }

    /// 撤销本节点的全部周期任务
    pub fn stop(&mut self, sim: &mut Simulator) {
        for f in self.faces.iter_mut() {
            if let Some(t) = f.limits.timer() {
                sim.cancel(t);
                f.limits.set_timer(None);
            }
        }
        let prefixes: Vec<Name> = self.fw.fib().prefixes().cloned().collect();
        for prefix in prefixes {
            if let Some(e) = self.fw.fib_mut().find_mut(&prefix) {
                if let Some(t) = e.timer() {
                    sim.cancel(t);
                    e.set_timer(None);
                }
            }
        }
        if let Some(t) = self.pit_timer.take() {
            sim.cancel(t);
        }
        for app in &mut self.apps {
            if let Some(c) = app.as_consumer_mut() {
                c.stop();
                cancel_consumer_timers(c, sim);
            }
        }
    }

    #[tracing::instrument(skip_all, fields(server = %self.name, face = ?in_face, kind = header.kind()))]
    fn dispatch(
        &mut self,
        in_face: FaceId,
        header: NdnPacket,
        tag: Option<BCubeTag>,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let now = sim.now();
        match self.faces.get_mut(in_face) {
            Some(f) if f.is_up() => f.counters.record_in(&header),
            Some(_) => {
                trace!("接口已下线，丢弃");
                return;
            }
            None => {
                warn!("未知接口");
                return;
            }
        }
        match header {
            NdnPacket::Interest(interest) => {
                if let Err(e) = self.fw.on_interest(&mut self.faces, in_face, interest, tag, now) {
                    panic!("{}: {e}", self.name);
                }
            }
            NdnPacket::Data(data) => self.fw.on_data(&mut self.faces, in_face, data, now),
        }
        self.flush(sim, net);
    }

    /// 把转发器的输出交给链路或本地应用
    fn flush(&mut self, sim: &mut Simulator, net: &mut Network) {
        for out in self.fw.take_outbox() {
            let (face, packet, tag) = match out {
                Output::Send { face, packet, tag } => (face, packet, tag),
                Output::NotifyApp { face, nack } => (face, NdnPacket::Interest(nack), None),
            };
            match self.faces.get(face).map(Face::kind) {
                Some(FaceKind::Application { app }) => {
                    sim.schedule_in(
                        SimTime::ZERO,
                        DeliverToApp {
                            node: self.id,
                            app,
                            packet,
                        },
                    );
                }
                Some(FaceKind::NetworkLink { link, .. }) => {
                    let pkt = Packet {
                        id: net.next_packet_id(),
                        header: packet,
                        tag,
                    };
                    if let Err(dropped) = net.transmit(link, pkt, sim) {
                        self.fw.record_send_failure(&dropped.header);
                        if let Some(f) = self.faces.get_mut(face) {
                            f.counters.send_failures += 1;
                        }
                    }
                }
                None => warn!(?face, "输出到未知接口"),
            }
        }
    }

    pub(crate) fn on_app_packet(
        &mut self,
        app: AppId,
        packet: NdnPacket,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let Some(face) = self.faces.app_face_of(app) else {
            return;
        };
        let reply = match (self.apps.get_mut(app.0), &packet) {
            (Some(App::Producer(p)), NdnPacket::Interest(i)) => p.on_interest(i),
            (Some(App::Consumer(c)), NdnPacket::Data(d)) => {
                if c.on_data(d) == ConsumerAction::SendNow {
                    if let Some(t) = c.send_timer() {
                        sim.cancel(t);
                    }
                    let t = sim.schedule_in(SimTime::ZERO, SendInterest { node: self.id, app });
                    c.set_send_timer(Some(t));
                }
                None
            }
            (Some(App::Consumer(c)), NdnPacket::Interest(i)) if i.is_nack() => {
                c.on_nack(i);
                None
            }
            _ => {
                trace!(app = app.0, kind = packet.kind(), "应用忽略该报文");
                None
            }
        };
        if let Some(data) = reply {
            self.dispatch(face, NdnPacket::Data(data), None, sim, net);
        }
    }

    pub(crate) fn on_consumer_start(&mut self, app: AppId, sim: &mut Simulator) {
        let node = self.id;
        let Some(c) = self.apps.get_mut(app.0).and_then(App::as_consumer_mut) else {
            return;
        };
        c.start();
        cancel_consumer_timers(c, sim);
        let send = sim.schedule_in(SimTime::ZERO, SendInterest { node, app });
        c.set_send_timer(Some(send));
        let report = sim.schedule_in(c.config().limit_interval, ShowInterestLimit { node, app });
        c.set_report_timer(Some(report));
        info!(server = %self.name, app = app.0, prefix = %c.prefix(), "▶️  consumer 启动");
    }

    pub(crate) fn on_consumer_send(&mut self, app: AppId, sim: &mut Simulator, net: &mut Network) {
        let node = self.id;
        let Some(face) = self.faces.app_face_of(app) else {
            return;
        };
        let Some(c) = self.apps.get_mut(app.0).and_then(App::as_consumer_mut) else {
            return;
        };
        c.set_send_timer(None);
        let Some(interest) = c.next_interest() else {
            debug!(server = %self.name, app = app.0, "consumer 没有更多请求");
            return;
        };
        let next = sim.schedule_in(c.send_interval(), SendInterest { node, app });
        c.set_send_timer(Some(next));
        self.dispatch(face, NdnPacket::Interest(interest), None, sim, net);
    }

    pub(crate) fn on_consumer_report(&mut self, app: AppId, sim: &mut Simulator) {
        let node = self.id;
        let now = sim.now();
        let Some(c) = self.apps.get_mut(app.0).and_then(App::as_consumer_mut) else {
            return;
        };
        let s = c.report(now);
        info!(
            server = %self.name,
            app = app.0,
            time_s = s.time_s,
            limit = s.limit,
            interest = s.interests,
            data = s.data,
            nack = s.nacks,
            enack = s.extra_nacks,
            "📈 ConsumerOm"
        );
        let t = c
            .is_active()
            .then(|| sim.schedule_in(c.config().limit_interval, ShowInterestLimit { node, app }));
        c.set_report_timer(t);
    }

    pub(crate) fn on_consumer_stop(&mut self, app: AppId, sim: &mut Simulator) {
        let Some(c) = self.apps.get_mut(app.0).and_then(App::as_consumer_mut) else {
            return;
        };
        c.stop();
        cancel_consumer_timers(c, sim);
        info!(server = %self.name, app = app.0, "⏹️  consumer 停止");
    }

    pub(crate) fn on_limits_tick(&mut self, face: FaceId, sim: &mut Simulator) {
        let node = self.id;
        let Some(f) = self.faces.get_mut(face) else {
            return;
        };
        f.limits.update_bucket();
        let t = f
            .is_up()
            .then(|| sim.schedule_in(f.limits.reset_interval(), LimitsTick { node, face }));
        f.limits.set_timer(t);
    }

    pub(crate) fn on_fib_tick(&mut self, prefix: &Name, sim: &mut Simulator) {
        let node = self.id;
        let interval = self.fw.config().fib.update_interval;
        let Some(step) = self.fw.rebalance(prefix) else {
            return;
        };
        if let Some(e) = self.fw.fib_mut().find_mut(prefix) {
            let fractions: Vec<(u32, f64)> = e
                .faces_ranked()
                .map(|m| (m.face().0, m.fraction()))
                .collect();
            debug!(
                server = %self.name,
                %prefix,
                data = step.data,
                ?fractions,
                "📊 ShowRate"
            );
            let t = sim.schedule_in(
                interval,
                FibTick {
                    node,
                    prefix: prefix.clone(),
                },
            );
            e.set_timer(Some(t));
        }
    }

    pub(crate) fn on_pit_sweep(&mut self, sim: &mut Simulator) {
        let out = self.fw.sweep_pit(sim.now());
        if out.reaped > 0 || out.timed_out > 0 {
            trace!(server = %self.name, reaped = out.reaped, timed_out = out.timed_out, "PIT 清扫");
        }
        let interval = self.fw.pit().config().sweep_interval;
        self.pit_timer = Some(sim.schedule_in(interval, PitSweep { node: self.id }));
    }
}

fn cancel_consumer_timers(c: &mut Consumer, sim: &mut Simulator) {
    if let Some(t) = c.send_timer() {
        sim.cancel(t);
    }
    if let Some(t) = c.report_timer() {
        sim.cancel(t);
    }
    c.set_send_timer(None);
    c.set_report_timer(None);
}

impl Node for Server {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// 网络接口按连接顺序编号；开启限速时按链路带宽推导每接口速率
    fn add_port(&mut self, link: LinkId, bandwidth_bps: u64) -> FaceId {
        let face = self.faces.add_link_face(link);
        if self.limits.enabled {
            if let Some(f) = self.faces.get_mut(face) {
                let mut limits = LimitsDeltaRate::new(self.limits.reset_interval);
                limits.set_limits(self.limits.max_rate_for(bandwidth_bps), self.limits.avg_rtt);
                f.limits = limits;
            }
        }
        face
    }

    fn start(&mut self, sim: &mut Simulator) {
        let node = self.id;
        for f in self.faces.iter_mut() {
            if f.limits.is_enabled() && f.is_up() {
                let face = f.id();
                let t = sim.schedule_in(f.limits.reset_interval(), LimitsTick { node, face });
                f.limits.set_timer(Some(t));
            }
        }

        let first = self.fw.config().fib.first_update;
        let prefixes: Vec<Name> = self.fw.fib().prefixes().cloned().collect();
        for prefix in prefixes {
            let t = sim.schedule_in(
                first,
                FibTick {
                    node,
                    prefix: prefix.clone(),
                },
            );
            if let Some(e) = self.fw.fib_mut().find_mut(&prefix) {
                e.set_timer(Some(t));
            }
        }

        let sweep = self.fw.pit().config().sweep_interval;
        self.pit_timer = Some(sim.schedule_in(sweep, PitSweep { node }));

        for (i, app) in self.apps.iter().enumerate() {
            let Some(c) = app.as_consumer() else {
                continue;
            };
            let app = AppId(i);
            sim.schedule(c.config().start, StartConsumer { node, app });
            if let Some(stop) = c.config().stop {
                sim.schedule(stop, StopConsumer { node, app });
            }
        }
        debug!(server = %self.name, faces = self.faces.len(), apps = self.apps.len(), "服务器启动");
    }

    fn on_packet(&mut self, in_face: FaceId, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        let Packet { header, tag, .. } = pkt;
        self.dispatch(in_face, header, tag, sim, net);
    }

    fn as_server(&self) -> Option<&Server> {
        Some(self)
    }

    fn as_server_mut(&mut self) -> Option<&mut Server> {
        Some(self)
    }
}
