//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。
//!
//! 所有周期性任务（令牌桶重置、FIB 比例重平衡、consumer 统计上报、PIT 清扫）
//! 都是自我重调度的事件：调度时返回 [`EventId`]，由拥有该任务的实体保存，
//! 实体停止时通过 [`Simulator::cancel`] 撤销。

use super::event::{Event, World};
use super::time::SimTime;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, trace};

/// 已调度事件的句柄，可用于撤销。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

struct Pending {
    at: SimTime,
    id: EventId,
    ev: Box<dyn Event>,
}

// BinaryHeap 是 max-heap；需要最小时间优先，同一时刻按调度顺序执行，因此反向比较。
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.id.cmp(&other.id))
            .reverse()
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pending {}

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_id: u64,
    q: BinaryHeap<Pending>,
    /// 仍在队列中且未被撤销的事件
    live: HashSet<EventId>,
    executed: u64,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 调度事件在指定时间执行；早于当前时间的请求按当前时间处理。
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) -> EventId {
        let id = EventId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let at = at.max(self.now);
        trace!(
            now = ?self.now,
            schedule_at = ?at,
            event_type = std::any::type_name::<E>(),
            seq = id.0,
            "调度事件"
        );
        self.q.push(Pending {
            at,
            id,
            ev: Box::new(ev),
        });
        self.live.insert(id);
        id
    }

    /// 调度事件在 `delay` 之后执行
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) -> EventId {
        self.schedule(self.now.saturating_add(delay), ev)
    }

    /// 撤销尚未执行的事件。返回 false 表示事件已执行或已被撤销。
    pub fn cancel(&mut self, id: EventId) -> bool {
        let removed = self.live.remove(&id);
        if removed {
            trace!(seq = id.0, "撤销事件");
        }
        removed
    }

    /// 事件是否仍在等待执行
    pub fn is_pending(&self, id: EventId) -> bool {
        self.live.contains(&id)
    }

    /// 等待执行的事件数（不含已撤销的）
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// 已执行的事件总数
    pub fn executed_events(&self) -> u64 {
        self.executed
    }

    fn pop_live(&mut self, until: Option<SimTime>) -> Option<Pending> {
        loop {
            let top = self.q.peek()?;
            if until.is_some_and(|u| top.at > u) {
                return None;
            }
            let item = self.q.pop()?;
            if self.live.remove(&item.id) {
                return Some(item);
            }
        }
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        debug!(now = ?self.now, until = ?until, pending = self.live.len(), "运行到指定时间");
        while let Some(item) = self.pop_live(Some(until)) {
            self.now = item.at;
            self.executed += 1;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    ///
    /// 周期任务会无限自我重调度，存在周期任务时应使用 [`Simulator::run_until`]。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        let start = self.executed;
        while let Some(item) = self.pop_live(None) {
            self.now = item.at;
            self.executed += 1;
            trace!(now = ?self.now, seq = item.id.0, remaining = self.live.len(), "执行事件");
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        info!(
            total_events = self.executed - start,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }
}
