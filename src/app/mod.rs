//! 本地应用
//!
//! 服务器上的应用通过应用接口与转发器交互：consumer（AIMD 限速请求方）
//! 与 producer（按前缀回 Data）。

mod consumer;
mod events;
mod producer;

pub use consumer::{Consumer, ConsumerAction, ConsumerConfig, ConsumerTotals, LimitSample};
pub use events::{DeliverToApp, SendInterest, ShowInterestLimit, StartConsumer, StopConsumer};
pub use producer::{Producer, ProducerConfig};

use crate::ndn::Name;

#[derive(Debug)]
pub enum App {
    Consumer(Consumer),
    Producer(Producer),
}

impl App {
    pub fn prefix(&self) -> &Name {
        match self {
            App::Consumer(c) => c.prefix(),
            App::Producer(p) => p.prefix(),
        }
    }

    pub fn as_consumer(&self) -> Option<&Consumer> {
        match self {
            App::Consumer(c) => Some(c),
            App::Producer(_) => None,
        }
    }

    pub fn as_consumer_mut(&mut self) -> Option<&mut Consumer> {
        match self {
            App::Consumer(c) => Some(c),
            App::Producer(_) => None,
        }
    }

    pub fn as_producer(&self) -> Option<&Producer> {
        match self {
            App::Producer(p) => Some(p),
            App::Consumer(_) => None,
        }
    }
}
