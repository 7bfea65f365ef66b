//! Producer：对前缀下的每个 Interest 回固定大小的 Data

use crate::ndn::{Data, Interest, Name};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerConfig {
    pub prefix: Name,
    pub payload_bytes: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            prefix: Name::root(),
            payload_bytes: 1024,
        }
    }
}

#[derive(Debug)]
pub struct Producer {
    cfg: ProducerConfig,
    payload: Bytes,
    served: u64,
}

impl Producer {
    pub fn new(cfg: ProducerConfig) -> Self {
        Self {
            payload: Bytes::from(vec![0u8; cfg.payload_bytes]),
            served: 0,
            cfg,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.cfg.prefix
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn on_interest(&mut self, interest: &Interest) -> Option<Data> {
        if interest.is_nack() || !self.cfg.prefix.is_prefix_of(&interest.name) {
            return None;
        }
        self.served += 1;
        Some(Data::new(interest.name.clone(), self.payload.clone()))
    }
}
