//! 内容缓存（LRU）
//!
//! 容量为 0 时不缓存任何内容。每次访问给条目打一个递增戳，
//! `order` 按戳排序，最旧的戳即淘汰对象。

use super::name::Name;
use super::packet::Data;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct ContentStore {
    capacity: usize,
    items: HashMap<Name, (Data, u64)>,
    order: BTreeMap<u64, Name>,
    next_stamp: u64,
    hits: u64,
    misses: u64,
}

impl ContentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn stamp(&mut self) -> u64 {
        let s = self.next_stamp;
        self.next_stamp += 1;
        s
    }

    pub fn lookup(&mut self, name: &Name) -> Option<Data> {
        let fresh = self.stamp();
        match self.items.get_mut(name) {
            Some((data, stamp)) => {
                self.hits += 1;
                if let Some(n) = self.order.remove(stamp) {
                    self.order.insert(fresh, n);
                }
                *stamp = fresh;
                Some(data.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// 返回 true 表示新增了一项
    pub fn add(&mut self, data: Data) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let fresh = self.stamp();
        if let Some((old, stamp)) = self.items.get_mut(&data.name) {
            if let Some(n) = self.order.remove(stamp) {
                self.order.insert(fresh, n);
            }
            *stamp = fresh;
            *old = data;
            return false;
        }
        while self.items.len() >= self.capacity {
            match self.order.pop_first() {
                Some((_, oldest)) => {
                    self.items.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.insert(fresh, data.name.clone());
        self.items.insert(data.name.clone(), (data, fresh));
        true
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
