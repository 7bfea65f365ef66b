use crate::ndn::{ContentStore, Data, Name};
use bytes::Bytes;

fn data(seq: u32) -> Data {
    Data::new(Name::parse("/prefix11").unwrap().with_seq(seq), Bytes::new())
}

fn name(seq: u32) -> Name {
    data(seq).name
}

#[test]
fn zero_capacity_caches_nothing() {
    let mut cs = ContentStore::new(0);
    assert!(!cs.add(data(1)));
    assert!(cs.is_empty());
    assert!(cs.lookup(&name(1)).is_none());
    assert_eq!(cs.misses(), 1);
}

#[test]
fn least_recently_used_is_evicted_first() {
    let mut cs = ContentStore::new(3);
    for seq in 1..=3 {
        assert!(cs.add(data(seq)));
    }
    // 命中后 1 变为最近使用，2 成为最旧
    assert!(cs.lookup(&name(1)).is_some());
    assert!(cs.add(data(4)));
    assert_eq!(cs.len(), 3);
    assert!(!cs.contains(&name(2)));
    assert!(cs.contains(&name(1)));

    // 重复加入也刷新顺序，此时 3 最旧
    assert!(!cs.add(data(1)));
    assert!(cs.add(data(5)));
    assert!(!cs.contains(&name(3)));
    assert!(cs.contains(&name(1)));
    assert!(cs.contains(&name(4)));
    assert!(cs.contains(&name(5)));

    assert_eq!(cs.hits(), 1);
    assert_eq!(cs.misses(), 0);
}
