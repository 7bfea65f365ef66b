use crate::ndn::{FaceId, Name, Pit, PitConfig};
use crate::sim::SimTime;

fn name(s: &str) -> Name {
    Name::parse(s).unwrap()
}

fn pit() -> Pit {
    Pit::new(PitConfig::default())
}

#[test]
fn nonces_and_incoming_records_are_deduplicated() {
    let mut pit = pit();
    let n = name("/prefix11/7");
    let e = pit
        .create(&n, &name("/prefix11"), SimTime::ZERO, SimTime::from_secs(2))
        .unwrap();

    assert!(!e.is_nonce_seen(42));
    assert!(e.add_seen_nonce(42));
    assert!(!e.add_seen_nonce(42));
    assert!(e.is_nonce_seen(42));

    assert!(e.add_incoming(FaceId(0), 1, SimTime::ZERO));
    assert!(!e.add_incoming(FaceId(0), 1, SimTime::from_millis(5)));
    // 同一接口不同端口算另一个请求方
    assert!(e.add_incoming(FaceId(0), 0, SimTime::ZERO));
    assert_eq!(e.incoming().len(), 2);

    e.remove_incoming(FaceId(0));
    assert!(e.incoming().is_empty());
    assert_eq!(e.fib_prefix(), &name("/prefix11"));
}

#[test]
fn second_send_on_same_face_counts_as_retransmission() {
    let mut pit = pit();
    let n = name("/p/1");
    let e = pit
        .create(&n, &name("/p"), SimTime::ZERO, SimTime::from_secs(2))
        .unwrap();

    assert_eq!(e.add_outgoing(FaceId(1), SimTime::ZERO).retx_count, 0);
    e.set_waiting_in_vain(FaceId(1));
    let o = *e.add_outgoing(FaceId(1), SimTime::from_millis(10));
    assert_eq!(o.retx_count, 1);
    assert_eq!(o.send_time, SimTime::from_millis(10));
    assert!(!o.waiting_in_vain);
    assert_eq!(e.outgoing().len(), 1);
}

#[test]
fn all_outgoing_in_vain_tracks_every_face() {
    let mut pit = pit();
    let n = name("/p/2");
    let e = pit
        .create(&n, &name("/p"), SimTime::ZERO, SimTime::from_secs(2))
        .unwrap();
    assert!(e.are_all_outgoing_in_vain());

    e.add_outgoing(FaceId(1), SimTime::ZERO);
    e.add_outgoing(FaceId(2), SimTime::ZERO);
    e.set_waiting_in_vain(FaceId(1));
    assert!(!e.are_all_outgoing_in_vain());
    e.set_waiting_in_vain(FaceId(2));
    assert!(e.are_all_outgoing_in_vain());
}

#[test]
fn retx_allowance_grows_at_most_once_per_100ms() {
    let mut pit = pit();
    let n = name("/p/3");
    let e = pit
        .create(&n, &name("/p"), SimTime::ZERO, SimTime::from_secs(2))
        .unwrap();
    assert_eq!(e.max_retx_count(), 0);

    e.increase_allowed_retx_count(SimTime::from_millis(10));
    assert_eq!(e.max_retx_count(), 1);
    e.increase_allowed_retx_count(SimTime::from_millis(60));
    assert_eq!(e.max_retx_count(), 1);
    e.increase_allowed_retx_count(SimTime::from_millis(110));
    assert_eq!(e.max_retx_count(), 2);
}

#[test]
fn create_returns_existing_entry_and_respects_max_size() {
    let mut pit = Pit::new(PitConfig {
        max_size: 1,
        ..PitConfig::default()
    });
    let lifetime = SimTime::from_secs(1);
    pit.create(&name("/p/1"), &name("/p"), SimTime::ZERO, lifetime)
        .unwrap()
        .add_seen_nonce(9);
    assert!(pit.create(&name("/p/2"), &name("/p"), SimTime::ZERO, lifetime).is_none());
    assert_eq!(pit.len(), 1);
    assert!(pit.lookup(&name("/p/1")).unwrap().is_nonce_seen(9));
}

#[test]
fn erased_entries_stay_visible_until_grace_expires() {
    let mut pit = pit();
    let n = name("/p/4");
    pit.create(&n, &name("/p"), SimTime::ZERO, SimTime::from_secs(2));
    pit.mark_erased(&n, SimTime::from_millis(20));

    assert!(pit.lookup(&n).is_some_and(|e| e.is_erased()));
    assert!(pit.lookup_pending_mut(&n).is_none());

    let early = pit.cleanup(SimTime::from_millis(100));
    assert_eq!(early.reaped, 0);
    assert_eq!(pit.len(), 1);

    let late = pit.cleanup(SimTime::from_millis(120));
    assert_eq!(late.reaped, 1);
    assert!(pit.is_empty());
}

#[test]
fn update_lifetime_revives_soft_deleted_entry() {
    let mut pit = pit();
    let n = name("/p/5");
    pit.create(&n, &name("/p"), SimTime::ZERO, SimTime::from_millis(100));
    pit.mark_erased(&n, SimTime::from_millis(10));

    let e = pit.lookup_mut(&n).unwrap();
    e.update_lifetime(SimTime::from_millis(50), SimTime::from_millis(100));
    assert!(!e.is_erased());
    assert_eq!(e.expire_at(), SimTime::from_millis(150));
}

#[test]
fn unsatisfied_entries_time_out() {
    let mut pit = pit();
    pit.create(&name("/p/6"), &name("/p"), SimTime::ZERO, SimTime::from_millis(100));
    pit.create(&name("/p/7"), &name("/p"), SimTime::ZERO, SimTime::from_secs(1));

    let out = pit.cleanup(SimTime::from_millis(100));
    assert_eq!(out.timed_out, 1);
    assert_eq!(out.reaped, 0);
    assert!(pit.lookup(&name("/p/6")).is_none());
    assert!(pit.lookup(&name("/p/7")).is_some());
}
