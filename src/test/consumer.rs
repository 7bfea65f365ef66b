use crate::app::{Consumer, ConsumerAction, ConsumerConfig, Producer, ProducerConfig};
use crate::ndn::{CongestionMark, Data, INTRA_SHARING_FULL, Interest, NackCode, Name};
use crate::sim::SimTime;
use bytes::Bytes;

fn name(s: &str) -> Name {
    Name::parse(s).unwrap()
}

fn consumer() -> Consumer {
    let mut c = Consumer::new(ConsumerConfig {
        prefix: name("/prefix11"),
        ..ConsumerConfig::default()
    });
    c.start();
    c
}

fn data(seq: u32) -> Data {
    Data::new(name("/prefix11").with_seq(seq), Bytes::new())
}

fn nack(seq: u32, intra: u32) -> Interest {
    Interest::new(name("/prefix11").with_seq(seq), 1).to_nack(NackCode::GiveupPit, intra)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn data_increases_limit_additively() {
    let mut c = consumer();
    assert_eq!(c.limit(), 10.0);
    assert_eq!(c.on_data(&data(0)), ConsumerAction::None);
    assert!(approx(c.limit(), 12.0));
    assert_eq!(c.alpha(), 20.0);

    c.on_data(&data(1));
    assert!(approx(c.limit(), 12.0 + 20.0 / 12.0));
    assert_eq!(c.totals().data, 2);
}

#[test]
fn full_nack_subtracts_beta_and_respects_floor() {
    let mut c = consumer();
    c.on_data(&data(0));
    c.on_nack(&nack(1, INTRA_SHARING_FULL));
    assert!(approx(c.limit(), 10.9));
    assert_eq!(c.alpha(), 20.0);

    c.on_nack(&nack(2, 100));
    assert_eq!(c.limit(), 10.0);
    assert_eq!(c.totals().nacks, 2);
}

#[test]
fn shared_nack_scales_decrease_and_alpha() {
    let mut c = consumer();
    c.on_data(&data(0));
    c.on_nack(&nack(1, 50));
    assert!(approx(c.limit(), 12.0 - 0.55));
    assert!(approx(c.alpha(), 19.5));
    assert_eq!(c.totals().extra_nacks, 1);
    assert_eq!(c.totals().nacks, 0);
}

#[test]
fn alpha_never_drops_below_one() {
    let mut c = consumer();
    for seq in 0..40 {
        c.on_nack(&nack(seq, 99));
    }
    assert_eq!(c.alpha(), 1.0);
    assert_eq!(c.limit(), 10.0);
}

#[test]
fn unrelated_nacks_are_ignored() {
    let mut c = consumer();
    let foreign = Interest::new(name("/prefix01/3"), 1).to_nack(NackCode::GiveupPit, 120);
    c.on_nack(&foreign);
    assert_eq!(c.totals().foreign_nacks, 1);

    let looped = Interest::new(name("/prefix11/3"), 1).to_nack(NackCode::Loop, 120);
    c.on_nack(&looped);
    assert_eq!(c.limit(), 10.0);
    assert_eq!(c.totals().nacks, 0);
}

#[test]
fn local_hit_requests_immediate_send_without_rate_change() {
    let mut c = consumer();
    let hit = Data {
        ce: CongestionMark::LocalHit,
        ..data(4)
    };
    assert_eq!(c.on_data(&hit), ConsumerAction::SendNow);
    assert_eq!(c.limit(), 10.0);
    assert_eq!(c.totals().local_hits, 1);

    assert_eq!(c.on_data(&Data::new(name("/elsewhere/1"), Bytes::new())), ConsumerAction::None);
    assert_eq!(c.totals().data, 1);
}

#[test]
fn interests_follow_sequence_until_max_seq() {
    let mut c = Consumer::new(ConsumerConfig {
        prefix: name("/p"),
        max_seq: 2,
        lifetime: SimTime::from_millis(500),
        ..ConsumerConfig::default()
    });
    assert!(c.next_interest().is_none());
    c.start();

    let seqs: Vec<u32> = std::iter::from_fn(|| c.next_interest())
        .map(|i| {
            assert_eq!(i.lifetime, SimTime::from_millis(500));
            i.seq().unwrap()
        })
        .collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    assert_eq!(c.totals().interests, 3);

    c.stop();
    assert!(!c.is_active());
}

#[test]
fn nonces_are_reproducible_per_seed() {
    let nonces = |seed| {
        let mut c = Consumer::new(ConsumerConfig {
            prefix: name("/p"),
            seed,
            ..ConsumerConfig::default()
        });
        c.start();
        (0..5)
            .map(|_| c.next_interest().unwrap().nonce)
            .collect::<Vec<_>>()
    };
    assert_eq!(nonces(7), nonces(7));
    assert_ne!(nonces(7), nonces(8));
}

#[test]
fn report_snapshots_and_resets_interval_counters() {
    let mut c = consumer();
    c.next_interest();
    c.next_interest();
    c.on_data(&data(0));
    c.on_nack(&nack(1, 40));

    let s = c.report(SimTime::from_secs(1));
    assert_eq!(s.time_s, 1.0);
    assert_eq!((s.interests, s.data, s.nacks, s.extra_nacks), (2, 1, 0, 1));
    assert_eq!(s.limit, c.limit());

    let s = c.report(SimTime::from_secs(2));
    assert_eq!((s.interests, s.data, s.nacks, s.extra_nacks), (0, 0, 0, 0));
    assert_eq!(c.samples().len(), 2);
    assert_eq!(c.totals().interests, 2);
}

#[test]
fn send_interval_is_inverse_of_limit() {
    let c = consumer();
    assert_eq!(c.send_interval(), SimTime::from_millis(100));
}

#[test]
fn producer_answers_only_its_prefix() {
    let mut p = Producer::new(ProducerConfig {
        prefix: name("/prefix11"),
        payload_bytes: 64,
    });
    let d = p.on_interest(&Interest::new(name("/prefix11/9"), 3)).unwrap();
    assert_eq!(d.name, name("/prefix11/9"));
    assert_eq!(d.payload.len(), 64);
    assert_eq!(d.ce, CongestionMark::NotMarked);
    assert!(p.on_interest(&Interest::new(name("/other/9"), 3)).is_none());
    assert_eq!(p.served(), 1);
}
