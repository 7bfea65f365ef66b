use crate::ndn::{LimitsConfig, LimitsDeltaRate};
use crate::sim::SimTime;

fn limiter(rate: f64) -> LimitsDeltaRate {
    let mut l = LimitsDeltaRate::new(SimTime::from_secs(1));
    l.set_limits(rate, SimTime::from_millis(200));
    l
}

#[test]
fn disabled_limiter_never_blocks() {
    let mut l = LimitsDeltaRate::default();
    assert!(!l.is_enabled());
    for _ in 0..10 {
        assert!(l.is_below_limit());
        l.borrow_limit();
    }
    assert_eq!(l.current_counter(), 0.0);
}

#[test]
fn bucket_never_exceeds_max_and_resets_each_period() {
    let mut l = limiter(5.0);
    assert_eq!(l.current_limit(), 5.0);
    for period in 0..3 {
        let mut borrowed = 0;
        for _ in 0..20 {
            if l.is_below_limit() {
                l.borrow_limit();
                borrowed += 1;
            }
            assert!(l.current_counter() <= l.current_limit());
        }
        assert_eq!(borrowed, 5, "period {period}");
        assert!(!l.is_below_limit());
        assert_eq!(l.available_interest_increment(), 0.0);

        l.update_bucket();
        assert_eq!(l.current_counter(), 0.0);
        assert_eq!(l.previous_counter(), 5.0);
    }
}

#[test]
#[should_panic(expected = "borrow_limit without headroom")]
fn borrowing_past_the_limit_panics() {
    let mut l = limiter(1.0);
    l.borrow_limit();
    l.borrow_limit();
}

#[test]
fn fractional_headroom_does_not_admit_an_interest() {
    let mut l = LimitsDeltaRate::new(SimTime::from_millis(100));
    l.set_limits(15.0, SimTime::from_millis(200));
    // 15/s * 0.1s = 1.5
    assert!(l.is_below_limit());
    l.borrow_limit();
    assert!(!l.is_below_limit());
    assert!((l.available_interest_increment() - 0.5).abs() < 1e-9);
}

#[test]
fn update_current_limit_rescales_bucket() {
    let mut l = limiter(100.0);
    l.update_current_limit(2.0);
    assert_eq!(l.current_limit(), 2.0);
    assert_eq!(l.max_rate(), 100.0);
    l.borrow_limit();
    l.increase_nack();
    l.increase_nack();
    assert_eq!(l.nack(), 2.0);
    assert_eq!(l.available_interest_increment(), 1.0);
}

#[test]
fn max_rate_follows_link_bandwidth() {
    let cfg = LimitsConfig::default();
    // 10 Mbps / 8 / (40 + 1100)
    let rate = cfg.max_rate_for(10_000_000);
    assert!((rate - 1_250_000.0 / 1140.0).abs() < 1e-9);
    assert_eq!(cfg.avg_rtt, SimTime::from_millis(200));
}

#[test]
fn returning_a_token_does_not_refill_the_bucket() {
    let mut l = limiter(5.0);
    l.borrow_limit();
    l.borrow_limit();
    assert_eq!(l.current_counter(), 2.0);
    l.return_limit();
    assert_eq!(l.current_counter(), 2.0);
    assert_eq!(l.available_interest_increment(), 3.0);
}
