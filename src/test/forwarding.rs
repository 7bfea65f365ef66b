use crate::error::NdnError;
use crate::ndn::{
    AppId, BCubeTag, CongestionMark, Data, FaceId, FaceTable, Forwarder, ForwarderConfig,
    INTRA_SHARING_FULL, Interest, NackCode, Name, NdnPacket, Output, RouteLabel, StrategyKind,
};
use crate::net::{LinkId, NodeId};
use crate::sim::SimTime;
use bytes::Bytes;

const CONSUMER: FaceId = FaceId(0);
const PORT0: FaceId = FaceId(1);
const PORT1: FaceId = FaceId(2);

fn prefix() -> Name {
    Name::parse("/prefix11").unwrap()
}

fn label(permutation: u32, hop: u8, prev_hop: u8, next_hop: u8) -> RouteLabel {
    RouteLabel {
        permutation,
        hop,
        prev_hop,
        next_hop,
    }
}

/// S00 上的视角：一个消费者，两条经不同层交换机去往 S11 的路径
fn source_node(cfg: ForwarderConfig) -> (Forwarder, FaceTable) {
    let mut faces = FaceTable::default();
    assert_eq!(faces.add_app_face(AppId(0)), CONSUMER);
    assert_eq!(faces.add_link_face(LinkId(0)), PORT0);
    assert_eq!(faces.add_link_face(LinkId(1)), PORT1);

    let mut fw = Forwarder::new(NodeId(0), cfg);
    fw.fib_mut().add(&prefix(), PORT0, label(21, 0, 0, 1));
    fw.fib_mut().add(&prefix(), PORT1, label(12, 0, 0, 1));
    fw.rebalance(&prefix());
    (fw, faces)
}

/// 中间节点：Interest 从 0 号口进来，沿置换 21 的第 1 跳从 1 号口出去
fn relay_node() -> (Forwarder, FaceTable) {
    let mut faces = FaceTable::default();
    faces.add_link_face(LinkId(0));
    faces.add_link_face(LinkId(1));
    let mut fw = Forwarder::new(NodeId(1), ForwarderConfig::default());
    fw.fib_mut().add(&prefix(), FaceId(0), label(12, 1, 0, 1));
    fw.fib_mut().add(&prefix(), FaceId(1), label(21, 1, 1, 1));
    (fw, faces)
}

fn interest(seq: u32) -> Interest {
    Interest::new(prefix().with_seq(seq), seq)
}

fn sent_faces(out: &[Output]) -> Vec<FaceId> {
    out.iter()
        .filter_map(|o| match o {
            Output::Send { face, .. } => Some(*face),
            Output::NotifyApp { .. } => None,
        })
        .collect()
}

#[test]
fn source_splits_sequences_by_fraction() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    let mut per_face = [0u32; 3];
    for seq in 0..1000 {
        fw.on_interest(&mut faces, CONSUMER, interest(seq), None, SimTime::ZERO)
            .unwrap();
        for face in sent_faces(&fw.take_outbox()) {
            per_face[face.0 as usize] += 1;
        }
    }
    assert_eq!(per_face, [0, 510, 490]);
    assert_eq!(fw.stats().out_interests, 1000);
    assert_eq!(fw.pit().len(), 1000);
}

#[test]
fn source_writes_route_into_interest_tag() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    fw.on_interest(&mut faces, CONSUMER, interest(70), None, SimTime::ZERO)
        .unwrap();
    let out = fw.take_outbox();
    assert_eq!(
        out,
        vec![Output::Send {
            face: PORT1,
            packet: NdnPacket::Interest(interest(70)),
            tag: Some(BCubeTag::for_interest(12, 0, 0, 1)),
        }]
    );
    assert_eq!(faces.get(PORT1).unwrap().counters.out_interests, 1);
}

#[test]
fn relay_follows_permutation_from_tag() {
    let (mut fw, mut faces) = relay_node();
    let tag = BCubeTag::for_interest(21, 0, 0, 1);
    fw.on_interest(&mut faces, FaceId(0), interest(3), Some(tag), SimTime::ZERO)
        .unwrap();
    let out = fw.take_outbox();
    assert_eq!(
        out,
        vec![Output::Send {
            face: FaceId(1),
            packet: NdnPacket::Interest(interest(3)),
            tag: Some(BCubeTag::for_interest(21, 1, 1, 1)),
        }]
    );
    let entry = fw.pit().lookup(&interest(3).name).unwrap();
    assert_eq!(entry.incoming()[0].local_port, 0);
    assert_eq!(entry.route_tag(), Some(tag));
}

#[test]
fn relay_rejects_unknown_permutation() {
    let (mut fw, mut faces) = relay_node();
    let tag = BCubeTag::for_interest(321, 0, 0, 1);
    let err = fw
        .on_interest(&mut faces, FaceId(0), interest(1), Some(tag), SimTime::ZERO)
        .unwrap_err();
    assert!(
        matches!(err, NdnError::RoutingInconsistency { permutation: 321, .. }),
        "{err}"
    );
}

#[test]
fn relay_rejects_hop_that_does_not_advance() {
    let (mut fw, mut faces) = relay_node();
    let tag = BCubeTag::for_interest(21, 1, 0, 1);
    let err = fw
        .on_interest(&mut faces, FaceId(0), interest(1), Some(tag), SimTime::ZERO)
        .unwrap_err();
    assert!(matches!(err, NdnError::RoutingLoop { hop: 1, cur: 1, .. }), "{err}");
}

#[test]
fn duplicate_nonce_is_answered_with_loop_nack() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    fw.on_interest(&mut faces, CONSUMER, interest(1), None, SimTime::ZERO)
        .unwrap();
    fw.take_outbox();

    let looped = BCubeTag::for_interest(12, 1, 1, 0);
    fw.on_interest(&mut faces, PORT1, interest(1), Some(looped), SimTime::from_millis(1))
        .unwrap();
    let out = fw.take_outbox();
    assert_eq!(
        out,
        vec![Output::Send {
            face: PORT1,
            packet: NdnPacket::Interest(interest(1).to_nack(NackCode::Loop, INTRA_SHARING_FULL)),
            tag: Some(BCubeTag::for_data(1)),
        }]
    );
    assert_eq!(fw.stats().duplicates, 1);
    assert_eq!(fw.stats().out_nacks, 1);
}

#[test]
fn duplicate_nonce_is_silent_without_nacks() {
    let cfg = ForwarderConfig {
        enable_nacks: false,
        ..ForwarderConfig::default()
    };
    let (mut fw, mut faces) = source_node(cfg);
    fw.on_interest(&mut faces, CONSUMER, interest(1), None, SimTime::ZERO)
        .unwrap();
    fw.take_outbox();
    fw.on_interest(&mut faces, PORT0, interest(1), None, SimTime::ZERO)
        .unwrap();
    assert!(fw.take_outbox().is_empty());
    assert_eq!(fw.stats().duplicates, 1);
}

#[test]
fn data_satisfies_pit_and_updates_face_metrics() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    assert_eq!(sent_faces(&fw.take_outbox()), vec![PORT0]);

    let data = Data::new(prefix().with_seq(0), Bytes::from_static(b"payload"));
    fw.on_data(&mut faces, PORT0, data.clone(), SimTime::from_millis(10));
    let out = fw.take_outbox();
    assert_eq!(
        out,
        vec![Output::Send {
            face: CONSUMER,
            packet: NdnPacket::Data(data.clone()),
            tag: None,
        }]
    );

    let entry = fw.fib().find(&prefix()).unwrap();
    let m = entry.metric(PORT0).unwrap();
    assert_eq!(m.data_in(), 1.0);
    assert!((m.srtt().unwrap() - 0.010).abs() < 1e-12);
    assert_eq!(entry.data(), 1);
    assert!(fw.pit().lookup(&data.name).unwrap().is_erased());
    assert_eq!(fw.stats().satisfied, 1);
    assert_eq!(fw.content_store().len(), 1);
}

#[test]
fn cache_hit_is_marked_as_local() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    let data = Data::new(prefix().with_seq(0), Bytes::from_static(b"x"));
    fw.on_data(&mut faces, PORT0, data.clone(), SimTime::from_millis(4));
    fw.take_outbox();

    let again = Interest::new(prefix().with_seq(0), 777);
    fw.on_interest(&mut faces, CONSUMER, again, None, SimTime::from_millis(5))
        .unwrap();
    let out = fw.take_outbox();
    let expected = Data {
        ce: CongestionMark::LocalHit,
        ..data
    };
    assert_eq!(
        out,
        vec![Output::Send {
            face: CONSUMER,
            packet: NdnPacket::Data(expected),
            tag: None,
        }]
    );
    assert_eq!(fw.stats().cache_hits, 1);
}

#[test]
fn data_towards_network_carries_requesters_port() {
    let (mut fw, mut faces) = relay_node();
    let tag = BCubeTag::for_interest(21, 0, 0, 1);
    fw.on_interest(&mut faces, FaceId(0), interest(8), Some(tag), SimTime::ZERO)
        .unwrap();
    fw.take_outbox();

    let data = Data::new(prefix().with_seq(8), Bytes::new());
    fw.on_data(&mut faces, FaceId(1), data.clone(), SimTime::from_millis(3));
    assert_eq!(
        fw.take_outbox(),
        vec![Output::Send {
            face: FaceId(0),
            packet: NdnPacket::Data(data),
            tag: Some(BCubeTag::for_data(0)),
        }]
    );
}

#[test]
fn unsolicited_data_is_dropped() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    let data = Data::new(prefix().with_seq(99), Bytes::new());
    fw.on_data(&mut faces, PORT0, data, SimTime::ZERO);
    assert!(fw.take_outbox().is_empty());
    assert_eq!(fw.stats().unsolicited_data, 1);
    assert_eq!(fw.stats().drop_data, 1);
    assert!(fw.content_store().is_empty());
}

#[test]
fn unsolicited_data_can_be_cached() {
    let cfg = ForwarderConfig {
        cache_unsolicited_data: true,
        ..ForwarderConfig::default()
    };
    let (mut fw, mut faces) = source_node(cfg);
    let data = Data::new(prefix().with_seq(99), Bytes::new());
    fw.on_data(&mut faces, PORT0, data, SimTime::ZERO);
    assert_eq!(fw.content_store().len(), 1);
    assert_eq!(fw.stats().drop_data, 0);
}

#[test]
fn exhausted_limiter_nacks_requester_and_warns_other_apps() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    let other_app = faces.add_app_face(AppId(1));
    for face in [PORT0, PORT1] {
        faces
            .get_mut(face)
            .unwrap()
            .limits
            .set_limits(0.0, SimTime::from_millis(200));
    }

    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    let out = fw.take_outbox();
    assert_eq!(
        out,
        vec![
            Output::Send {
                face: CONSUMER,
                packet: NdnPacket::Interest(
                    interest(0).to_nack(NackCode::GiveupPit, INTRA_SHARING_FULL)
                ),
                tag: None,
            },
            Output::NotifyApp {
                face: other_app,
                nack: interest(0).to_nack(NackCode::GiveupPit, 50),
            },
        ]
    );
    let stats = fw.stats();
    assert_eq!(stats.blocked, 1);
    assert_eq!(stats.exhausted, 1);
    assert_eq!(stats.extra_nacks, 1);
    assert!(fw.pit().lookup(&interest(0).name).unwrap().is_erased());
    let m = fw.fib().find(&prefix()).unwrap().metric(PORT0).unwrap();
    assert_eq!(m.nack(), 1.0);
}

#[test]
fn upstream_nack_is_relayed_after_retry_fails() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    fw.take_outbox();

    let nack = interest(0).to_nack(NackCode::GiveupPit, INTRA_SHARING_FULL);
    let tag = Some(BCubeTag::for_data(0));
    fw.on_interest(&mut faces, PORT0, nack.clone(), tag, SimTime::from_millis(5))
        .unwrap();
    let out = fw.take_outbox();
    assert_eq!(
        out,
        vec![Output::Send {
            face: CONSUMER,
            packet: NdnPacket::Interest(nack),
            tag: None,
        }]
    );
    assert_eq!(faces.get(PORT0).unwrap().limits.nack(), 1.0);
    assert_eq!(fw.stats().in_nacks, 1);
    assert_eq!(fw.stats().exhausted, 1);
    // 重试又选回 PORT0 被拒，但同一个 NACK 只计一次
    let m = fw.fib().find(&prefix()).unwrap().metric(PORT0).unwrap();
    assert_eq!(m.nack(), 1.0);
    assert_eq!(fw.stats().blocked, 0);
}

#[test]
fn similar_interest_from_another_face_is_aggregated() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    let other_app = faces.add_app_face(AppId(1));
    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    assert_eq!(sent_faces(&fw.take_outbox()), vec![PORT0]);

    let second = Interest::new(prefix().with_seq(0), 999);
    fw.on_interest(&mut faces, other_app, second, None, SimTime::from_millis(1))
        .unwrap();
    assert!(fw.take_outbox().is_empty());
    assert_eq!(fw.stats().suppressed, 1);
    assert_eq!(fw.stats().out_interests, 1);
    let entry = fw.pit().lookup(&interest(0).name).unwrap();
    let requesters: Vec<FaceId> = entry.incoming().iter().map(|r| r.face).collect();
    assert_eq!(requesters, vec![CONSUMER, other_app]);

    // 一份 Data 同时满足两个请求方
    let data = Data::new(prefix().with_seq(0), Bytes::new());
    fw.on_data(&mut faces, PORT0, data, SimTime::from_millis(8));
    assert_eq!(sent_faces(&fw.take_outbox()), vec![CONSUMER, other_app]);
}

#[test]
fn blocked_retransmission_is_sent_after_raising_allowance() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    assert_eq!(sent_faces(&fw.take_outbox()), vec![PORT0]);

    // 同一请求方换 nonce 重发：首次因配额为 0 被拒，提高配额后再发
    let retx = Interest::new(prefix().with_seq(0), 4242);
    fw.on_interest(&mut faces, CONSUMER, retx.clone(), None, SimTime::from_millis(10))
        .unwrap();
    assert_eq!(
        fw.take_outbox(),
        vec![Output::Send {
            face: PORT0,
            packet: NdnPacket::Interest(retx),
            tag: Some(BCubeTag::for_interest(21, 0, 0, 1)),
        }]
    );
    assert_eq!(fw.stats().blocked, 1);
    assert_eq!(fw.stats().suppressed, 0);
    assert_eq!(fw.stats().out_interests, 2);

    let entry = fw.pit().lookup(&interest(0).name).unwrap();
    assert_eq!(entry.max_retx_count(), 1);
    assert_eq!(entry.find_outgoing(PORT0).unwrap().retx_count, 1);
}

#[test]
fn nack_without_pit_entry_is_dropped() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    let nack = interest(5).to_nack(NackCode::Congestion, INTRA_SHARING_FULL);
    fw.on_interest(&mut faces, PORT0, nack, None, SimTime::ZERO)
        .unwrap();
    assert!(fw.take_outbox().is_empty());
    assert_eq!(fw.stats().drop_nacks, 1);
}

#[test]
fn down_face_is_skipped_as_send_failure() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    faces.get_mut(PORT0).unwrap().set_up(false);
    fw.on_interest(&mut faces, CONSUMER, interest(0), None, SimTime::ZERO)
        .unwrap();
    assert!(sent_faces(&fw.take_outbox()).is_empty());
    assert_eq!(faces.get(PORT0).unwrap().counters.send_failures, 1);
    assert_eq!(fw.stats().drop_interests, 1);
}

#[test]
fn best_route_uses_top_ranked_face() {
    let cfg = ForwarderConfig {
        strategy: StrategyKind::BestRoute,
        ..ForwarderConfig::default()
    };
    let (mut fw, mut faces) = source_node(cfg);
    for seq in 0..10 {
        fw.on_interest(&mut faces, CONSUMER, interest(seq), None, SimTime::ZERO)
            .unwrap();
        assert_eq!(sent_faces(&fw.take_outbox()), vec![PORT0]);
    }
}

#[test]
fn expired_entries_are_swept() {
    let (mut fw, mut faces) = source_node(ForwarderConfig::default());
    let short = interest(0).with_lifetime(SimTime::from_millis(50));
    fw.on_interest(&mut faces, CONSUMER, short, None, SimTime::ZERO)
        .unwrap();
    let out = fw.sweep_pit(SimTime::from_millis(60));
    assert_eq!(out.timed_out, 1);
    assert_eq!(fw.stats().timed_out, 1);
    assert!(fw.pit().is_empty());
}
