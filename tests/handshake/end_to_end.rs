//! Full I1, R1, I2, R2 exchange between two engines.

use std::time::{Duration, Instant};

use hipdex::message::PacketType;
use hipdex::State;

use crate::common::*;

#[test]
fn handshake_establishes_identical_keys() {
    let _ = env_logger::try_init();

    let mut now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);

    x.engine.connect(y.hit(), y.addr, now).expect("connect");
    let (x_connected, y_connected) = drive(&mut x, &mut y, &mut now);

    assert!(x_connected, "initiator should connect");
    assert!(y_connected, "responder should connect after the R2_SENT hold");

    assert_eq!(x.engine.state(&y.hit()), Some(State::Established));
    assert_eq!(y.engine.state(&x.hit()), Some(State::Established));

    let kx = x.engine.keys(&y.hit()).expect("initiator keys");
    let ky = y.engine.keys(&x.hit()).expect("responder keys");
    assert!(kx.same_keys(ky));
    assert_eq!(kx.initiator_encryption(), ky.initiator_encryption());
    assert_eq!(kx.initiator_integrity(), ky.initiator_integrity());
    assert_eq!(kx.responder_encryption(), ky.responder_encryption());
    assert_eq!(kx.responder_integrity(), ky.responder_integrity());
    assert_eq!(kx.local_encryption(), ky.peer_encryption());
    assert_ne!(kx.initiator_encryption(), kx.responder_encryption());

    assert!(!x.engine.is_retransmission_armed());
    assert_eq!(x.engine.retransmitting(), 0);
}

#[test]
fn packet_sequence() {
    let _ = env_logger::try_init();

    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);

    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, y.addr);
    assert_eq!(packet_type(&out[0].1), PacketType::I1);
    deliver(&out, &mut y, x.addr, now);

    // R1 does not create state on the responder
    assert_eq!(y.engine.connection_count(), 0);
    let out = collect_packets(&mut y.engine);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, x.addr);
    assert_eq!(packet_type(&out[0].1), PacketType::R1);
    deliver(&out, &mut x, y.addr, now);

    solve(&mut x, y.hit(), now);
    let out = collect_packets(&mut x.engine);
    assert_eq!(out.len(), 1);
    assert_eq!(packet_type(&out[0].1), PacketType::I2);
    deliver(&out, &mut y, x.addr, now);
    assert_eq!(y.engine.state(&x.hit()), Some(State::R2Sent));

    let out = drain_outputs(&mut y.engine);
    assert_eq!(out.packets.len(), 1);
    assert_eq!(packet_type(&out.packets[0].1), PacketType::R2);
    assert!(out.connected.is_empty());
    assert_eq!(
        out.timeout,
        Some(now + y.engine.config().r2_sent_hold())
    );
    deliver(&out.packets, &mut x, y.addr, now);

    let out = drain_outputs(&mut x.engine);
    assert_eq!(out.connected, vec![y.hit()]);
    assert!(out.packets.is_empty());

    y.engine
        .handle_timeout(now + Duration::from_secs(10))
        .unwrap();
    let out = drain_outputs(&mut y.engine);
    assert_eq!(out.connected, vec![x.hit()]);
}

#[test]
fn r2_sent_hold_counts_from_arrival() {
    let _ = env_logger::try_init();

    let t0 = Instant::now();
    let mut x = node(1, t0);
    let mut y = node(2, t0);

    // Both engines idle until the handshake starts
    let now = t0 + Duration::from_secs(60);
    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    deliver(&out, &mut y, x.addr, now);
    let out = collect_packets(&mut y.engine);
    deliver(&out, &mut x, y.addr, now);
    solve(&mut x, y.hit(), now);
    let i2 = collect_packets(&mut x.engine);
    deliver(&i2, &mut y, x.addr, now);

    assert_eq!(y.engine.state(&x.hit()), Some(State::R2Sent));
    let out = drain_outputs(&mut y.engine);
    assert_eq!(out.packets.len(), 1);
    assert_eq!(out.timeout, Some(now + Duration::from_secs(10)));

    // Still holding, a retransmitted I2 gets the same R2
    let later = now + Duration::from_secs(5);
    y.engine.handle_timeout(later).unwrap();
    assert_eq!(y.engine.state(&x.hit()), Some(State::R2Sent));
    deliver(&i2, &mut y, x.addr, later);
    let again = collect_packets(&mut y.engine);
    assert_eq!(again, out.packets);
}

#[test]
fn echo_request_is_answered_outside_the_mac() {
    use hipdex::message::Parameter;

    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);

    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    deliver(&out, &mut y, x.addr, now);

    let r1 = collect_packets(&mut y.engine);
    let r1 = rewrite(&r1[0].1, |p| {
        p.push(Parameter::EchoRequestUnsigned(b"nonce".to_vec()))
    });
    x.engine.handle_packet(&r1, y.addr, now).unwrap();

    solve(&mut x, y.hit(), now);
    let out = collect_packets(&mut x.engine);
    let i2 = hipdex::message::Packet::parse(&out[0].1).unwrap();
    assert_eq!(i2.echo_response(), Some(&b"nonce"[..]));
    assert!(matches!(
        i2.parameters().last(),
        Some(Parameter::EchoResponseUnsigned(_))
    ));

    deliver(&out, &mut y, x.addr, now);
    assert_eq!(y.engine.state(&x.hit()), Some(State::R2Sent));
}

#[test]
fn generated_identities_verify_host_id() {
    use std::sync::Arc;

    use hipdex::crypto::{rust_crypto, EcdhCurve};
    use hipdex::{Config, Engine, HostIdentity};

    let _ = env_logger::try_init();

    let mut now = Instant::now();
    let provider = rust_crypto::default_provider();
    let config = Arc::new(Config::default());

    let make = |last: u8| {
        let identity = HostIdentity::generate(&provider, EcdhCurve::NistP384).unwrap();
        Node {
            engine: Engine::new(Arc::clone(&config), identity, now).unwrap(),
            addr: format!("10.0.1.{}:10500", last).parse().unwrap(),
        }
    };
    let mut a = make(1);
    let mut b = make(2);

    a.engine.connect(b.hit(), b.addr, now).unwrap();
    let (a_connected, b_connected) = drive(&mut a, &mut b, &mut now);
    assert!(a_connected && b_connected);
    assert!(a
        .engine
        .keys(&b.hit())
        .unwrap()
        .same_keys(b.engine.keys(&a.hit()).unwrap()));
}
