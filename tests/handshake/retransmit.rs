//! Shared retransmission timer accounting.

use std::time::{Duration, Instant};

use hipdex::message::PacketType;
use hipdex::State;

use crate::common::*;

/// Run one handshake from `x` to `r`, packets for other nodes left queued.
fn complete(x: &mut Node, r: &mut Node, now: Instant) {
    x.engine.connect(r.hit(), r.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    deliver(&out, r, x.addr, now);
    let out = collect_packets(&mut r.engine);
    deliver(&out, x, r.addr, now);
    solve(x, r.hit(), now);
    let out = collect_packets(&mut x.engine);
    deliver(&out, r, x.addr, now);
    let out = collect_packets(&mut r.engine);
    deliver(&out, x, r.addr, now);
}

#[test]
fn one_timer_for_many_connections() {
    let _ = env_logger::try_init();

    let now = Instant::now();
    let mut x = node(1, now);
    let mut responders = vec![node(2, now), node(3, now), node(4, now)];

    for r in &responders {
        x.engine.connect(r.hit(), r.addr, now).unwrap();
        assert!(x.engine.is_retransmission_armed());
    }
    assert_eq!(x.engine.retransmitting(), 3);

    // Initial I1s are lost
    assert_eq!(collect_packets(&mut x.engine).len(), 3);

    // One sweep resends all three
    x.engine
        .handle_timeout(now + Duration::from_secs(5))
        .unwrap();
    let resent = collect_packets(&mut x.engine);
    assert_eq!(resent.len(), 3);
    assert!(resent.iter().all(|(_, p)| packet_type(p) == PacketType::I1));

    let now = now + Duration::from_secs(5);
    let mut remaining = 3;
    for r in responders.iter_mut() {
        let out = resent
            .iter()
            .filter(|(to, _)| *to == r.addr)
            .cloned()
            .collect::<Vec<_>>();
        deliver(&out, r, x.addr, now);
        let r1 = collect_packets(&mut r.engine);
        deliver(&r1, &mut x, r.addr, now);

        solve(&mut x, r.hit(), now);
        // I1_SENT to I2_SENT keeps it counted
        assert_eq!(x.engine.retransmitting(), remaining);

        let i2 = collect_packets(&mut x.engine);
        deliver(&i2, r, x.addr, now);
        let r2 = collect_packets(&mut r.engine);
        deliver(&r2, &mut x, r.addr, now);

        assert_eq!(x.engine.state(&r.hit()), Some(State::Established));
        remaining -= 1;
        assert_eq!(x.engine.retransmitting(), remaining);
        assert_eq!(x.engine.is_retransmission_armed(), remaining > 0);
    }
}

#[test]
fn resend_is_verbatim_without_backoff() {
    let now = Instant::now();
    let mut x = node(1, now);
    let y = node(2, now);

    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let first = collect_packets(&mut x.engine);

    for n in 1..=3 {
        let at = now + Duration::from_secs(5 * n);
        x.engine.handle_timeout(at).unwrap();
        let out = drain_outputs(&mut x.engine);
        assert_eq!(out.packets, first);
        assert_eq!(out.timeout, Some(at + Duration::from_secs(5)));
    }
}

#[test]
fn nothing_armed_when_idle() {
    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);
    complete(&mut x, &mut y, now);

    assert_eq!(x.engine.state(&y.hit()), Some(State::Established));
    assert!(!x.engine.is_retransmission_armed());

    // Only the secret rotation is left
    let out = drain_outputs(&mut x.engine);
    assert_eq!(out.timeout, Some(now + Duration::from_secs(120)));
}
