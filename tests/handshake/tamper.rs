//! Modified or forged packets are dropped before any state change.

use std::time::Instant;

use hipdex::message::{Packet, Parameter};
use hipdex::{Error, ErrorCategory, State};

use crate::common::*;

/// Run x to the point where y's R2 is ready. Returns (I2, R2).
fn until_r2(x: &mut Node, y: &mut Node, now: Instant) -> (Vec<u8>, Vec<u8>) {
    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    deliver(&out, y, x.addr, now);
    let out = collect_packets(&mut y.engine);
    deliver(&out, x, y.addr, now);
    solve(x, y.hit(), now);
    let i2 = collect_packets(&mut x.engine).remove(0).1;
    y.engine.handle_packet(&i2, x.addr, now).unwrap();
    let r2 = collect_packets(&mut y.engine).remove(0).1;
    (i2, r2)
}

/// Run x to I2_SENT. Returns the I2, not yet delivered.
fn until_i2(x: &mut Node, y: &mut Node, now: Instant) -> Vec<u8> {
    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    deliver(&out, y, x.addr, now);
    let out = collect_packets(&mut y.engine);
    deliver(&out, x, y.addr, now);
    solve(x, y.hit(), now);
    collect_packets(&mut x.engine).remove(0).1
}

#[test]
fn bit_flip_fails_checksum() {
    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);
    let mut i2 = until_i2(&mut x, &mut y, now);

    i2[60] ^= 0x10;
    let err = y.engine.handle_packet(&i2, x.addr, now).unwrap_err();
    assert!(matches!(err, Error::BadChecksum { .. }));
    assert_eq!(err.category(), ErrorCategory::Malformed);
    assert_eq!(y.engine.connection_count(), 0);
    assert!(collect_packets(&mut y.engine).is_empty());
}

#[test]
fn r2_with_wrong_key_is_rejected() {
    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);
    let (_, r2) = until_r2(&mut x, &mut y, now);

    let forged = rewrite(&r2, |p| p.recalculate_mac(&[0x42; 16]).unwrap());
    let err = x.engine.handle_packet(&forged, y.addr, now).unwrap_err();
    assert!(matches!(err, Error::BadMac));
    assert_eq!(err.category(), ErrorCategory::Authentication);
    assert_eq!(x.engine.state(&y.hit()), Some(State::I2Sent));
    assert!(drain_outputs(&mut x.engine).connected.is_empty());

    let modified = rewrite(&r2, |p| p.set_controls(0x8000));
    assert!(matches!(
        x.engine.handle_packet(&modified, y.addr, now),
        Err(Error::BadMac)
    ));
    assert_eq!(x.engine.state(&y.hit()), Some(State::I2Sent));

    // The genuine R2 still completes the handshake
    x.engine.handle_packet(&r2, y.addr, now).unwrap();
    assert_eq!(x.engine.state(&y.hit()), Some(State::Established));
}

#[test]
fn i2_with_wrong_key_is_rejected() {
    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);
    let i2 = until_i2(&mut x, &mut y, now);

    let forged = rewrite(&i2, |p| p.recalculate_mac(&[0x42; 16]).unwrap());
    assert!(matches!(
        y.engine.handle_packet(&forged, x.addr, now),
        Err(Error::BadMac)
    ));
    assert_eq!(y.engine.state(&x.hit()), None);
    assert!(collect_packets(&mut y.engine).is_empty());

    y.engine.handle_packet(&i2, x.addr, now).unwrap();
    assert_eq!(y.engine.state(&x.hit()), Some(State::R2Sent));
}

#[test]
fn i2_with_foreign_puzzle_is_rejected() {
    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);
    let i2 = until_i2(&mut x, &mut y, now);

    let forged = rewrite(&i2, |p| {
        let mut rebuilt = Packet::new(p.packet_type(), *p.sender(), *p.receiver());
        for param in p.parameters() {
            let param = match param {
                Parameter::Solution(s) => {
                    let mut s = s.clone();
                    s.random_i[0] ^= 1;
                    Parameter::Solution(s)
                }
                other => other.clone(),
            };
            rebuilt.push(param);
        }
        *p = rebuilt;
    });

    let err = y.engine.handle_packet(&forged, x.addr, now).unwrap_err();
    assert!(matches!(err, Error::BadSolution));
    assert_eq!(y.engine.state(&x.hit()), None);
    assert!(collect_packets(&mut y.engine).is_empty());
}

#[test]
fn i2_after_secret_window_rotates_is_rejected() {
    use std::time::Duration;

    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);
    let i2 = until_i2(&mut x, &mut y, now);

    // Two rotations keep the secret in the window
    for n in 1..=2 {
        y.engine
            .handle_timeout(now + Duration::from_secs(120 * n))
            .unwrap();
    }
    assert_eq!(y.engine.puzzle_generation(), 2);

    // A third rotation pushes it out
    y.engine
        .handle_timeout(now + Duration::from_secs(360))
        .unwrap();
    assert_eq!(y.engine.puzzle_generation(), 3);
    assert!(matches!(
        y.engine.handle_packet(&i2, x.addr, now),
        Err(Error::BadSolution)
    ));
}

#[test]
fn packet_for_someone_else() {
    let now = Instant::now();
    let mut y = node(2, now);

    let err = y
        .engine
        .handle_packet(
            &i1(hit(1), hit(9)),
            "10.0.0.1:10500".parse().unwrap(),
            now,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ReceiverMismatch));
}
