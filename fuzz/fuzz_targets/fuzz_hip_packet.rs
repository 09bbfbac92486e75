#![no_main]

//! Fuzz target for HIP packet handling.
//!
//! Feeds arbitrary bytes to the packet parser and to an engine, once idle
//! and once with a handshake in flight.

use libfuzzer_sys::fuzz_target;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hipdex::crypto::{rust_crypto, EcdhCurve};
use hipdex::message::Packet;
use hipdex::{Config, Engine, Hit, HostIdentity, Output};

fuzz_target!(|data: &[u8]| {
    // Re-encoding anything we accept must not fail
    if let Ok(packet) = Packet::parse(data) {
        let _ = packet.to_bytes();
    }

    let provider = rust_crypto::default_provider();
    let identity = match HostIdentity::generate(&provider, EcdhCurve::NistP256) {
        Ok(i) => i,
        Err(_) => return,
    };
    let config = Arc::new(Config::default());
    let now = Instant::now();
    let from: SocketAddr = "10.0.0.1:10500".parse().unwrap();

    let mut engine = match Engine::new(config, identity, now) {
        Ok(e) => e,
        Err(_) => return,
    };

    // Idle responder
    let _ = engine.handle_packet(data, from, now);

    // Initiator waiting for R1
    let peer = Hit::new([0x20, 0x01, 0x00, 0x15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    let _ = engine.connect(peer, from, now);
    let _ = engine.handle_packet(data, from, now);
    let _ = engine.handle_timeout(now);

    let mut buf = vec![0u8; 2048];
    for _ in 0..10 {
        if let Output::Timeout(_) = engine.poll_output(&mut buf) {
            break;
        }
    }
});
