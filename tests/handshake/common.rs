//! Shared helpers for the handshake integration tests.

#![allow(unused)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hipdex::crypto::{rust_crypto, EcdhCurve};
use hipdex::message::{DhGroup, DhGroupList, Packet, PacketType, Parameter};
use hipdex::{Config, Engine, Hit, HostIdentity, Output, State};

/// An engine and the address it is reachable at.
pub struct Node {
    pub engine: Engine,
    pub addr: SocketAddr,
}

impl Node {
    pub fn hit(&self) -> Hit {
        self.engine.local_hit()
    }
}

/// `0x00..00NN`
pub fn hit(last: u8) -> Hit {
    let mut b = [0u8; 16];
    b[15] = last;
    Hit::new(b)
}

/// Config for nodes with pinned HITs.
pub fn config() -> Config {
    Config::builder()
        .verify_host_identity(false)
        .build()
        .expect("Failed to build config")
}

/// A P-256 node with HIT `0x00..00NN`.
pub fn node(last: u8, now: Instant) -> Node {
    node_with(last, now, config())
}

pub fn node_with(last: u8, now: Instant, config: Config) -> Node {
    let provider = rust_crypto::default_provider();
    let kx = provider
        .key_agreement(EcdhCurve::NistP256)
        .expect("P-256 support");
    let key = kx.generate_key_pair().expect("key pair");
    let identity = HostIdentity::with_hit(hit(last), key);

    let engine = Engine::new(Arc::new(config), identity, now).expect("engine");
    let addr = format!("10.0.0.{}:10500", last).parse().unwrap();

    Node { engine, addr }
}

/// Polled outputs up to `Timeout`.
#[derive(Default, Debug)]
pub struct DrainedOutputs {
    pub packets: Vec<(SocketAddr, Vec<u8>)>,
    pub connected: Vec<Hit>,
    pub timeout: Option<Instant>,
}

/// Poll until `Timeout`, collecting everything.
pub fn drain_outputs(engine: &mut Engine) -> DrainedOutputs {
    let mut result = DrainedOutputs::default();
    let mut buf = vec![0u8; 2048];
    loop {
        match engine.poll_output(&mut buf) {
            Output::Packet(addr, p) => result.packets.push((addr, p.to_vec())),
            Output::Connected(hit) => result.connected.push(hit),
            Output::Timeout(t) => {
                result.timeout = Some(t);
                break;
            }
        }
    }
    result
}

/// Poll until `Timeout`, collecting only packets.
pub fn collect_packets(engine: &mut Engine) -> Vec<(SocketAddr, Vec<u8>)> {
    drain_outputs(engine).packets
}

/// Deliver the packets addressed to `dest` at `now`.
pub fn deliver(
    packets: &[(SocketAddr, Vec<u8>)],
    dest: &mut Node,
    from: SocketAddr,
    now: Instant,
) {
    for (to, p) in packets {
        if *to == dest.addr {
            // Ignore errors, they are expected for replays
            let _ = dest.engine.handle_packet(p, from, now);
        }
    }
}

/// Exchange packets and tick both nodes once a second until both report
/// `Connected` or a minute passes.
pub fn drive(a: &mut Node, b: &mut Node, now: &mut Instant) -> (bool, bool) {
    let mut a_connected = false;
    let mut b_connected = false;

    for _ in 0..60 {
        a.engine.handle_timeout(*now).expect("handle_timeout");
        b.engine.handle_timeout(*now).expect("handle_timeout");

        let out_a = drain_outputs(&mut a.engine);
        let out_b = drain_outputs(&mut b.engine);
        a_connected |= out_a.connected.contains(&b.hit());
        b_connected |= out_b.connected.contains(&a.hit());

        deliver(&out_a.packets, b, a.addr, *now);
        deliver(&out_b.packets, a, b.addr, *now);

        if a_connected && b_connected {
            break;
        }
        *now += Duration::from_secs(1);
    }

    (a_connected, b_connected)
}

/// Tick `node` until it has solved the puzzle from `peer` and sent I2.
///
/// Queued packets are left in place.
pub fn solve(node: &mut Node, peer: Hit, now: Instant) {
    for _ in 0..10_000 {
        if node.engine.state(&peer) == Some(State::I2Sent) {
            return;
        }
        node.engine.handle_timeout(now).expect("handle_timeout");
    }
    panic!("puzzle from {} not solved", peer);
}

/// An I1 from `from` to `to`, as the peer would send it.
pub fn i1(from: Hit, to: Hit) -> Vec<u8> {
    Packet::new(PacketType::I1, from, to)
        .with(Parameter::DhGroupList(DhGroupList::single(DhGroup::NistP256)))
        .to_bytes()
        .expect("encode I1")
}

pub fn packet_type(bytes: &[u8]) -> PacketType {
    Packet::parse(bytes).expect("parse").packet_type()
}

/// Re-encode a packet after changing it. The checksum is recomputed.
pub fn rewrite(bytes: &[u8], f: impl FnOnce(&mut Packet)) -> Vec<u8> {
    let mut packet = Packet::parse(bytes).expect("parse");
    f(&mut packet);
    packet.to_bytes().expect("encode")
}
