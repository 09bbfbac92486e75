//! Both hosts initiate towards each other and their I2s cross.

use std::time::{Duration, Instant};

use hipdex::message::PacketType;
use hipdex::State;

use crate::common::*;

#[test]
fn crossing_i2s_larger_hit_answers() {
    let _ = env_logger::try_init();

    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);

    // R1s are stateless. Obtain one from each side before either initiates.
    y.engine.handle_packet(&i1(x.hit(), y.hit()), x.addr, now).unwrap();
    let r1_from_y = collect_packets(&mut y.engine);
    x.engine.handle_packet(&i1(y.hit(), x.hit()), y.addr, now).unwrap();
    let r1_from_x = collect_packets(&mut x.engine);
    assert_eq!(packet_type(&r1_from_y[0].1), PacketType::R1);
    assert_eq!(packet_type(&r1_from_x[0].1), PacketType::R1);

    x.engine.connect(y.hit(), y.addr, now).unwrap();
    y.engine.connect(x.hit(), x.addr, now).unwrap();

    // The crossing I1s are ignored in I1_SENT
    let i1_x = collect_packets(&mut x.engine);
    let i1_y = collect_packets(&mut y.engine);
    deliver(&i1_x, &mut y, x.addr, now);
    deliver(&i1_y, &mut x, y.addr, now);
    assert!(collect_packets(&mut x.engine).is_empty());
    assert!(collect_packets(&mut y.engine).is_empty());

    deliver(&r1_from_y, &mut x, y.addr, now);
    deliver(&r1_from_x, &mut y, x.addr, now);
    solve(&mut x, y.hit(), now);
    solve(&mut y, x.hit(), now);

    let i2_x = collect_packets(&mut x.engine);
    let i2_y = collect_packets(&mut y.engine);
    assert_eq!(packet_type(&i2_x[0].1), PacketType::I2);
    assert_eq!(packet_type(&i2_y[0].1), PacketType::I2);

    deliver(&i2_x, &mut y, x.addr, now);
    deliver(&i2_y, &mut x, y.addr, now);

    // The smaller HIT drops the peer's I2 and keeps waiting for R2
    assert_eq!(x.engine.state(&y.hit()), Some(State::I2Sent));
    assert!(collect_packets(&mut x.engine).is_empty());

    // The larger HIT acts as responder
    assert_eq!(y.engine.state(&x.hit()), Some(State::R2Sent));
    assert_eq!(y.engine.retransmitting(), 0);
    let r2 = collect_packets(&mut y.engine);
    assert_eq!(packet_type(&r2[0].1), PacketType::R2);

    deliver(&r2, &mut x, y.addr, now);
    assert_eq!(x.engine.state(&y.hit()), Some(State::Established));

    y.engine
        .handle_timeout(now + Duration::from_secs(10))
        .unwrap();
    assert_eq!(y.engine.state(&x.hit()), Some(State::Established));

    assert!(x
        .engine
        .keys(&y.hit())
        .unwrap()
        .same_keys(y.engine.keys(&x.hit()).unwrap()));
}
