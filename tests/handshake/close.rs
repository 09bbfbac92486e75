//! Engine shutdown.

use std::time::{Duration, Instant};

use hipdex::{Error, Output};

use crate::common::*;

#[test]
fn close_mid_handshake() {
    let _ = env_logger::try_init();

    let now = Instant::now();
    let mut x = node(1, now);
    let mut y = node(2, now);

    x.engine.connect(y.hit(), y.addr, now).unwrap();
    let out = collect_packets(&mut x.engine);
    deliver(&out, &mut y, x.addr, now);
    let r1 = collect_packets(&mut y.engine);
    deliver(&r1, &mut x, y.addr, now);

    // A puzzle is pending and the retransmission timer is armed
    let mut buf = vec![0u8; 2048];
    assert_eq!(x.engine.poll_output(&mut buf), Output::Timeout(now));
    assert!(x.engine.is_retransmission_armed());

    x.engine.close();
    assert!(x.engine.is_closed());
    assert!(!x.engine.is_retransmission_armed());
    assert_eq!(x.engine.connection_count(), 0);
    assert_eq!(x.engine.state(&y.hit()), None);

    let out = drain_outputs(&mut x.engine);
    assert!(out.packets.is_empty());
    assert!(out.timeout.unwrap() > now + Duration::from_secs(365 * 24 * 60 * 60));

    assert!(matches!(
        x.engine.handle_timeout(now + Duration::from_secs(5)),
        Err(Error::UsageError(_))
    ));
    assert!(matches!(
        x.engine.handle_packet(&r1[0].1, y.addr, now),
        Err(Error::UsageError(_))
    ));
    assert!(matches!(
        x.engine.connect(y.hit(), y.addr, now),
        Err(Error::UsageError(_))
    ));

    // Closing twice is harmless
    x.engine.close();
}
