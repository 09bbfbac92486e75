//! hipdex is a sans-IO implementation of the HIP Diet EXchange (HIP-DEX) handshake.
//!
//! Two hosts prove their identities to each other with static ECDH keys, the
//! responder protects itself with a client puzzle, and both sides end up with
//! four symmetric session keys. The exchange is four packets:
//!
//! ```text
//!  Initiator                            Responder
//!      I1: DH_GROUP_LIST        -------->
//!                               <--------   R1: R1_COUNTER, PUZZLE, HOST_ID,
//!                                               HIT_SUITE_LIST, DH_GROUP_LIST
//!      I2: SOLUTION, HIP_CIPHER,
//!          ENCRYPTED_KEY, HOST_ID,
//!          HIP_MAC_3            -------->
//!                               <--------   R2: DH_GROUP_LIST, ENCRYPTED_KEY,
//!                                               HIP_MAC_3
//! ```
//!
//! The [`Engine`] does no I/O and runs no threads. Datagrams are fed in with
//! [`Engine::handle_packet`], time is fed in with [`Engine::handle_timeout`], and
//! everything the engine wants to do is drained with [`Engine::poll_output`].
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use hipdex::crypto::{rust_crypto, EcdhCurve};
//! use hipdex::{Config, Engine, HostIdentity, Output};
//!
//! let config = Arc::new(Config::default());
//! let provider = rust_crypto::default_provider();
//! let identity = HostIdentity::generate(&provider, EcdhCurve::NistP256).unwrap();
//!
//! let now = Instant::now();
//! let mut engine = Engine::new(config, identity, now).unwrap();
//!
//! let mut buf = vec![0; 2048];
//! loop {
//!     match engine.poll_output(&mut buf) {
//!         Output::Packet(_addr, _datagram) => { /* send it */ }
//!         Output::Connected(_hit) => { /* keys are ready */ }
//!         Output::Timeout(_at) => break,
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod config;
pub use config::{Config, ConfigBuilder};

mod error;
pub use error::{Error, ErrorCategory};

pub mod crypto;

mod hit;
pub use hit::{Hit, HostIdentity};

pub mod message;

pub mod puzzle;

mod connection;
pub use connection::State;

mod engine;
pub use engine::{Engine, Output};

mod rng;
pub(crate) use rng::SeededRng;

mod timer;
mod window;
