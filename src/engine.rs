use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connection::{Connection, Context, LocalEvent, State};
use crate::crypto::KeySet;
use crate::message::{CipherId, Packet};
use crate::puzzle::PuzzleEngine;
use crate::timer::PeriodicTimer;
use crate::{Config, Error, Hit, HostIdentity, SeededRng};

const DISTANT_FUTURE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Output from [`Engine::poll_output`].
#[derive(Debug, PartialEq, Eq)]
pub enum Output<'a> {
    /// A datagram to send to the address.
    Packet(SocketAddr, &'a [u8]),

    /// The handshake with this HIT completed. Keys are available from
    /// [`Engine::keys`].
    Connected(Hit),

    /// Nothing more to do until this time. Call
    /// [`Engine::handle_timeout`] then.
    Timeout(Instant),
}

/// Sans-IO HIP-DEX engine for one local host identity.
///
/// Owns the connection table, the puzzle secrets and the two shared timers
/// (secret rotation and retransmission). All events are serialized through
/// `&mut self`.
pub struct Engine {
    config: Arc<Config>,
    identity: HostIdentity,
    puzzles: PuzzleEngine,
    rng: SeededRng,

    /// Connections by remote HIT.
    connections: HashMap<Hit, Connection>,

    /// Number of connections in a state that retransmits.
    retransmitting: usize,

    /// Armed while `retransmitting > 0`.
    retransmit_timer: PeriodicTimer,

    rotation_timer: PeriodicTimer,

    /// Outgoing datagrams.
    queue_tx: VecDeque<(SocketAddr, Vec<u8>)>,

    /// Completed handshakes not yet polled.
    queue_events: VecDeque<Hit>,

    /// The last now we seen
    last_now: Instant,

    closed: bool,
}

impl Engine {
    /// Create an engine. Generates the first puzzle secret and arms the
    /// rotation timer.
    pub fn new(config: Arc<Config>, identity: HostIdentity, now: Instant) -> Result<Self, Error> {
        let provider = config.crypto_provider();
        provider.validate()?;

        let puzzles = PuzzleEngine::new(config.puzzle_complexity(), provider.secure_random)?;
        let rng = SeededRng::new(config.rng_seed());

        let mut rotation_timer = PeriodicTimer::new(config.secret_rotation_interval());
        rotation_timer.arm(now);
        let retransmit_timer = PeriodicTimer::new(config.retransmission_interval());

        debug!(
            "Engine for {} ({:?}), puzzle k={}",
            identity.hit(),
            identity.curve(),
            config.puzzle_complexity()
        );

        Ok(Engine {
            config,
            identity,
            puzzles,
            rng,
            connections: HashMap::new(),
            retransmitting: 0,
            retransmit_timer,
            rotation_timer,
            queue_tx: VecDeque::new(),
            queue_events: VecDeque::new(),
            last_now: now,
            closed: false,
        })
    }

    pub fn local_hit(&self) -> Hit {
        self.identity.hit()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handshake state of the connection with `hit`, if there is one.
    pub fn state(&self, hit: &Hit) -> Option<State> {
        self.connections.get(hit).map(|c| c.state())
    }

    /// Session keys with `hit`. Provisional until the handshake completes.
    pub fn keys(&self, hit: &Hit) -> Option<&KeySet> {
        self.connections.get(hit).and_then(|c| c.keys())
    }

    /// Cipher selected for `hit`, when we were the responder.
    pub fn cipher(&self, hit: &Hit) -> Option<CipherId> {
        self.connections.get(hit).and_then(|c| c.cipher())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// How many connections currently need retransmission.
    pub fn retransmitting(&self) -> usize {
        self.retransmitting
    }

    pub fn is_retransmission_armed(&self) -> bool {
        self.retransmit_timer.is_armed()
    }

    pub fn puzzle_generation(&self) -> u64 {
        self.puzzles.generation()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handle a datagram received from `from` at `now`.
    ///
    /// An error means the packet was dropped. No connection changed state and
    /// nothing was queued for sending.
    pub fn handle_packet(
        &mut self,
        packet: &[u8],
        from: SocketAddr,
        now: Instant,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        self.advance(now);

        let packet = match Packet::parse(packet) {
            Ok(p) => p,
            Err(e) => {
                debug!("Drop malformed packet from {}: {}", from, e);
                return Err(e);
            }
        };

        if *packet.receiver() != self.identity.hit() {
            warn!(
                "Drop {:?} from {} for {}",
                packet.packet_type(),
                from,
                packet.receiver()
            );
            return Err(Error::ReceiverMismatch);
        }

        let remote = *packet.sender();
        let created = !self.connections.contains_key(&remote);
        if created {
            if !self.config.accept_unsolicited() {
                trace!("Ignore unsolicited {:?} from {}", packet.packet_type(), remote);
                return Ok(());
            }
            if self.connections.len() >= self.config.max_connections() {
                warn!(
                    "Drop {:?} from {}: connection table full",
                    packet.packet_type(),
                    remote
                );
                return Ok(());
            }
            let conn = Connection::new(self.identity.hit(), remote, from);
            self.connections.insert(remote, conn);
        }

        let result = match self.connections.get_mut(&remote) {
            Some(conn) => {
                let mut ctx = Context {
                    config: &self.config,
                    identity: &self.identity,
                    puzzles: &self.puzzles,
                    rng: &mut self.rng,
                    now: self.last_now,
                };
                conn.handle_packet(&packet, &mut ctx)
            }
            None => Ok(()),
        };

        self.drain_events(remote);

        // R1 is sent without keeping state
        if created && self.state(&remote) == Some(State::Unassociated) {
            self.connections.remove(&remote);
        }

        if let Err(e) = &result {
            warn!("Drop {:?} from {}: {}", packet.packet_type(), remote, e);
        }

        result
    }

    /// Start a handshake with `remote` at `addr`.
    ///
    /// The retransmission timer counts from `now`.
    pub fn connect(&mut self, remote: Hit, addr: SocketAddr, now: Instant) -> Result<(), Error> {
        self.ensure_open()?;
        self.advance(now);

        if remote == self.identity.hit() {
            return Err(Error::UsageError("Cannot connect to ourselves".to_string()));
        }

        if !self.connections.contains_key(&remote) {
            if self.connections.len() >= self.config.max_connections() {
                return Err(Error::UsageError("Connection table full".to_string()));
            }
            let conn = Connection::new(self.identity.hit(), remote, addr);
            self.connections.insert(remote, conn);
        }

        let result = match self.connections.get_mut(&remote) {
            Some(conn) => {
                let mut ctx = Context {
                    config: &self.config,
                    identity: &self.identity,
                    puzzles: &self.puzzles,
                    rng: &mut self.rng,
                    now: self.last_now,
                };
                conn.initiate(&mut ctx)
            }
            None => Ok(()),
        };

        self.drain_events(remote);
        result
    }

    /// Advance time: rotate the puzzle secret, run the retransmission sweep,
    /// expire R2_SENT holds and work on pending puzzles.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.ensure_open()?;
        self.advance(now);

        if self.rotation_timer.fire(now) {
            let random = self.config.crypto_provider().secure_random;
            match self.puzzles.regenerate_secret(random) {
                Ok(()) => debug!(
                    "Rotated puzzle secret, generation {}",
                    self.puzzles.generation()
                ),
                Err(e) => warn!("Puzzle secret rotation failed: {}", e),
            }
        }

        if self.retransmit_timer.fire(now) {
            let n = self
                .connections
                .values_mut()
                .map(|c| c.retransmit())
                .filter(|resent| *resent)
                .count();
            debug!("Retransmission sweep resent {} packets", n);
        }

        let hits: Vec<Hit> = self.connections.keys().copied().collect();
        for hit in hits {
            if let Some(conn) = self.connections.get_mut(&hit) {
                let mut ctx = Context {
                    config: &self.config,
                    identity: &self.identity,
                    puzzles: &self.puzzles,
                    rng: &mut self.rng,
                    now,
                };
                if let Err(e) = conn.handle_timeout(&mut ctx) {
                    warn!("Handshake step with {} failed: {}", hit, e);
                }
            }
            self.drain_events(hit);
        }

        Ok(())
    }

    /// Poll for the next output.
    ///
    /// Connected events come first, then datagrams, then the time for the
    /// next [`handle_timeout`](Engine::handle_timeout).
    ///
    /// # Panics
    ///
    /// If `buf` is smaller than a queued datagram. A buffer of
    /// [`MAX_PACKET_LEN`](crate::message::MAX_PACKET_LEN) is always enough.
    pub fn poll_output<'a>(&mut self, buf: &'a mut [u8]) -> Output<'a> {
        if let Some(hit) = self.queue_events.pop_front() {
            return Output::Connected(hit);
        }

        if let Some((addr, datagram)) = self.queue_tx.pop_front() {
            let len = datagram.len();
            assert!(
                len <= buf.len(),
                "Output buffer too small for packet {} > {}",
                len,
                buf.len()
            );
            buf[..len].copy_from_slice(&datagram);
            return Output::Packet(addr, &buf[..len]);
        }

        Output::Timeout(self.poll_timeout())
    }

    /// Stop the engine.
    ///
    /// Both timers are disarmed before pending work and connections are
    /// released. Every later call except polling fails with a usage error.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        self.rotation_timer.disarm();
        self.retransmit_timer.disarm();

        for conn in self.connections.values_mut() {
            conn.close();
        }
        self.connections.clear();
        self.queue_tx.clear();
        self.queue_events.clear();
        self.retransmitting = 0;
        self.closed = true;

        debug!("Engine for {} closed", self.identity.hit());
    }

    /// Time never goes backwards for the engine.
    fn advance(&mut self, now: Instant) {
        if now > self.last_now {
            self.last_now = now;
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::UsageError("Engine is closed".to_string()));
        }
        Ok(())
    }

    fn poll_timeout(&self) -> Instant {
        if self.connections.values().any(|c| c.is_solving()) {
            return self.last_now;
        }

        [self.rotation_timer.deadline(), self.retransmit_timer.deadline()]
            .into_iter()
            .flatten()
            .chain(self.connections.values().filter_map(|c| c.hold_deadline()))
            .min()
            .unwrap_or(self.last_now + DISTANT_FUTURE)
    }

    fn drain_events(&mut self, hit: Hit) {
        let Some(conn) = self.connections.get_mut(&hit) else {
            return;
        };
        let addr = conn.addr();

        while let Some(event) = conn.poll_event() {
            match event {
                LocalEvent::Transmit(datagram) => self.queue_tx.push_back((addr, datagram)),
                LocalEvent::StartRetransmission => {
                    self.retransmitting += 1;
                    if self.retransmitting == 1 {
                        debug!("Arm retransmission timer");
                        self.retransmit_timer.arm(self.last_now);
                    }
                }
                LocalEvent::StopRetransmission => {
                    self.retransmitting = self.retransmitting.saturating_sub(1);
                    if self.retransmitting == 0 {
                        debug!("Disarm retransmission timer");
                        self.retransmit_timer.disarm();
                    }
                }
                LocalEvent::Connected => self.queue_events.push_back(hit),
            }
        }
    }
}
