// HIP-DEX base exchange, one connection per remote HIT:
//
// 1. Initiator sends I1 with its DH_GROUP_LIST and enters I1_SENT.
// 2. Responder answers statelessly with R1: a puzzle derived from its current
//    secret, its HOST_ID and its DH_GROUP_LIST.
// 3. Initiator does static ECDH with the responder's HOST_ID, derives the
//    session keys keyed by the puzzle I, solves the puzzle and sends I2
//    authenticated with its integrity key. It enters I2_SENT.
// 4. Responder verifies the solution against its secret window, does the same
//    ECDH and derivation, verifies the I2 tag and answers with R2
//    authenticated with its integrity key. It enters R2_SENT.
// 5. Initiator verifies the R2 tag and is ESTABLISHED. The responder becomes
//    ESTABLISHED once the R2_SENT hold passes without further I2s.
//
// While in I1_SENT or I2_SENT the last packet is resent verbatim by the
// engine's shared retransmission sweep.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use zeroize::Zeroizing;

use crate::crypto::{ckdf, KeySet, BLOCK_LEN};
use crate::message::{
    CipherId, DhGroupList, HostId, Packet, PacketType, Parameter, ParameterType, Puzzle,
    R1Counter, Solution, HIT_SUITE_DEX,
};
use crate::puzzle::{PuzzleEngine, SolveJob};
use crate::{Config, Error, Hit, HostIdentity, SeededRng};

/// Handshake state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Unassociated,
    I1Sent,
    I2Sent,
    R2Sent,
    Established,
    Closing,
    Closed,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Unassociated => "UNASSOCIATED",
            State::I1Sent => "I1_SENT",
            State::I2Sent => "I2_SENT",
            State::R2Sent => "R2_SENT",
            State::Established => "ESTABLISHED",
            State::Closing => "CLOSING",
            State::Closed => "CLOSED",
        }
    }

    /// Whether a connection in this state is waiting on the peer and must be
    /// covered by the retransmission sweep.
    pub fn needs_retransmission(&self) -> bool {
        matches!(self, State::I1Sent | State::I2Sent)
    }
}

/// Things a connection wants its engine to do.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LocalEvent {
    Transmit(Vec<u8>),
    StartRetransmission,
    StopRetransmission,
    Connected,
}

/// Engine resources a connection borrows while it handles an event.
pub(crate) struct Context<'a> {
    pub config: &'a Config,
    pub identity: &'a HostIdentity,
    pub puzzles: &'a PuzzleEngine,
    pub rng: &'a mut SeededRng,
    pub now: Instant,
}

/// An R1 accepted in I1_SENT whose puzzle is still being solved.
struct PendingI2 {
    job: SolveJob,
    puzzle: Puzzle,
    keys: KeySet,
    echo: Option<Vec<u8>>,
}

pub(crate) struct Connection {
    state: State,
    local: Hit,
    remote: Hit,
    addr: SocketAddr,

    /// Session keys, provisional until the handshake completes.
    keys: Option<KeySet>,

    /// Cipher picked from the initiator's HIP_CIPHER (responder only).
    cipher: Option<CipherId>,

    /// The single most recently sent packet.
    last_sent: Option<Vec<u8>>,
    last_sent_type: Option<PacketType>,

    pending: Option<PendingI2>,

    /// End of the R2_SENT hold.
    hold_until: Option<Instant>,

    events: VecDeque<LocalEvent>,
}

impl Connection {
    pub fn new(local: Hit, remote: Hit, addr: SocketAddr) -> Self {
        Connection {
            state: State::Unassociated,
            local,
            remote,
            addr,
            keys: None,
            cipher: None,
            last_sent: None,
            last_sent_type: None,
            pending: None,
            hold_until: None,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn keys(&self) -> Option<&KeySet> {
        self.keys.as_ref()
    }

    pub fn cipher(&self) -> Option<CipherId> {
        self.cipher
    }

    /// A puzzle is being solved and wants more time.
    pub fn is_solving(&self) -> bool {
        self.pending.is_some()
    }

    pub fn hold_deadline(&self) -> Option<Instant> {
        self.hold_until
    }

    pub fn poll_event(&mut self) -> Option<LocalEvent> {
        self.events.pop_front()
    }

    /// Send I1. Only allowed from UNASSOCIATED.
    pub fn initiate(&mut self, ctx: &mut Context) -> Result<(), Error> {
        if self.state != State::Unassociated {
            return Err(Error::UsageError(format!(
                "Cannot connect to {} in state {}",
                self.remote,
                self.state.name()
            )));
        }

        let i1 = Packet::new(PacketType::I1, self.local, self.remote)
            .with(Parameter::DhGroupList(our_groups(ctx)));

        self.send(&i1)?;
        self.set_state(State::I1Sent);
        Ok(())
    }

    /// Queue the last sent packet again, if this state retransmits.
    pub fn retransmit(&mut self) -> bool {
        if !self.state.needs_retransmission() || self.pending.is_some() {
            return false;
        }
        let Some(bytes) = &self.last_sent else {
            return false;
        };
        debug!(
            "Retransmit {:?} to {} in {}",
            self.last_sent_type,
            self.remote,
            self.state.name()
        );
        self.events.push_back(LocalEvent::Transmit(bytes.clone()));
        true
    }

    pub fn handle_packet(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        match (self.state, packet.packet_type()) {
            (State::Unassociated, PacketType::I1) => self.process_i1(packet, ctx),
            (State::Unassociated, PacketType::I2) => self.process_i2(packet, ctx),
            (State::I1Sent, PacketType::R1) => self.process_r1(packet, ctx),
            (State::I1Sent, PacketType::I2) => {
                // Peer already has our puzzle from elsewhere. Answer it like an I1.
                self.process_i1(packet, ctx)?;
                self.enter_r2_sent(ctx);
                Ok(())
            }
            (State::I2Sent, PacketType::I2) => {
                if self.local < self.remote {
                    trace!("I2 collision with {}, the larger HIT proceeds", self.remote);
                    return Ok(());
                }
                self.process_i2(packet, ctx)
            }
            (State::I2Sent, PacketType::R2) => self.process_r2(packet, ctx),
            (State::R2Sent, PacketType::I2) => self.process_i2_again(packet, ctx),
            (State::Established, PacketType::I2) => self.process_i2(packet, ctx),
            (state, packet_type) => {
                trace!(
                    "Ignore {:?} from {} in {}",
                    packet_type,
                    self.remote,
                    state.name()
                );
                Ok(())
            }
        }
    }

    /// Expire the R2_SENT hold and advance any puzzle being solved.
    pub fn handle_timeout(&mut self, ctx: &mut Context) -> Result<(), Error> {
        if let Some(at) = self.hold_until {
            if ctx.now >= at {
                self.hold_until = None;
                if self.keys.is_some() {
                    self.set_state(State::Established);
                    self.connected();
                } else {
                    debug!("R2_SENT hold for {} ended without keys", self.remote);
                    self.set_state(State::Unassociated);
                }
            }
        }

        self.step_solve(ctx)
    }

    pub fn close(&mut self) {
        self.set_state(State::Closed);
        self.pending = None;
        self.events.clear();
    }

    fn process_i1(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        packet.check_mandatory()?;

        let ours = ctx.identity.curve().dh_group();
        if let Some(list) = packet.dh_group_list() {
            if !list.contains(ours) {
                return Err(Error::DhGroupMismatch);
            }
        }

        let i = ctx.puzzles.issue_challenge(&self.remote, &self.local, &[])?;
        let opaque: u16 = ctx.rng.random();

        let r1 = Packet::new(PacketType::R1, self.local, self.remote)
            .with(Parameter::R1Counter(R1Counter::new(ctx.puzzles.generation())))
            .with(Parameter::Puzzle(Puzzle::new(
                ctx.puzzles.complexity(),
                i,
                opaque,
            )))
            .with(Parameter::HostId(our_host_id(ctx)))
            .with(Parameter::HitSuiteList(vec![HIT_SUITE_DEX]))
            .with(Parameter::DhGroupList(our_groups(ctx)));

        self.send(&r1)
    }

    fn process_r1(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        if self.pending.is_some() {
            trace!("Ignore R1 from {} while solving", self.remote);
            return Ok(());
        }

        packet.check_mandatory()?;
        check_groups(packet.dh_group_list(), ctx)?;

        let host_id = require(packet, packet.host_id(), ParameterType::HostId)?;
        self.check_host_id(host_id, ctx)?;

        let puzzle = require(packet, packet.puzzle(), ParameterType::Puzzle)?;
        if puzzle.k > ctx.config.max_puzzle_complexity() {
            return Err(Error::SecurityError(format!(
                "Puzzle complexity {} above our max {}",
                puzzle.k,
                ctx.config.max_puzzle_complexity()
            )));
        }

        let shared = shared_secret(ctx, &host_id.public_key)?;
        let keys = ckdf::derive(
            &shared,
            &self.local,
            &self.remote,
            &puzzle.random_i,
            true,
            ctx.config.key_lengths(),
        )?;

        let job = SolveJob::new(&puzzle.random_i, self.local, self.remote, puzzle.k)?;
        debug!(
            "Solving puzzle k={} from {} (generation {:?})",
            puzzle.k,
            self.remote,
            packet.r1_counter().map(|c| c.counter)
        );

        self.pending = Some(PendingI2 {
            job,
            puzzle: puzzle.clone(),
            keys,
            echo: packet.echo_request().map(|e| e.to_vec()),
        });

        Ok(())
    }

    fn step_solve(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let found = match self.pending.as_mut() {
            Some(pending) => pending.job.step(ctx.config.solve_batch(), ctx.rng),
            None => return Ok(()),
        };
        let Some(j) = found else {
            return Ok(());
        };
        let Some(PendingI2 {
            puzzle, keys, echo, ..
        }) = self.pending.take()
        else {
            return Ok(());
        };

        let mut i2 = Packet::new(PacketType::I2, self.local, self.remote)
            .with(Parameter::Solution(Solution {
                k: puzzle.k,
                opaque: puzzle.opaque,
                random_i: puzzle.random_i,
                solution_j: j,
            }))
            .with(Parameter::HipCipher(
                ctx.config.hip_ciphers().iter().copied().collect(),
            ))
            .with(Parameter::EncryptedKey(Vec::new()))
            .with(Parameter::HostId(our_host_id(ctx)))
            .with(Parameter::HipMac3(vec![0; BLOCK_LEN]));
        i2.recalculate_mac(keys.initiator_integrity())?;

        // Not covered by the MAC
        if let Some(echo) = echo {
            i2.push(Parameter::EchoResponseUnsigned(echo));
        }

        self.send(&i2)?;
        self.keys = Some(keys);
        self.set_state(State::I2Sent);
        Ok(())
    }

    /// Validate an I2 and answer it with R2.
    fn process_i2(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        let (keys, cipher) = self.validate_i2(packet, ctx)?;
        self.answer_i2(keys, cipher, ctx)
    }

    /// An I2 while in R2_SENT, most likely a retransmission because our R2 was lost.
    fn process_i2_again(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        let (keys, cipher) = self.validate_i2(packet, ctx)?;

        let same = self.keys.as_ref().is_some_and(|k| k.same_keys(&keys));
        if same && self.last_sent_type == Some(PacketType::R2) {
            if let Some(bytes) = &self.last_sent {
                debug!("Resend R2 to {}", self.remote);
                self.events.push_back(LocalEvent::Transmit(bytes.clone()));
            }
            self.hold_until = Some(ctx.now + ctx.config.r2_sent_hold());
            return Ok(());
        }

        self.answer_i2(keys, cipher, ctx)
    }

    fn validate_i2(&self, packet: &Packet, ctx: &mut Context) -> Result<(KeySet, CipherId), Error> {
        packet.check_mandatory()?;

        let solution = require(packet, packet.solution(), ParameterType::Solution)?;
        let solved = ctx.puzzles.verify(
            &solution.random_i,
            &solution.solution_j,
            &self.remote,
            &self.local,
            ctx.puzzles.complexity(),
            &[],
        );
        if !solved {
            return Err(Error::BadSolution);
        }

        let host_id = require(packet, packet.host_id(), ParameterType::HostId)?;
        self.check_host_id(host_id, ctx)?;

        let shared = shared_secret(ctx, &host_id.public_key)?;
        let keys = ckdf::derive(
            &shared,
            &self.remote,
            &self.local,
            &solution.random_i,
            false,
            ctx.config.key_lengths(),
        )?;

        packet.verify_mac(keys.initiator_integrity())?;

        let offered = require(packet, packet.hip_cipher(), ParameterType::HipCipher)?;
        let cipher = offered
            .select(ctx.config.hip_ciphers())
            .ok_or_else(|| Error::SecurityError("No common HIP cipher".to_string()))?;

        Ok((keys, cipher))
    }

    fn answer_i2(&mut self, keys: KeySet, cipher: CipherId, ctx: &mut Context) -> Result<(), Error> {
        let mut r2 = Packet::new(PacketType::R2, self.local, self.remote)
            .with(Parameter::EncryptedKey(Vec::new()))
            .with(Parameter::DhGroupList(our_groups(ctx)))
            .with(Parameter::HipMac3(vec![0; BLOCK_LEN]));
        r2.recalculate_mac(keys.responder_integrity())?;

        self.send(&r2)?;
        self.keys = Some(keys);
        self.cipher = Some(cipher);
        self.enter_r2_sent(ctx);
        Ok(())
    }

    fn process_r2(&mut self, packet: &Packet, ctx: &mut Context) -> Result<(), Error> {
        packet.check_mandatory()?;
        check_groups(packet.dh_group_list(), ctx)?;

        let Some(keys) = &self.keys else {
            return Err(Error::SecurityError("R2 before keys".to_string()));
        };
        packet.verify_mac(keys.responder_integrity())?;

        self.set_state(State::Established);
        self.connected();
        Ok(())
    }

    fn check_host_id(&self, host_id: &HostId, ctx: &Context) -> Result<(), Error> {
        if host_id.curve != ctx.identity.curve() {
            return Err(Error::DhGroupMismatch);
        }
        if ctx.config.verify_host_identity()
            && Hit::from_public_key(&host_id.public_key)? != self.remote
        {
            return Err(Error::SecurityError(format!(
                "HOST_ID does not match HIT {}",
                self.remote
            )));
        }
        Ok(())
    }

    fn enter_r2_sent(&mut self, ctx: &Context) {
        self.set_state(State::R2Sent);
        self.hold_until = Some(ctx.now + ctx.config.r2_sent_hold());
    }

    fn connected(&mut self) {
        info!("Established with {}", self.remote);
        self.events.push_back(LocalEvent::Connected);
    }

    fn send(&mut self, packet: &Packet) -> Result<(), Error> {
        let bytes = packet.to_bytes()?;
        trace!("Send {:?} to {}", packet.packet_type(), self.remote);
        self.last_sent = Some(bytes.clone());
        self.last_sent_type = Some(packet.packet_type());
        self.events.push_back(LocalEvent::Transmit(bytes));
        Ok(())
    }

    fn set_state(&mut self, next: State) {
        let prev = self.state;
        if prev == next {
            return;
        }
        trace!("{:?} -> {:?}", prev, next);
        self.state = next;

        if prev == State::I1Sent {
            self.pending = None;
        }
        if next != State::R2Sent {
            self.hold_until = None;
        }

        match (prev.needs_retransmission(), next.needs_retransmission()) {
            (false, true) => self.events.push_back(LocalEvent::StartRetransmission),
            (true, false) => self.events.push_back(LocalEvent::StopRetransmission),
            _ => {}
        }
    }
}

fn our_groups(ctx: &Context) -> DhGroupList {
    DhGroupList::single(ctx.identity.curve().dh_group())
}

fn our_host_id(ctx: &Context) -> HostId {
    HostId::new(ctx.identity.curve(), ctx.identity.public_key())
}

/// The peer's DH_GROUP_LIST must include the group of our host identity.
fn check_groups(list: Option<&DhGroupList>, ctx: &Context) -> Result<(), Error> {
    match list {
        Some(list) if list.contains(ctx.identity.curve().dh_group()) => Ok(()),
        _ => Err(Error::DhGroupMismatch),
    }
}

fn require<'p, T>(packet: &Packet, value: Option<&'p T>, ty: ParameterType) -> Result<&'p T, Error> {
    value.ok_or(Error::MissingParameter(packet.packet_type(), ty))
}

fn shared_secret(ctx: &Context, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut out = Zeroizing::new(Vec::new());
    ctx.identity
        .key_pair()
        .derive_shared_secret(peer_public, &mut out)
        .map_err(Error::CryptoError)?;
    Ok(out)
}
