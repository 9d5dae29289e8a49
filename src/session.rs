//! The per-peer game session: one explicit aggregate that owns the link, the
//! boards and every turn flag, advanced once per tick by the main loop.
//!
//! `tick` never blocks. Link events are checked first so a reset always
//! preempts whatever transition was about to happen; after that only the
//! current state touches the inbound queue, and only while it is waiting for
//! a message. A message that arrives early therefore stays queued until the
//! state that expects it polls.

use core::fmt;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::arbitration::{moves_first, ArbitrationError, Arbiter};
use crate::board::{Board, ShotRecord};
use crate::common::{Coord, Orientation, ShotResult};
use crate::config::{
    SessionConfig, GRID_SIZE, SHOW_ALL_PLACED, SHOW_ALREADY_SHOT, SHOW_CONNECTION_FAILURE,
    SHOW_FIRING, SHOW_FIRST_TURN, SHOW_INVALID_PLACEMENT, SHOW_OPPONENT_READY, SHOW_RESULT,
};
use crate::protocol::{Message, Role};
use crate::ship::ship_cells;
use crate::transport::{LinkEvent, LinkStatus, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    /// Waiting for an explicit start before touching the link.
    StartScreen,
    Connecting,
    PlacingShips,
    ArbitratingFirstTurn,
    Shooting,
    Receiving,
    Ended,
}

impl TurnState {
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::StartScreen => "START_SCREEN",
            TurnState::Connecting => "CONNECTING",
            TurnState::PlacingShips => "PLACING_SHIPS",
            TurnState::ArbitratingFirstTurn => "ARBITRATING_FIRST_TURN",
            TurnState::Shooting => "SHOOTING",
            TurnState::Receiving => "RECEIVING",
            TurnState::Ended => "ENDED",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discrete local actions. Only placement and shooting consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    MoveRight,
    MoveDown,
    Rotate,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Our shot sank the opponent's last ship.
    Victory,
    /// The opponent sank our last ship.
    Defeat,
}

/// Transient text for the UI, shown until `until`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub until: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Local quit input.
    Quit,
    /// Acknowledgement of a finished game.
    Acknowledged,
    PeerDisconnected,
    LinkLost,
    Handshake(ArbitrationError),
}

impl ResetReason {
    /// Only locally initiated resets tell the peer; the rest already know.
    fn notifies_peer(&self) -> bool {
        matches!(self, ResetReason::Quit | ResetReason::Acknowledged)
    }

    fn notice(&self) -> Option<&'static str> {
        match self {
            ResetReason::Quit | ResetReason::Acknowledged => None,
            ResetReason::PeerDisconnected => Some("Opponent disconnected."),
            ResetReason::LinkLost => Some("Connection lost."),
            ResetReason::Handshake(ArbitrationError::RoleConflict { .. }) => {
                Some("Connection failed: roles conflict.")
            }
            ResetReason::Handshake(ArbitrationError::Timeout) => Some("Connection timed out."),
        }
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Quit => write!(f, "local quit"),
            ResetReason::Acknowledged => write!(f, "game acknowledged"),
            ResetReason::PeerDisconnected => write!(f, "peer disconnected"),
            ResetReason::LinkLost => write!(f, "link lost"),
            ResetReason::Handshake(e) => write!(f, "{}", e),
        }
    }
}

/// Everything cleared by a reset.
#[derive(Debug, Clone)]
struct Progress {
    role: Option<Role>,
    opening_sent_at: Option<Instant>,
    board: Board,
    shots: ShotRecord,
    /// Coordinates of inbound shots already applied to `board`.
    processed: BTreeSet<Coord>,
    cursor: Coord,
    orientation: Orientation,
    placed_sent: bool,
    peer_placed: bool,
    ready_sent: bool,
    peer_ready: bool,
    /// Result resolved (shooting) or answered (receiving) this turn.
    turn_result: Option<ShotResult>,
    hold_until: Option<Instant>,
    outcome: Option<Outcome>,
    last_peer_seq: Option<u64>,
}

impl Progress {
    fn new(ship_lengths: &[usize]) -> Self {
        Self {
            role: None,
            opening_sent_at: None,
            board: Board::new(ship_lengths),
            shots: ShotRecord::new(),
            processed: BTreeSet::new(),
            cursor: Coord::new(0, 0),
            orientation: Orientation::Horizontal,
            placed_sent: false,
            peer_placed: false,
            ready_sent: false,
            peer_ready: false,
            turn_result: None,
            hold_until: None,
            outcome: None,
            last_peer_seq: None,
        }
    }

    fn hold_elapsed(&self, now: Instant) -> bool {
        self.hold_until.map_or(true, |until| now >= until)
    }
}

/// Read-only view of a session for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: TurnState,
    pub link: LinkStatus,
    pub role: Option<Role>,
    pub cursor: Coord,
    pub orientation: Orientation,
    /// On-grid cells the next ship would occupy at the cursor.
    pub preview: Vec<Coord>,
    pub preview_valid: bool,
    pub board: Board,
    pub shots: ShotRecord,
    pub outcome: Option<Outcome>,
    pub notice: Option<String>,
}

pub struct Session<T: Transport> {
    config: SessionConfig,
    transport: T,
    arbiter: Box<dyn Arbiter>,
    state: TurnState,
    progress: Progress,
    notice: Option<Notice>,
}

impl<T: Transport> Session<T> {
    /// Create a session. Without a start screen the link opens right away.
    pub fn new(transport: T, arbiter: Box<dyn Arbiter>, config: SessionConfig) -> Self {
        let progress = Progress::new(&config.ship_lengths);
        let mut session = Self {
            config,
            transport,
            arbiter,
            state: TurnState::StartScreen,
            progress,
            notice: None,
        };
        if !session.config.start_screen {
            session.transport.open();
            session.state = TurnState::Connecting;
        }
        session
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Role confirmed by arbitration, once past `CONNECTING`.
    pub fn role(&self) -> Option<Role> {
        self.progress.role
    }

    pub fn board(&self) -> &Board {
        &self.progress.board
    }

    pub fn shots(&self) -> &ShotRecord {
        &self.progress.shots
    }

    pub fn processed(&self) -> &BTreeSet<Coord> {
        &self.progress.processed
    }

    pub fn cursor(&self) -> Coord {
        self.progress.cursor
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.progress.outcome
    }

    /// Sequence number of the most recent message read from the peer.
    pub fn last_peer_seq(&self) -> Option<u64> {
        self.progress.last_peer_seq
    }

    pub fn arbiter_name(&self) -> &'static str {
        self.arbiter.name()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Current notice text, if it has not expired.
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| now < n.until)
            .map(|n| n.text.as_str())
    }

    /// Leave the start screen and begin connecting.
    pub fn start(&mut self) -> bool {
        if self.state != TurnState::StartScreen {
            return false;
        }
        self.transport.open();
        self.enter(TurnState::Connecting);
        true
    }

    /// Local quit: tell the peer, then reset.
    pub fn request_reset(&mut self, now: Instant) {
        self.reset(now, ResetReason::Quit);
    }

    /// Local exit: tell the peer and close the link without reopening it.
    /// The session is left on the start screen; `start` reconnects.
    pub fn shutdown(&mut self, now: Instant) {
        self.teardown(now, ResetReason::Quit);
        self.enter(TurnState::StartScreen);
    }

    /// Dismiss a finished game. Ignored before `ENDED`.
    pub fn acknowledge(&mut self, now: Instant) -> bool {
        if self.state != TurnState::Ended {
            return false;
        }
        self.reset(now, ResetReason::Acknowledged);
        true
    }

    /// Advance the session by one tick.
    pub fn tick(&mut self, now: Instant, inputs: &[Input]) -> TurnState {
        if let Some(event) = self.transport.take_event() {
            let reason = match event {
                LinkEvent::PeerDisconnected => ResetReason::PeerDisconnected,
                LinkEvent::Lost => ResetReason::LinkLost,
            };
            self.reset(now, reason);
            return self.state;
        }
        match self.state {
            TurnState::StartScreen | TurnState::Ended => {}
            TurnState::Connecting => self.connecting(now),
            TurnState::PlacingShips => self.placing(now, inputs),
            TurnState::ArbitratingFirstTurn => self.arbitrating(now),
            TurnState::Shooting => self.shooting(now, inputs),
            TurnState::Receiving => self.receiving(now),
        }
        self.state
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        let p = &self.progress;
        let (preview, preview_valid) = match (self.state, p.board.next_length()) {
            (TurnState::PlacingShips, Some(length)) => {
                let cells = ship_cells(p.cursor, length, p.orientation)
                    .into_iter()
                    .filter(|(x, y)| *x < GRID_SIZE && *y < GRID_SIZE)
                    .map(|(x, y)| Coord::new(x as u8, y as u8))
                    .collect();
                let valid = p
                    .board
                    .check_placement(p.cursor, length, p.orientation)
                    .is_ok();
                (cells, valid)
            }
            _ => (Vec::new(), false),
        };
        SessionSnapshot {
            state: self.state,
            link: self.transport.status(),
            role: p.role,
            cursor: p.cursor,
            orientation: p.orientation,
            preview,
            preview_valid,
            board: p.board.clone(),
            shots: p.shots.clone(),
            outcome: p.outcome,
            notice: self.notice(now).map(str::to_owned),
        }
    }

    fn enter(&mut self, next: TurnState) {
        info!("{} -> {}", self.state, next);
        self.state = next;
    }

    fn show(&mut self, now: Instant, text: impl Into<String>, duration: Duration) {
        self.notice = Some(Notice {
            text: text.into(),
            until: now + duration,
        });
    }

    fn poll(&mut self) -> Option<Message> {
        let envelope = self.transport.try_receive()?;
        self.progress.last_peer_seq = Some(envelope.seq);
        Some(envelope.message)
    }

    fn move_cursor(&mut self, input: Input) {
        let n = GRID_SIZE as u8;
        let c = self.progress.cursor;
        self.progress.cursor = match input {
            Input::MoveRight => Coord::new((c.x + 1) % n, c.y),
            Input::MoveDown => Coord::new(c.x, (c.y + 1) % n),
            _ => c,
        };
    }

    fn reset(&mut self, now: Instant, reason: ResetReason) {
        self.teardown(now, reason);
        if self.config.start_screen {
            self.enter(TurnState::StartScreen);
        } else {
            self.transport.open();
            self.enter(TurnState::Connecting);
        }
    }

    fn teardown(&mut self, now: Instant, reason: ResetReason) {
        info!("session reset from {}: {}", self.state, reason);
        if reason.notifies_peer() && self.transport.send(Message::Disconnect).is_none() {
            debug!("DISCONNECT not sent; link already down");
        }
        self.transport.close();
        self.progress = Progress::new(&self.config.ship_lengths);
        self.notice = None;
        if let Some(text) = reason.notice() {
            self.show(now, text, SHOW_CONNECTION_FAILURE);
        }
    }

    fn connecting(&mut self, now: Instant) {
        if self.transport.status() != LinkStatus::Connected {
            return;
        }
        let sent_at = match self.progress.opening_sent_at {
            Some(at) => at,
            None => {
                let opening = self.arbiter.opening();
                if self.transport.send(opening).is_none() {
                    return;
                }
                debug!("{} arbitration: sent {}", self.arbiter.name(), opening.kind());
                self.progress.opening_sent_at = Some(now);
                now
            }
        };
        while let Some(message) = self.poll() {
            match self.arbiter.on_message(&message) {
                Some(Ok(role)) => {
                    info!("{} arbitration confirmed role {}", self.arbiter.name(), role);
                    let last_peer_seq = self.progress.last_peer_seq;
                    self.progress = Progress {
                        role: Some(role),
                        last_peer_seq,
                        ..Progress::new(&self.config.ship_lengths)
                    };
                    self.enter(TurnState::PlacingShips);
                    return;
                }
                Some(Err(e)) => {
                    warn!("{} arbitration failed: {}", self.arbiter.name(), e);
                    self.reset(now, ResetReason::Handshake(e));
                    return;
                }
                None => debug!("ignoring {} while connecting", message.kind()),
            }
        }
        if self.arbiter.times_out()
            && now.saturating_duration_since(sent_at) >= self.config.handshake_timeout()
        {
            warn!("{} arbitration timed out", self.arbiter.name());
            self.reset(now, ResetReason::Handshake(ArbitrationError::Timeout));
        }
    }

    fn placing(&mut self, now: Instant, inputs: &[Input]) {
        for &input in inputs {
            if self.progress.board.is_placement_complete() {
                break;
            }
            match input {
                Input::MoveRight | Input::MoveDown => self.move_cursor(input),
                Input::Rotate => self.progress.orientation = self.progress.orientation.toggled(),
                Input::Confirm => self.place_at_cursor(now),
            }
        }

        if self.progress.board.is_placement_complete() && !self.progress.placed_sent {
            self.progress.placed_sent = self.transport.send(Message::ShipsPlaced).is_some();
        }

        if !self.progress.peer_placed {
            while let Some(message) = self.poll() {
                if message == Message::ShipsPlaced {
                    self.progress.peer_placed = true;
                    self.show(now, "Opponent is ready!", SHOW_OPPONENT_READY);
                    break;
                }
                debug!("ignoring {} while placing ships", message.kind());
            }
        }

        if self.progress.placed_sent && self.progress.peer_placed {
            self.enter(TurnState::ArbitratingFirstTurn);
        }
    }

    fn place_at_cursor(&mut self, now: Instant) {
        let p = &mut self.progress;
        match p.board.place_next(p.cursor, p.orientation) {
            Ok(id) => {
                debug!("placed ship {} at {} {:?}", id, p.cursor, p.orientation);
                p.orientation = Orientation::Horizontal;
                if p.board.is_placement_complete() {
                    self.show(now, "All ships placed. Waiting for opponent.", SHOW_ALL_PLACED);
                }
            }
            Err(e) => {
                debug!("placement at {} rejected: {}", p.cursor, e);
                self.show(
                    now,
                    "Invalid placement (overlap or out of bounds).",
                    SHOW_INVALID_PLACEMENT,
                );
            }
        }
    }

    fn arbitrating(&mut self, now: Instant) {
        if !self.progress.ready_sent {
            self.progress.ready_sent = self.transport.send(Message::ReadyToStart).is_some();
        }
        if !self.progress.peer_ready {
            while let Some(message) = self.poll() {
                if message == Message::ReadyToStart {
                    self.progress.peer_ready = true;
                    break;
                }
                debug!("ignoring {} while arbitrating first turn", message.kind());
            }
        }
        if !(self.progress.ready_sent && self.progress.peer_ready) {
            return;
        }
        if self.progress.role.is_some_and(moves_first) {
            self.show(now, "You are Master. You go first!", SHOW_FIRST_TURN);
            self.enter(TurnState::Shooting);
        } else {
            self.show(now, "Opponent is Master. They go first.", SHOW_FIRST_TURN);
            self.enter(TurnState::Receiving);
        }
    }

    fn shooting(&mut self, now: Instant, inputs: &[Input]) {
        for &input in inputs {
            match input {
                Input::MoveRight | Input::MoveDown => self.move_cursor(input),
                Input::Rotate => {}
                Input::Confirm => self.fire(now),
            }
        }

        if self.progress.turn_result.is_none() && self.progress.shots.pending().is_some() {
            while let Some(message) = self.poll() {
                match message {
                    Message::ShotResult { coord, result } => {
                        if self.progress.shots.resolve(coord, result) {
                            self.progress.turn_result = Some(result);
                            self.progress.hold_until = Some(now + self.config.result_hold());
                            self.show(now, format!("Result: {} at {}", result, coord), SHOW_RESULT);
                            break;
                        }
                        debug!("ignoring stray SHOT_RESULT for {}", coord);
                    }
                    other => debug!("ignoring {} while awaiting SHOT_RESULT", other.kind()),
                }
            }
        }

        let Some(result) = self.progress.turn_result else {
            return;
        };
        if !self.progress.hold_elapsed(now) {
            return;
        }
        self.progress.turn_result = None;
        self.progress.hold_until = None;
        if result == ShotResult::AllSunk {
            self.progress.outcome = Some(Outcome::Victory);
            self.enter(TurnState::Ended);
        } else {
            self.enter(TurnState::Receiving);
        }
    }

    fn fire(&mut self, now: Instant) {
        if self.progress.shots.pending().is_some() || self.progress.turn_result.is_some() {
            return;
        }
        let target = self.progress.cursor;
        if self.progress.shots.contains(target) {
            debug!("already fired at {}", target);
            self.show(now, "Already shot here!", SHOW_ALREADY_SHOT);
            return;
        }
        if self.transport.send(Message::Shot { coord: target }).is_none() {
            return;
        }
        if let Err(e) = self.progress.shots.fire(target) {
            debug!("shot record rejected {}: {}", target, e);
        }
        self.show(now, format!("Firing shot at {}...", target), SHOW_FIRING);
    }

    fn receiving(&mut self, now: Instant) {
        if self.progress.turn_result.is_none() {
            while let Some(message) = self.poll() {
                match message {
                    Message::Shot { coord } => {
                        if !self.progress.processed.insert(coord) {
                            debug!("ignoring duplicate SHOT at {}", coord);
                            continue;
                        }
                        let result = self.progress.board.receive_shot(coord);
                        if self
                            .transport
                            .send(Message::ShotResult { coord, result })
                            .is_none()
                        {
                            debug!("SHOT_RESULT for {} not sent; link down", coord);
                        }
                        self.progress.turn_result = Some(result);
                        self.progress.hold_until = Some(now + self.config.result_hold());
                        self.show(
                            now,
                            format!("Enemy shot at {}. Result: {}.", coord, result),
                            SHOW_RESULT,
                        );
                        break;
                    }
                    other => debug!("ignoring {} while awaiting SHOT", other.kind()),
                }
            }
        }

        if self.progress.turn_result.is_none() || !self.progress.hold_elapsed(now) {
            return;
        }
        self.progress.turn_result = None;
        self.progress.hold_until = None;
        if self.progress.board.is_game_over() {
            self.progress.outcome = Some(Outcome::Defeat);
            self.enter(TurnState::Ended);
        } else {
            self.enter(TurnState::Shooting);
        }
    }
}
