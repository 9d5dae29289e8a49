//! Scripted player that drives a session through its ordinary inputs.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::arbitration::HandshakeArbiter;
use crate::common::{Coord, ShotResult};
use crate::config::{SessionConfig, GRID_SIZE};
use crate::protocol::Role;
use crate::session::{Input, Outcome, Session, SessionSnapshot, TurnState};
use crate::transport::in_memory::LoopbackTransport;

/// Places ships at random and hunts for targets, steering the cursor with
/// the same `Input`s a human would send.
pub struct Autopilot<R: Rng> {
    rng: R,
}

impl Autopilot<SmallRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        let mut seed_rng = rand::rng();
        Self::new(SmallRng::from_rng(&mut seed_rng))
    }
}

impl<R: Rng> Autopilot<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Inputs for the next tick given the current view of the session.
    pub fn next_inputs(&mut self, snapshot: &SessionSnapshot) -> Vec<Input> {
        match snapshot.state {
            TurnState::PlacingShips => self.place(snapshot),
            TurnState::Shooting if snapshot.shots.pending().is_none() => self.shoot(snapshot),
            _ => Vec::new(),
        }
    }

    fn place(&mut self, snapshot: &SessionSnapshot) -> Vec<Input> {
        let Some(length) = snapshot.board.next_length() else {
            return Vec::new();
        };
        let Ok((origin, orientation)) = snapshot.board.random_placement(&mut self.rng, length)
        else {
            return Vec::new();
        };
        let mut inputs = walk(snapshot.cursor, origin);
        if orientation != snapshot.orientation {
            inputs.push(Input::Rotate);
        }
        inputs.push(Input::Confirm);
        inputs
    }

    fn shoot(&mut self, snapshot: &SessionSnapshot) -> Vec<Input> {
        let Some(target) = self.pick_target(snapshot) else {
            return Vec::new();
        };
        let mut inputs = walk(snapshot.cursor, target);
        inputs.push(Input::Confirm);
        inputs
    }

    /// Untried cells next to an unsunk hit first, otherwise any untried cell.
    fn pick_target(&mut self, snapshot: &SessionSnapshot) -> Option<Coord> {
        let untried: Vec<Coord> = (0..GRID_SIZE as u8)
            .flat_map(|y| (0..GRID_SIZE as u8).map(move |x| Coord::new(x, y)))
            .filter(|c| !snapshot.shots.contains(*c))
            .collect();
        let hits: Vec<Coord> = snapshot
            .shots
            .iter()
            .filter(|(_, r)| *r == Some(ShotResult::Hit))
            .map(|(c, _)| c)
            .collect();
        let near_hits: Vec<Coord> = untried
            .iter()
            .copied()
            .filter(|c| hits.iter().any(|h| adjacent(*h, *c)))
            .collect();
        let pool = if near_hits.is_empty() { &untried } else { &near_hits };
        pool.choose(&mut self.rng).copied()
    }
}

fn adjacent(a: Coord, b: Coord) -> bool {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y) == 1
}

/// Cursor moves that take `from` to `to` on the wrapping grid.
pub fn walk(from: Coord, to: Coord) -> Vec<Input> {
    let n = GRID_SIZE as u8;
    let rights = (to.x + n - from.x) % n;
    let downs = (to.y + n - from.y) % n;
    let mut inputs = vec![Input::MoveRight; rights as usize];
    inputs.extend(std::iter::repeat(Input::MoveDown).take(downs as usize));
    inputs
}

/// Result of a headless autopilot-vs-autopilot match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub ticks: u64,
    pub master: Option<Outcome>,
    pub slave: Option<Outcome>,
    pub master_shots: usize,
    pub slave_shots: usize,
}

impl MatchReport {
    pub fn winner(&self) -> Option<Role> {
        match (self.master, self.slave) {
            (Some(Outcome::Victory), Some(Outcome::Defeat)) => Some(Role::Master),
            (Some(Outcome::Defeat), Some(Outcome::Victory)) => Some(Role::Slave),
            _ => None,
        }
    }
}

/// Play two autopilots against each other over a loopback pair, advancing a
/// virtual clock by `step` per tick so presentation holds cost no real time.
pub fn run_match(seeds: (u64, u64), config: &SessionConfig, step: Duration, max_ticks: u64) -> MatchReport {
    let (a, b) = LoopbackTransport::pair();
    let mut master = Session::new(
        a,
        Box::new(HandshakeArbiter::new(Role::Master)),
        config.clone(),
    );
    let mut slave = Session::new(
        b,
        Box::new(HandshakeArbiter::new(Role::Slave)),
        config.clone(),
    );
    master.start();
    slave.start();
    let mut master_pilot = Autopilot::seeded(seeds.0);
    let mut slave_pilot = Autopilot::seeded(seeds.1);

    let mut now = Instant::now();
    let mut ticks = 0;
    while ticks < max_ticks {
        ticks += 1;
        now += step;
        let inputs = master_pilot.next_inputs(&master.snapshot(now));
        master.tick(now, &inputs);
        let inputs = slave_pilot.next_inputs(&slave.snapshot(now));
        slave.tick(now, &inputs);
        if master.state() == TurnState::Ended && slave.state() == TurnState::Ended {
            break;
        }
    }
    MatchReport {
        ticks,
        master: master.outcome(),
        slave: slave.outcome(),
        master_shots: master.shots().len(),
        slave_shots: slave.shots().len(),
    }
}
