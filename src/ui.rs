//! Plain-text rendering of a [`SessionSnapshot`].

use std::fmt::Write;

use crate::common::{Coord, ShotResult};
use crate::config::GRID_SIZE;
use crate::session::{Outcome, SessionSnapshot, TurnState};

fn own_cell(snapshot: &SessionSnapshot, coord: Coord) -> char {
    if snapshot.preview.contains(&coord) {
        return if snapshot.preview_valid { '+' } else { '!' };
    }
    match (snapshot.board.part_at(coord), snapshot.board.received().get(&coord)) {
        (Some((_, true)), _) => 'X',
        (Some((_, false)), _) => 'S',
        (None, Some(_)) => 'o',
        (None, None) => '.',
    }
}

fn target_cell(snapshot: &SessionSnapshot, coord: Coord) -> char {
    match snapshot.shots.get(coord) {
        None => '.',
        Some(None) => '?',
        Some(Some(ShotResult::Miss)) => 'o',
        Some(Some(ShotResult::Hit)) => 'X',
        Some(Some(ShotResult::Sunk | ShotResult::AllSunk)) => '#',
    }
}

/// Draw the own board and the target grid side by side, with the cursor
/// bracketed on whichever grid currently takes input.
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let role = snapshot
        .role
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    let _ = writeln!(
        out,
        "[{}] role: {}  link: {:?}",
        snapshot.state, role, snapshot.link
    );

    let cursor_own = snapshot.state == TurnState::PlacingShips;
    let cursor_target = snapshot.state == TurnState::Shooting;
    let header: String = (0..GRID_SIZE).map(|x| format!(" {} ", x)).collect();
    let _ = writeln!(out, "   {}     {}", header, header);
    for y in 0..GRID_SIZE {
        let mut own = String::new();
        let mut target = String::new();
        for x in 0..GRID_SIZE {
            let coord = Coord::new(x as u8, y as u8);
            let on_cursor = snapshot.cursor == coord;
            own.push_str(&cell(own_cell(snapshot, coord), cursor_own && on_cursor));
            target.push_str(&cell(target_cell(snapshot, coord), cursor_target && on_cursor));
        }
        let _ = writeln!(out, "{:2} {}  {:2} {}", y, own, y, target);
    }

    if let Some(outcome) = snapshot.outcome {
        let text = match outcome {
            Outcome::Victory => "You win!",
            Outcome::Defeat => "You lose.",
        };
        let _ = writeln!(out, "{}", text);
    }
    if let Some(notice) = &snapshot.notice {
        let _ = writeln!(out, "> {}", notice);
    }
    out
}

fn cell(c: char, cursor: bool) -> String {
    if cursor {
        format!("[{}]", c)
    } else {
        format!(" {} ", c)
    }
}

/// Key bindings accepted by the terminal front end.
pub const HELP: &str = "d: right  s: down  r: rotate  f: confirm  q: quit/reset  enter on start/end screen: continue";
