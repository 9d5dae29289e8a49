use std::collections::BTreeSet;

use battleship_link::{Board, Coord, Orientation, ShotResult, DEFAULT_SHIPS, GRID_SIZE};
use proptest::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};

fn random_board(seed: u64) -> Board {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut board = Board::new(&DEFAULT_SHIPS);
    while let Some(length) = board.next_length() {
        let (origin, orientation) = board.random_placement(&mut rng, length).unwrap();
        board.place_ship(origin, length, orientation).unwrap();
    }
    board
}

fn coord() -> impl Strategy<Value = Coord> {
    (0..GRID_SIZE as u8, 0..GRID_SIZE as u8).prop_map(|(x, y)| Coord::new(x, y))
}

fn orientation() -> impl Strategy<Value = Orientation> {
    prop_oneof![Just(Orientation::Horizontal), Just(Orientation::Vertical)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn occupied_is_disjoint_union(attempts in prop::collection::vec((coord(), orientation()), 1..12)) {
        let mut board = Board::new(&DEFAULT_SHIPS);
        for (origin, orientation) in attempts {
            let _ = board.place_next(origin, orientation);
        }
        let mut union = BTreeSet::new();
        let mut total = 0;
        for ship in board.ships() {
            for part in ship.parts() {
                union.insert(part.coord);
                total += 1;
            }
        }
        prop_assert_eq!(union.len(), total);
        let occupied: BTreeSet<Coord> = board.occupied().cells().collect();
        prop_assert_eq!(occupied, union);
    }

    #[test]
    fn receive_shot_idempotent(seed in any::<u64>(), target in coord()) {
        let mut board = random_board(seed);
        let first = board.receive_shot(target);
        let after = board.clone();
        prop_assert_eq!(board.receive_shot(target), first);
        prop_assert_eq!(board, after);
    }

    #[test]
    fn sunk_iff_all_parts_hit(seed in any::<u64>(), shots in prop::collection::vec(coord(), 0..30)) {
        let mut board = random_board(seed);
        let mut last = None;
        for target in shots {
            last = Some(board.receive_shot(target));
        }
        for ship in board.ships() {
            prop_assert_eq!(ship.is_sunk(), ship.parts().iter().all(|p| p.hit));
        }
        let all_sunk = board.ships().iter().all(|s| s.is_sunk());
        prop_assert_eq!(board.is_game_over(), all_sunk);
        if all_sunk {
            let finals = board.received().values().filter(|r| **r == ShotResult::AllSunk).count();
            prop_assert_eq!(finals, 1);
            prop_assert!(last.is_some());
        }
    }
}
