use battleship_link::{Board, BoardError, Coord, Orientation, ShotRecord, ShotResult};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn cells(board: &Board) -> Vec<Coord> {
    board.occupied().cells().collect()
}

#[test]
fn test_scenario_a_overlap_rejected() {
    let mut board = Board::new(&[3, 2]);
    assert_eq!(
        board.place_ship(Coord::new(0, 0), 3, Orientation::Horizontal),
        Ok(0)
    );
    assert_eq!(
        cells(&board),
        vec![Coord::new(0, 0), Coord::new(1, 0), Coord::new(2, 0)]
    );
    assert_eq!(
        board.place_ship(Coord::new(0, 0), 2, Orientation::Vertical),
        Err(BoardError::Overlaps)
    );
    assert_eq!(board.ships().len(), 1);
    assert_eq!(board.next_length(), Some(2));
}

#[test]
fn test_out_of_bounds_rejected() {
    let mut board = Board::standard();
    assert_eq!(
        board.place_next(Coord::new(3, 0), Orientation::Horizontal),
        Err(BoardError::OutOfBounds)
    );
    assert_eq!(
        board.place_next(Coord::new(0, 3), Orientation::Vertical),
        Err(BoardError::OutOfBounds)
    );
    assert!(board.ships().is_empty());
    assert_eq!(board.place_next(Coord::new(2, 0), Orientation::Horizontal), Ok(0));
}

#[test]
fn test_placement_completes_in_order() {
    let mut board = Board::standard();
    board
        .place_next(Coord::new(0, 0), Orientation::Vertical)
        .unwrap();
    assert!(!board.is_placement_complete());
    board
        .place_next(Coord::new(3, 4), Orientation::Horizontal)
        .unwrap();
    assert!(board.is_placement_complete());
    assert_eq!(board.next_length(), None);
    assert_eq!(board.ships()[0].len(), 3);
    assert_eq!(board.ships()[1].len(), 2);
    assert_eq!(
        board.place_next(Coord::new(4, 0), Orientation::Vertical),
        Err(BoardError::PlacementComplete)
    );
}

#[test]
fn test_scenario_b_sunk_then_all_sunk() {
    let mut board = Board::standard();
    board
        .place_next(Coord::new(0, 0), Orientation::Horizontal)
        .unwrap();
    board
        .place_next(Coord::new(4, 3), Orientation::Vertical)
        .unwrap();

    assert_eq!(board.receive_shot(Coord::new(0, 0)), ShotResult::Hit);
    assert_eq!(board.receive_shot(Coord::new(1, 0)), ShotResult::Hit);
    assert_eq!(board.receive_shot(Coord::new(2, 0)), ShotResult::Sunk);
    assert!(board.ships()[0].is_sunk());
    assert!(!board.is_game_over());

    assert_eq!(board.receive_shot(Coord::new(3, 3)), ShotResult::Miss);
    assert_eq!(board.receive_shot(Coord::new(4, 3)), ShotResult::Hit);
    assert_eq!(board.receive_shot(Coord::new(4, 4)), ShotResult::AllSunk);
    assert!(board.is_game_over());
}

#[test]
fn test_receive_shot_is_idempotent() {
    let mut board = Board::standard();
    board
        .place_next(Coord::new(1, 1), Orientation::Vertical)
        .unwrap();
    assert_eq!(board.receive_shot(Coord::new(1, 1)), ShotResult::Hit);
    let before = board.clone();
    assert_eq!(board.receive_shot(Coord::new(1, 1)), ShotResult::Hit);
    assert_eq!(board, before);
    assert_eq!(board.part_at(Coord::new(1, 1)), Some((0, true)));
}

#[test]
fn test_off_grid_shot_is_a_miss() {
    let mut board = Board::standard();
    board
        .place_next(Coord::new(0, 0), Orientation::Horizontal)
        .unwrap();
    assert_eq!(board.receive_shot(Coord::new(9, 9)), ShotResult::Miss);
}

#[test]
fn test_random_placement_fits() {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut board = Board::standard();
    while let Some(length) = board.next_length() {
        let (origin, orientation) = board.random_placement(&mut rng, length).unwrap();
        board.place_ship(origin, length, orientation).unwrap();
    }
    assert_eq!(board.occupied().count_ones(), 5);
}

#[test]
fn test_shot_record_single_pending() {
    let mut shots = ShotRecord::new();
    shots.fire(Coord::new(2, 2)).unwrap();
    assert_eq!(shots.fire(Coord::new(3, 3)), Err(BoardError::ShotPending));
    assert_eq!(shots.get(Coord::new(2, 2)), Some(None));

    assert!(!shots.resolve(Coord::new(1, 1), ShotResult::Hit));
    assert_eq!(shots.pending(), Some(Coord::new(2, 2)));
    assert!(shots.resolve(Coord::new(2, 2), ShotResult::Miss));
    assert_eq!(shots.pending(), None);
    assert_eq!(shots.get(Coord::new(2, 2)), Some(Some(ShotResult::Miss)));

    assert_eq!(shots.fire(Coord::new(2, 2)), Err(BoardError::AlreadyShot));
    assert_eq!(shots.len(), 1);
}
