use chess::rules::{find_king_square, is_square_attacked, legal_moves};
use chess::{Game, GamePhase, Position};
use proptest::prelude::*;

/// Play a pseudo-random game by picking `choice % len` among the legal moves
/// at every ply. Stops early when the game ends.
fn playout(choices: &[usize]) -> Game {
    let mut game = Game::new();
    for &choice in choices {
        if matches!(game.phase(), GamePhase::Finished { .. }) {
            break;
        }
        let moves = game.legal_moves();
        if moves.is_empty() {
            break;
        }
        let request = moves[choice % moves.len()].request();
        game.make_move(request).unwrap();
    }
    game
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn legal_moves_never_leave_king_attacked(choices in prop::collection::vec(any::<usize>(), 0..60)) {
        let game = playout(&choices);
        let position = game.position();
        let mover = position.side_to_move();

        for mv in legal_moves(position) {
            let next = chess::rules::apply_move(position, mv.request()).unwrap().0;
            let king = find_king_square(&next, mover);
            prop_assert!(!is_square_attacked(&next, king, mover.opposite()));
        }
    }

    #[test]
    fn replay_reproduces_live_position(choices in prop::collection::vec(any::<usize>(), 0..80)) {
        let game = playout(&choices);
        prop_assert_eq!(&game.replay().unwrap(), game.position());
    }

    #[test]
    fn undo_then_redo_is_identity(
        choices in prop::collection::vec(any::<usize>(), 1..40),
        undos in 0usize..10,
    ) {
        let mut game = playout(&choices);
        for _ in 0..undos {
            game.undo();
        }
        prop_assume!(!game.history().is_empty());

        let position = game.position().clone();
        let history = game.history().to_vec();
        let redo = game.redo_stack().to_vec();

        prop_assert!(game.undo());
        prop_assert!(game.redo());
        prop_assert_eq!(game.position(), &position);
        prop_assert_eq!(game.history(), history.as_slice());
        prop_assert_eq!(game.redo_stack(), redo.as_slice());
    }

    #[test]
    fn fen_roundtrip_after_playout(choices in prop::collection::vec(any::<usize>(), 0..60)) {
        let game = playout(&choices);
        let fen = game.to_fen();
        let parsed = Position::from_fen(&fen).unwrap();
        prop_assert_eq!(parsed.to_fen(), fen);
    }

    #[test]
    fn move_list_rebuilds_same_game(choices in prop::collection::vec(any::<usize>(), 0..50)) {
        let game = playout(&choices);
        let rebuilt = Game::from_move_list(Position::initial(), &game.move_list()).unwrap();
        prop_assert_eq!(rebuilt.position(), game.position());
        prop_assert_eq!(rebuilt.history().len(), game.history().len());
    }
}
