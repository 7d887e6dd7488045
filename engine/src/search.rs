//! Fixed-depth minimax with alpha-beta pruning.
//!
//! Every branch works on its own `Position` value, so searches never share
//! mutable state and can run concurrently.

use chess::rules::{apply_move, legal_moves, successors};
use chess::{Move, PieceColor, Position};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::eval::evaluate;

/// Pick a move for the side to move, searching `depth` plies counting the
/// root move. Depths 0 and 1 both rank root moves by the static evaluation
/// of the position each one leads to. Returns `None` when there are no legal
/// moves.
pub fn best_move(position: &Position, depth: u32) -> Option<Move> {
    best_move_with_rng(position, depth, &mut rand::thread_rng())
}

/// Same as [`best_move`], with the root shuffle driven by `rng`.
pub fn best_move_with_rng<R: Rng + ?Sized>(
    position: &Position,
    depth: u32,
    rng: &mut R,
) -> Option<Move> {
    let mut moves = legal_moves(position);
    moves.shuffle(rng);

    let maximizing = position.side_to_move() == PieceColor::White;
    let mut alpha = f64::NEG_INFINITY;
    let mut beta = f64::INFINITY;
    let mut best: Option<(f64, Move)> = None;

    for mv in moves {
        let Ok((child, _)) = apply_move(position, mv.request()) else {
            continue;
        };
        let score = search(&child, depth.saturating_sub(1), alpha, beta, !maximizing);

        // Strict improvement only: the first move reaching the best score wins.
        let improves = match &best {
            None => true,
            Some((best_score, _)) if maximizing => score > *best_score,
            Some((best_score, _)) => score < *best_score,
        };
        if improves {
            best = Some((score, mv));
        }

        if maximizing {
            alpha = alpha.max(score);
        } else {
            beta = beta.min(score);
        }
    }

    if let Some((score, mv)) = &best {
        tracing::debug!(%mv, score, depth, "Advisor picked move");
    }
    best.map(|(_, mv)| mv)
}

/// Minimax value of `position`. White maximizes, Black minimizes.
pub fn search(position: &Position, depth: u32, mut alpha: f64, mut beta: f64, maximizing: bool) -> f64 {
    if depth == 0 {
        return evaluate(position);
    }

    let children = successors(position);
    if children.is_empty() {
        return evaluate(position);
    }

    if maximizing {
        let mut value = f64::NEG_INFINITY;
        for (_, child) in &children {
            value = value.max(search(child, depth - 1, alpha, beta, false));
            alpha = alpha.max(value);
            if beta <= alpha {
                break;
            }
        }
        value
    } else {
        let mut value = f64::INFINITY;
        for (_, child) in &children {
            value = value.min(search(child, depth - 1, alpha, beta, true));
            beta = beta.min(value);
            if beta <= alpha {
                break;
            }
        }
        value
    }
}
