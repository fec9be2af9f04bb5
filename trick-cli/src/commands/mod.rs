//! CLI command implementations.

pub mod replay;
pub mod reset;
pub mod simulate;

use serde::Serialize;
use trick_types::{GameState, PlayerId};

/// Print a state summary the way every command reports it.
pub fn print_state(state: &GameState) {
    println!("  Phase:  {}", state.phase);
    if state.rounds_total > 0 {
        println!("  Round:  {}/{}", state.round, state.rounds_total);
    }
    if !state.scores.is_empty() {
        println!("  Scores:");
        for (player, score) in &state.scores {
            println!("    seat {}: {}", player.seat(), score);
        }
    }
}

/// Scores keyed by seat number, for JSON output.
#[derive(Debug, Serialize)]
pub struct SeatScore {
    pub seat: u8,
    pub score: i32,
}

pub fn seat_scores(state: &GameState) -> Vec<SeatScore> {
    state
        .scores
        .iter()
        .map(|(player, score): (&PlayerId, &i32)| SeatScore {
            seat: player.seat(),
            score: *score,
        })
        .collect()
}
