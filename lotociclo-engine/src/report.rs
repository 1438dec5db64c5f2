use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lotociclo_db::models::POOL_SIZE;

use crate::cycle::{Cycle, CycleStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleAnalysis {
    pub cycle_id: String,
    pub start_date: DateTime<Utc>,
    pub start_draw_number: u32,
    pub target_numbers: Vec<u8>,
    pub drawn_numbers: Vec<u8>,
    pub pending_numbers: Vec<u8>,
    pub progress_percent: f64,
    pub draws_processed_count: usize,
    pub average_draws_per_number: f64,
    pub estimated_draws_remaining: f64,
    pub status: CycleStatus,
}

/// Progression et estimation de fermeture du cycle.
///
/// The average counts, for each drawn number, the draws elapsed between the
/// cycle start and the draw that first hit it. Without any hit yet the
/// estimate falls back to two draws per pending number.
pub fn analyze_cycle(cycle: &Cycle) -> CycleAnalysis {
    let drawn: Vec<u8> = cycle.drawn_numbers().iter().copied().collect();
    let pending = cycle.pending_numbers();
    let k = cycle.target_numbers().len();

    let progress_percent = if k == 0 {
        0.0
    } else {
        drawn.len() as f64 / k as f64 * 100.0
    };

    let elapsed: Vec<u32> = drawn
        .iter()
        .filter_map(|n| {
            cycle
                .draws_processed()
                .iter()
                .find(|a| a.target_hits.contains(n))
                .map(|a| a.draw_number - cycle.start_draw_number())
        })
        .collect();
    let average_draws_per_number = if elapsed.is_empty() {
        0.0
    } else {
        elapsed.iter().sum::<u32>() as f64 / elapsed.len() as f64
    };

    let estimated_draws_remaining = if !pending.is_empty() && average_draws_per_number > 0.0 {
        average_draws_per_number * pending.len() as f64
    } else {
        pending.len() as f64 * 2.0
    };

    CycleAnalysis {
        cycle_id: cycle.id().to_string(),
        start_date: cycle.start_date(),
        start_draw_number: cycle.start_draw_number(),
        target_numbers: cycle.target_numbers().to_vec(),
        drawn_numbers: drawn,
        pending_numbers: pending,
        progress_percent,
        draws_processed_count: cycle.draws_processed().len(),
        average_draws_per_number,
        estimated_draws_remaining,
        status: cycle.status(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberState {
    OutsideCycle,
    Pending,
    Drawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberCell {
    pub number: u8,
    pub state: NumberState,
}

/// Les 25 dezenas, dans l'ordre, avec leur état dans le cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleBoard {
    pub cycle_id: String,
    pub start_draw_number: u32,
    pub cells: Vec<NumberCell>,
}

impl CycleBoard {
    pub fn numbers_in(&self, state: NumberState) -> Vec<u8> {
        self.cells.iter().filter(|c| c.state == state).map(|c| c.number).collect()
    }
}

pub fn cycle_board(cycle: &Cycle) -> CycleBoard {
    let cells = (1..=POOL_SIZE)
        .map(|number| {
            let state = if !cycle.target_numbers().contains(&number) {
                NumberState::OutsideCycle
            } else if cycle.drawn_numbers().contains(&number) {
                NumberState::Drawn
            } else {
                NumberState::Pending
            };
            NumberCell { number, state }
        })
        .collect();

    CycleBoard {
        cycle_id: cycle.id().to_string(),
        start_draw_number: cycle.start_draw_number(),
        cells,
    }
}
