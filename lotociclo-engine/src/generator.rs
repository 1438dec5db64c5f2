use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use lotociclo_db::models::{DrawRecord, PICK_COUNT, POOL_SIZE};

use crate::config::EngineConfig;
use crate::cycle::Cycle;
use crate::error::CycleError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub numbers: [u8; PICK_COUNT],
    /// Dezenas pendantes du cycle incluses.
    pub pending: usize,
    /// Dezenas reprises du dernier concours.
    pub repeated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    pub unique: bool,
    pub max_attempts: usize,
}

impl From<&EngineConfig> for GenerationOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            unique: config.unique_candidates,
            max_attempts: config.max_generation_attempts,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions::from(&EngineConfig::default())
    }
}

/// Seed fixe pour les tests et la reproductibilité, entropie système sinon.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Génère `count` jogos de 15 dezenas à partir du cycle et du dernier concours.
///
/// Every candidate holds all pending cycle numbers, then the latest draw's
/// numbers outside the cycle, then random numbers outside the cycle. When that
/// pool is too small (K > 10), already-drawn cycle numbers complete the set.
pub fn generate_candidates<R: Rng + ?Sized>(
    cycle: &Cycle,
    latest: &DrawRecord,
    count: usize,
    options: GenerationOptions,
    rng: &mut R,
) -> Result<Vec<Candidate>, CycleError> {
    let pending = cycle.pending_numbers();
    if pending.len() > PICK_COUNT {
        return Err(CycleError::OverconstrainedCycle {
            pending: pending.len(),
            slots: PICK_COUNT,
        });
    }

    let mut candidates = Vec::with_capacity(count);
    if !options.unique {
        for _ in 0..count {
            candidates.push(build_candidate(cycle, &pending, latest, rng));
        }
        return Ok(candidates);
    }

    let mut seen = HashSet::with_capacity(count);
    for _ in 0..count {
        let mut attempts = 0;
        loop {
            if attempts == options.max_attempts {
                return Err(CycleError::CandidatesExhausted {
                    requested: count,
                    found: candidates.len(),
                });
            }
            attempts += 1;
            let candidate = build_candidate(cycle, &pending, latest, rng);
            if seen.insert(candidate.numbers) {
                candidates.push(candidate);
                break;
            }
        }
    }
    Ok(candidates)
}

fn build_candidate<R: Rng + ?Sized>(
    cycle: &Cycle,
    pending: &[u8],
    latest: &DrawRecord,
    rng: &mut R,
) -> Candidate {
    let targets = cycle.target_numbers();
    let mut picked: Vec<u8> = pending.to_vec();
    let mut available: Vec<u8> = (1..=POOL_SIZE).filter(|n| !targets.contains(n)).collect();

    let mut repeated = 0;
    for &n in &latest.numbers {
        if picked.len() == PICK_COUNT {
            break;
        }
        if let Some(pos) = available.iter().position(|&a| a == n) {
            available.remove(pos);
            picked.push(n);
            repeated += 1;
        }
    }

    available.shuffle(rng);
    let missing = PICK_COUNT - picked.len();
    picked.extend(available.iter().take(missing));

    if picked.len() < PICK_COUNT {
        let mut drawn: Vec<u8> = cycle.drawn_numbers().iter().copied().collect();
        drawn.shuffle(rng);
        let missing = PICK_COUNT - picked.len();
        picked.extend(drawn.into_iter().take(missing));
    }

    picked.sort();
    let mut numbers = [0u8; PICK_COUNT];
    numbers.copy_from_slice(&picked);

    Candidate {
        numbers,
        pending: pending.len(),
        repeated,
    }
}
