use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use lotociclo_db::models::DrawRecord;

use crate::config::EngineConfig;
use crate::cycle::Cycle;
use crate::error::CycleError;
use crate::generator::{self, Candidate, GenerationOptions};
use crate::history::DrawHistory;
use crate::report::{CycleAnalysis, analyze_cycle};
use crate::store::CycleStore;
use crate::tracker::{CycleTracker, UpdateSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub cycle: Cycle,
    pub analysis: CycleAnalysis,
    pub candidates: Vec<Candidate>,
    /// Cycles fermés par cette exécution.
    pub closed: Vec<Cycle>,
    pub applied: Vec<u32>,
}

/// Entry point for callers: one session over a store, holding the tracker and
/// the generator's random source.
pub struct CycleService<'s, S: CycleStore> {
    store: &'s S,
    tracker: CycleTracker,
    rng: StdRng,
}

impl<'s, S: CycleStore> CycleService<'s, S> {
    /// Charge les cycles enregistrés. `seed` fixe les jogos générés.
    pub fn open(store: &'s S, config: EngineConfig, seed: Option<u64>) -> Result<Self, CycleError> {
        let tracker = CycleTracker::load(store, config)?;
        Ok(Self {
            store,
            tracker,
            rng: generator::rng_from_seed(seed),
        })
    }

    pub fn tracker(&self) -> &CycleTracker {
        &self.tracker
    }

    pub fn start(&mut self, history: &DrawHistory) -> Result<Cycle, CycleError> {
        self.tracker.start(self.store, history)
    }

    pub fn update(&mut self, history: &DrawHistory) -> Result<UpdateSummary, CycleError> {
        self.tracker.update(self.store, history)
    }

    /// Analyse du cycle actif, ouvert au besoin. Aucun concours n'est appliqué.
    pub fn active_cycle_analysis(&mut self, history: &DrawHistory) -> Result<CycleAnalysis, CycleError> {
        let (cycle, _) = self.tracker.current_or_start(self.store, history)?;
        Ok(analyze_cycle(&cycle))
    }

    pub fn generate_candidates(
        &mut self,
        history: &DrawHistory,
        count: usize,
    ) -> Result<Vec<Candidate>, CycleError> {
        let latest = history.latest().ok_or(CycleError::NoHistory)?;
        let (cycle, _) = self.tracker.current_or_start(self.store, history)?;
        self.generate_for(&cycle, latest, count)
    }

    /// Mise à jour, analyse puis génération sur le cycle resté actif.
    pub fn run_pipeline(&mut self, history: &DrawHistory, count: usize) -> Result<PipelineResult, CycleError> {
        let latest = history.latest().ok_or(CycleError::NoHistory)?;
        let summary = self.tracker.update(self.store, history)?;
        let analysis = analyze_cycle(&summary.active);
        let candidates = self.generate_for(&summary.active, latest, count)?;

        log::info!(
            "Pipeline: {} draw(s) applied, {} cycle(s) closed, {} candidate(s)",
            summary.applied.len(),
            summary.closed.len(),
            candidates.len()
        );

        Ok(PipelineResult {
            cycle: summary.active,
            analysis,
            candidates,
            closed: summary.closed,
            applied: summary.applied,
        })
    }

    fn generate_for(
        &mut self,
        cycle: &Cycle,
        latest: &DrawRecord,
        count: usize,
    ) -> Result<Vec<Candidate>, CycleError> {
        let options = GenerationOptions::from(self.tracker.config());
        generator::generate_candidates(cycle, latest, count, options, &mut self.rng)
    }
}
