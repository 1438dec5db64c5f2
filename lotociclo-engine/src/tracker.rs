use std::slice;

use chrono::Utc;
use lotociclo_db::models::DrawRecord;

use crate::absence::select_absent_numbers;
use crate::config::EngineConfig;
use crate::cycle::Cycle;
use crate::error::CycleError;
use crate::history::DrawHistory;
use crate::store::CycleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// Un cycle actif existait déjà.
    Existing,
    /// Aucun cycle actif : un nouveau cycle a été ouvert.
    Started,
}

#[derive(Debug, Clone)]
pub struct UpdateSummary {
    pub active: Cycle,
    /// Cycles fermés pendant cette mise à jour, dans l'ordre.
    pub closed: Vec<Cycle>,
    /// Concours appliqués (tous cycles confondus).
    pub applied: Vec<u32>,
    pub bootstrap: Bootstrap,
}

/// Working state of one session: the active cycle (if any) and the store
/// revision it was read at.
///
/// The only constructor is [`CycleTracker::load`], so every session starts
/// from the persisted collection. In-memory state follows the store after each
/// successful write; after an error, load a fresh tracker.
#[derive(Debug)]
pub struct CycleTracker {
    config: EngineConfig,
    active: Option<Cycle>,
    revision: i64,
}

impl CycleTracker {
    pub fn load<S: CycleStore>(store: &S, config: EngineConfig) -> Result<Self, CycleError> {
        config.validate()?;
        let snapshot = store.load_all()?;

        // Plusieurs cycles actifs priment sur toute autre incohérence.
        let actives = snapshot.active_cycles();
        if actives.len() > 1 {
            return Err(CycleError::MultipleActiveCycles {
                ids: actives.iter().map(|c| c.id().to_string()).collect(),
            });
        }
        for cycle in &snapshot.cycles {
            cycle.check_invariants()?;
        }
        let active = actives.first().map(|c| (*c).clone());

        log::info!(
            "Loaded {} cycle(s) at revision {}, active: {}",
            snapshot.cycles.len(),
            snapshot.revision,
            active.as_ref().map_or("none", |c| c.id())
        );

        Ok(Self {
            config,
            active,
            revision: snapshot.revision,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active(&self) -> Option<&Cycle> {
        self.active.as_ref()
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Ouvre un cycle. Refusé si un cycle est déjà actif.
    pub fn start<S: CycleStore>(&mut self, store: &S, history: &DrawHistory) -> Result<Cycle, CycleError> {
        if let Some(active) = &self.active {
            return Err(CycleError::CycleAlreadyActive(active.id().to_string()));
        }
        self.open_cycle(store, history.draws())
    }

    /// Ouvre un cycle sur tout l'historique si aucun n'est actif.
    pub fn ensure_active<S: CycleStore>(
        &mut self,
        store: &S,
        history: &DrawHistory,
    ) -> Result<Bootstrap, CycleError> {
        self.current_or_start(store, history).map(|(_, bootstrap)| bootstrap)
    }

    /// Applies every draw above the active cycle's watermark, in order.
    ///
    /// A closing draw ends the cycle; the successor is selected from the history
    /// known at that draw and saved together with the closed cycle, then the
    /// remaining draws are replayed against it.
    pub fn update<S: CycleStore>(
        &mut self,
        store: &S,
        history: &DrawHistory,
    ) -> Result<UpdateSummary, CycleError> {
        let (mut current, bootstrap) = self.current_or_start(store, history)?;
        let mut closed = Vec::new();
        let mut applied = Vec::new();
        let mut dirty = false;

        for draw in history.after(current.watermark()) {
            let Some(outcome) = current.absorb(draw, Utc::now()) else {
                continue;
            };
            applied.push(draw.draw_number);
            dirty = true;
            log::debug!(
                "Draw {} on cycle {}: new hits {:?}, {} pending",
                draw.draw_number,
                current.id(),
                outcome.hits,
                current.pending_numbers().len()
            );

            if outcome.closed {
                log::info!("Cycle {} closed at draw {}", current.id(), draw.draw_number);
                let successor = self.select_cycle(history.up_to(draw.draw_number))?;
                // Fermeture et successeur dans la même écriture.
                self.persist(store, &[current.clone(), successor.clone()])?;
                self.active = Some(successor.clone());
                closed.push(std::mem::replace(&mut current, successor));
                dirty = false;
            }
        }

        if dirty {
            self.persist(store, slice::from_ref(&current))?;
            self.active = Some(current.clone());
        } else if applied.is_empty() {
            log::info!("No new draw after {}", current.watermark());
        }

        Ok(UpdateSummary {
            active: current,
            closed,
            applied,
            bootstrap,
        })
    }

    pub(crate) fn current_or_start<S: CycleStore>(
        &mut self,
        store: &S,
        history: &DrawHistory,
    ) -> Result<(Cycle, Bootstrap), CycleError> {
        match self.active.clone() {
            Some(cycle) => Ok((cycle, Bootstrap::Existing)),
            None => {
                log::warn!("No active cycle, opening one from {} draws", history.len());
                let cycle = self.open_cycle(store, history.draws())?;
                Ok((cycle, Bootstrap::Started))
            }
        }
    }

    fn open_cycle<S: CycleStore>(&mut self, store: &S, draws: &[DrawRecord]) -> Result<Cycle, CycleError> {
        let cycle = self.select_cycle(draws)?;
        self.persist(store, slice::from_ref(&cycle))?;
        self.active = Some(cycle.clone());
        Ok(cycle)
    }

    /// New cycle, not yet persisted. `draws` is the history known when the
    /// cycle opens; its last draw becomes the start draw.
    fn select_cycle(&self, draws: &[DrawRecord]) -> Result<Cycle, CycleError> {
        let targets = select_absent_numbers(draws, self.config.analysis_window, self.config.cycle_size)
            .map_err(|e| CycleError::AnalysisFailed(Box::new(e)))?;
        let start_draw_number = draws.last().map_or(0, |d| d.draw_number);

        let cycle = Cycle::open(targets, start_draw_number, Utc::now());
        log::info!(
            "Cycle {} started after draw {} with {:?}",
            cycle.id(),
            start_draw_number,
            cycle.target_numbers()
        );
        Ok(cycle)
    }

    fn persist<S: CycleStore>(&mut self, store: &S, cycles: &[Cycle]) -> Result<(), CycleError> {
        self.revision = store.save_all(cycles, self.revision)?;
        Ok(())
    }
}
