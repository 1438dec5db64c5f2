use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lotociclo_db::models::{DrawRecord, PICK_COUNT, POOL_SIZE};

use crate::error::CycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Active,
    Closed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Active => "active",
            CycleStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStatus::Active => write!(f, "ACTIF"),
            CycleStatus::Closed => write!(f, "FERMÉ"),
        }
    }
}

/// Un concours tel que vu par le cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawAnnotation {
    pub draw_number: u32,
    pub date: String,
    pub numbers: [u8; PICK_COUNT],
    /// Dezenas du cycle sorties pour la première fois à ce concours.
    pub target_hits: Vec<u8>,
}

/// Result of feeding one draw to a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absorbed {
    pub hits: Vec<u8>,
    pub closed: bool,
}

/// A tracked set of K "due" numbers, open until every one of them has come out.
///
/// Fields are only reachable through accessors: `drawn_numbers` grows through
/// [`Cycle::absorb`] alone, and closure happens there exactly when coverage
/// becomes complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    id: String,
    start_date: DateTime<Utc>,
    start_draw_number: u32,
    target_numbers: Vec<u8>,
    drawn_numbers: BTreeSet<u8>,
    draws_processed: Vec<DrawAnnotation>,
    status: CycleStatus,
    closed_date: Option<DateTime<Utc>>,
    closed_draw_number: Option<u32>,
}

impl Cycle {
    pub fn open(target_numbers: Vec<u8>, start_draw_number: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_date: started_at,
            start_draw_number,
            target_numbers,
            drawn_numbers: BTreeSet::new(),
            draws_processed: Vec::new(),
            status: CycleStatus::Active,
            closed_date: None,
            closed_draw_number: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn start_draw_number(&self) -> u32 {
        self.start_draw_number
    }

    pub fn target_numbers(&self) -> &[u8] {
        &self.target_numbers
    }

    pub fn drawn_numbers(&self) -> &BTreeSet<u8> {
        &self.drawn_numbers
    }

    pub fn draws_processed(&self) -> &[DrawAnnotation] {
        &self.draws_processed
    }

    pub fn status(&self) -> CycleStatus {
        self.status
    }

    pub fn closed_date(&self) -> Option<DateTime<Utc>> {
        self.closed_date
    }

    pub fn closed_draw_number(&self) -> Option<u32> {
        self.closed_draw_number
    }

    pub fn is_active(&self) -> bool {
        self.status == CycleStatus::Active
    }

    pub fn is_complete(&self) -> bool {
        self.drawn_numbers.len() == self.target_numbers.len()
    }

    /// Dezenas du cycle pas encore sorties, dans l'ordre de sélection.
    pub fn pending_numbers(&self) -> Vec<u8> {
        self.target_numbers
            .iter()
            .copied()
            .filter(|n| !self.drawn_numbers.contains(n))
            .collect()
    }

    /// Highest draw number this cycle has accounted for.
    pub fn watermark(&self) -> u32 {
        self.draws_processed
            .last()
            .map_or(self.start_draw_number, |a| a.draw_number.max(self.start_draw_number))
    }

    /// Applique un concours. Retourne `None` si le concours est déjà couvert
    /// (numéro <= watermark) ou si le cycle est fermé.
    pub fn absorb(&mut self, draw: &DrawRecord, now: DateTime<Utc>) -> Option<Absorbed> {
        if !self.is_active() || draw.draw_number <= self.watermark() {
            return None;
        }

        let hits: Vec<u8> = self
            .target_numbers
            .iter()
            .copied()
            .filter(|n| draw.contains(*n) && !self.drawn_numbers.contains(n))
            .collect();

        self.draws_processed.push(DrawAnnotation {
            draw_number: draw.draw_number,
            date: draw.date.clone(),
            numbers: draw.numbers,
            target_hits: hits.clone(),
        });
        self.drawn_numbers.extend(hits.iter().copied());

        let closed = self.is_complete();
        if closed {
            self.status = CycleStatus::Closed;
            self.closed_date = Some(now);
            self.closed_draw_number = Some(draw.draw_number);
        }

        Some(Absorbed { hits, closed })
    }

    /// Vérifie les invariants d'un cycle relu depuis le stockage.
    pub fn check_invariants(&self) -> Result<(), CycleError> {
        let corrupt = |reason: String| CycleError::CorruptCycle {
            id: self.id.clone(),
            reason,
        };

        let targets: BTreeSet<u8> = self.target_numbers.iter().copied().collect();
        if targets.len() != self.target_numbers.len() {
            return Err(corrupt("dezenas du cycle en double".to_string()));
        }
        if self.target_numbers.is_empty() || self.target_numbers.iter().any(|&n| n < 1 || n > POOL_SIZE) {
            return Err(corrupt("dezenas du cycle hors 1-25".to_string()));
        }
        if !self.drawn_numbers.is_subset(&targets) {
            return Err(corrupt("dezenas sorties hors du cycle".to_string()));
        }

        let mut previous = self.start_draw_number;
        let mut replayed = BTreeSet::new();
        for annotation in &self.draws_processed {
            if annotation.draw_number <= previous {
                return Err(corrupt(format!("concours {} hors ordre", annotation.draw_number)));
            }
            previous = annotation.draw_number;
            for &n in &annotation.target_hits {
                if !replayed.insert(n) {
                    return Err(corrupt(format!("dezena {} sortie deux fois", n)));
                }
            }
        }
        if replayed != self.drawn_numbers {
            return Err(corrupt("dezenas sorties incohérentes avec les concours".to_string()));
        }

        match self.status {
            CycleStatus::Active if self.is_complete() => {
                Err(corrupt("cycle actif alors que toutes les dezenas sont sorties".to_string()))
            }
            CycleStatus::Active if self.closed_date.is_some() || self.closed_draw_number.is_some() => {
                Err(corrupt("cycle actif avec une date de fermeture".to_string()))
            }
            CycleStatus::Closed if !self.is_complete() => {
                Err(corrupt("cycle fermé avec des dezenas pendantes".to_string()))
            }
            CycleStatus::Closed if self.closed_date.is_none() || self.closed_draw_number.is_none() => {
                Err(corrupt("cycle fermé sans date de fermeture".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::test_support::{draw_with, draw_without};

    fn targets() -> Vec<u8> {
        (1..=10).collect()
    }

    #[test]
    fn test_open_cycle() {
        let cycle = Cycle::open(targets(), 100, Utc::now());
        assert!(cycle.is_active());
        assert!(cycle.drawn_numbers().is_empty());
        assert_eq!(cycle.pending_numbers(), targets());
        assert_eq!(cycle.watermark(), 100);
        assert!(cycle.check_invariants().is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Cycle::open(targets(), 100, Utc::now());
        let b = Cycle::open(targets(), 100, Utc::now());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_absorb_records_first_hits_only() {
        let mut cycle = Cycle::open(targets(), 100, Utc::now());
        let first = cycle.absorb(&draw_with(101, &[1, 2], &[3, 4, 5, 6, 7, 8, 9, 10]), Utc::now()).unwrap();
        assert_eq!(first.hits, vec![1, 2]);
        assert!(!first.closed);

        let second = cycle.absorb(&draw_with(102, &[1, 2, 3], &[4, 5, 6, 7, 8, 9, 10]), Utc::now()).unwrap();
        assert_eq!(second.hits, vec![3]);
        assert_eq!(cycle.drawn_numbers().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(cycle.draws_processed().len(), 2);
        assert_eq!(cycle.watermark(), 102);
    }

    #[test]
    fn test_absorb_ignores_old_draws() {
        let mut cycle = Cycle::open(targets(), 100, Utc::now());
        assert!(cycle.absorb(&draw_without(100, &[]), Utc::now()).is_none());
        assert!(cycle.absorb(&draw_without(99, &[]), Utc::now()).is_none());
        cycle.absorb(&draw_with(101, &[1], &[2, 3, 4, 5, 6, 7, 8, 9, 10]), Utc::now()).unwrap();
        assert!(cycle.absorb(&draw_without(101, &[]), Utc::now()).is_none());
        assert_eq!(cycle.draws_processed().len(), 1);
    }

    #[test]
    fn test_absorb_closes_on_full_coverage() {
        let mut cycle = Cycle::open(targets(), 100, Utc::now());
        cycle.absorb(&draw_with(101, &[1, 2, 3, 4, 5, 6, 7, 8, 9], &[10]), Utc::now()).unwrap();
        assert!(cycle.is_active());
        assert_eq!(cycle.pending_numbers(), vec![10]);

        let outcome = cycle.absorb(&draw_with(105, &[10], &[]), Utc::now()).unwrap();
        assert_eq!(outcome.hits, vec![10]);
        assert!(outcome.closed);
        assert_eq!(cycle.status(), CycleStatus::Closed);
        assert_eq!(cycle.closed_draw_number(), Some(105));
        assert!(cycle.closed_date().is_some());
        assert!(cycle.check_invariants().is_ok());

        // Fermé : plus rien n'est absorbé.
        assert!(cycle.absorb(&draw_without(106, &[]), Utc::now()).is_none());
    }

    #[test]
    fn test_check_invariants_detects_tampering() {
        let cycle = Cycle::open(targets(), 100, Utc::now());
        let mut json: serde_json::Value = serde_json::to_value(&cycle).unwrap();
        json["drawn_numbers"] = serde_json::json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let tampered: Cycle = serde_json::from_value(json).unwrap();
        assert!(matches!(tampered.check_invariants(), Err(CycleError::CorruptCycle { .. })));
    }

    #[test]
    fn test_check_invariants_detects_foreign_number() {
        let cycle = Cycle::open(targets(), 100, Utc::now());
        let mut json: serde_json::Value = serde_json::to_value(&cycle).unwrap();
        json["drawn_numbers"] = serde_json::json!([20]);
        let tampered: Cycle = serde_json::from_value(json).unwrap();
        assert!(tampered.check_invariants().is_err());
    }

    #[test]
    fn test_check_invariants_detects_repeated_first_hit() {
        let mut cycle = Cycle::open(targets(), 100, Utc::now());
        cycle.absorb(&draw_with(101, &[1], &[2, 3, 4, 5, 6, 7, 8, 9, 10]), Utc::now()).unwrap();
        cycle.absorb(&draw_with(102, &[1, 2], &[3, 4, 5, 6, 7, 8, 9, 10]), Utc::now()).unwrap();
        assert!(cycle.check_invariants().is_ok());

        let mut json: serde_json::Value = serde_json::to_value(&cycle).unwrap();
        json["draws_processed"][1]["target_hits"] = serde_json::json!([1, 2]);
        let tampered: Cycle = serde_json::from_value(json).unwrap();
        let err = tampered.check_invariants().unwrap_err();
        assert!(matches!(err, CycleError::CorruptCycle { ref reason, .. } if reason.contains("deux fois")));
    }

    #[test]
    fn test_serde_roundtrip_is_exact() {
        let mut cycle = Cycle::open(targets(), 100, Utc::now());
        cycle.absorb(&draw_with(101, &[4, 7], &[1, 2, 3, 5, 6, 8, 9, 10]), Utc::now()).unwrap();
        let json = serde_json::to_string_pretty(&cycle).unwrap();
        let restored: Cycle = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cycle);
        assert!(json.contains("\"status\": \"active\""));
    }
}
