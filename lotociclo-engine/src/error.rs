use thiserror::Error;

/// Failures of the cycle engine. None of them is retried by the engine itself.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("aucun tirage à analyser")]
    NoHistory,

    #[error("sélection des dezenas absentes impossible : {0}")]
    AnalysisFailed(#[source] Box<CycleError>),

    #[error("{} cycles actifs en base ({}), intervention manuelle requise", ids.len(), ids.join(", "))]
    MultipleActiveCycles { ids: Vec<String> },

    #[error("historique corrompu : {0}")]
    CorruptHistory(String),

    #[error("{pending} dezenas pendantes pour {slots} places")]
    OverconstrainedCycle { pending: usize, slots: usize },

    #[error("révision {found} en base, {expected} attendue : cycles modifiés par un autre processus")]
    StoreConflict { expected: i64, found: i64 },

    #[error("un cycle est déjà actif : {0}")]
    CycleAlreadyActive(String),

    #[error("cycle {id} incohérent : {reason}")]
    CorruptCycle { id: String, reason: String },

    #[error("configuration invalide : {0}")]
    InvalidConfig(String),

    #[error("{found} jogos distincts sur {requested} demandés")]
    CandidatesExhausted { requested: usize, found: usize },

    #[error("stockage : {0}")]
    Storage(#[from] lotociclo_db::rusqlite::Error),

    #[error("sérialisation : {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CycleError {
    /// Stable taxonomy label shown to callers.
    pub fn label(&self) -> &'static str {
        match self {
            CycleError::NoHistory => "NoHistory",
            CycleError::AnalysisFailed(_) => "AnalysisFailed",
            CycleError::MultipleActiveCycles { .. } => "MultipleActiveCycles",
            CycleError::CorruptHistory(_) => "CorruptHistory",
            CycleError::OverconstrainedCycle { .. } => "OverconstrainedCycle",
            CycleError::StoreConflict { .. } => "StoreConflict",
            CycleError::CycleAlreadyActive(_) => "CycleAlreadyActive",
            CycleError::CorruptCycle { .. } => "CorruptCycle",
            CycleError::InvalidConfig(_) => "InvalidConfig",
            CycleError::CandidatesExhausted { .. } => "CandidatesExhausted",
            CycleError::Storage(_) => "Storage",
            CycleError::Serialization(_) => "Serialization",
        }
    }
}
