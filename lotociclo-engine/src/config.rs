use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use lotociclo_db::models::POOL_SIZE;

use crate::error::CycleError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nombre de dezenas suivies par cycle (K).
    pub cycle_size: usize,
    /// Nombre de concours analysés pour choisir les dezenas absentes.
    pub analysis_window: usize,
    /// Rejette les jogos déjà produits dans le même lot.
    pub unique_candidates: bool,
    /// Tirages maximum par jogo en mode unique.
    pub max_generation_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_size: 10,
            analysis_window: 10,
            unique_candidates: false,
            max_generation_attempts: 1000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CycleError> {
        if self.cycle_size == 0 || self.cycle_size > POOL_SIZE as usize {
            return Err(CycleError::InvalidConfig(format!(
                "cycle_size = {} (attendu 1-{})",
                self.cycle_size, POOL_SIZE
            )));
        }
        if self.analysis_window == 0 {
            return Err(CycleError::InvalidConfig("analysis_window = 0".to_string()));
        }
        if self.max_generation_attempts == 0 {
            return Err(CycleError::InvalidConfig("max_generation_attempts = 0".to_string()));
        }
        Ok(())
    }
}

/// Charge la configuration ; un fichier absent donne la configuration par défaut.
pub fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(EngineConfig::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: EngineConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuration illisible : {:?}", path))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &EngineConfig, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
