use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::Strategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub combine: CombineWeights,
}

/// Relative weight of each strategy in the combined score. At combine time
/// the weights are renormalized over whichever strategies actually have a
/// value, so missing strategies shift weight instead of dragging the score
/// toward zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CombineWeights {
    #[serde(default = "default_weight")]
    pub dynamic: f64,
    #[serde(default = "default_weight")]
    pub ml: f64,
    #[serde(default = "default_weight")]
    pub keyword: f64,
}

impl CombineWeights {
    pub fn weight(&self, strategy: Strategy) -> f64 {
        match strategy {
            Strategy::Dynamic => self.dynamic,
            Strategy::Ml => self.ml,
            Strategy::Keyword => self.keyword,
        }
    }
}

impl Default for CombineWeights {
    fn default() -> Self {
        Self {
            dynamic: default_weight(),
            ml: default_weight(),
            keyword: default_weight(),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stock-pulse");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("signals.db").to_string_lossy().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            combine: CombineWeights::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stock-pulse")
            .join("config.toml")
    }
}
