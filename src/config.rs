//! Engine settings
//! ---------------
//! Settings are plain serde structs with per-field defaults so a partial JSON file (or no file
//! at all) yields a working configuration. Environment variables override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::ident::QueryDefaults;

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct EngineSettings {
    /// Root folder holding `<db>/<schema>/<table>` relation directories.
    #[serde(default = "EngineSettings::default_db_root")]
    pub db_root: PathBuf,
    #[serde(default = "EngineSettings::default_database")]
    pub default_database: String,
    #[serde(default = "EngineSettings::default_schema")]
    pub default_schema: String,
    /// Rows per partial accumulation batch; partial states are merged afterwards.
    #[serde(default = "EngineSettings::default_partial_batch_rows")]
    pub partial_batch_rows: usize,
    /// Appended to the output name to form the summary relation name.
    #[serde(default = "EngineSettings::default_summary_suffix")]
    pub summary_suffix: String,
}

impl EngineSettings {
    fn default_db_root() -> PathBuf { PathBuf::from("dbs") }
    fn default_database() -> String { crate::ident::DEFAULT_DB.to_string() }
    fn default_schema() -> String { crate::ident::DEFAULT_SCHEMA.to_string() }
    fn default_partial_batch_rows() -> usize { 4096 }
    fn default_summary_suffix() -> String { "_summary".to_string() }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::io("settings_read".to_string(), format!("{}: {}", path.display(), e)))?;
        let mut settings: EngineSettings = serde_json::from_str(&text)?;
        settings.check()?;
        debug!(target: "corrmatrix::config", "loaded settings from '{}': {:?}", path.display(), settings);
        Ok(settings)
    }

    /// Defaults overridden by `CORRMATRIX_*` environment variables.
    pub fn from_env() -> AppResult<Self> {
        let mut s = Self::default();
        s.apply_env()?;
        Ok(s)
    }

    pub fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(v) = std::env::var("CORRMATRIX_DB_FOLDER") { self.db_root = PathBuf::from(v); }
        if let Ok(v) = std::env::var("CORRMATRIX_DATABASE") { self.default_database = v; }
        if let Ok(v) = std::env::var("CORRMATRIX_SCHEMA") { self.default_schema = v; }
        if let Ok(v) = std::env::var("CORRMATRIX_SUMMARY_SUFFIX") { self.summary_suffix = v; }
        if let Ok(v) = std::env::var("CORRMATRIX_BATCH_ROWS") {
            self.partial_batch_rows = v.trim().parse::<usize>().map_err(|_| {
                AppError::validation("invalid_setting".to_string(), format!("CORRMATRIX_BATCH_ROWS must be a positive integer, got '{}'", v))
            })?;
        }
        self.check()
    }

    fn check(&mut self) -> AppResult<()> {
        if self.partial_batch_rows == 0 {
            return Err(AppError::validation("invalid_setting", "partial_batch_rows must be at least 1"));
        }
        if self.summary_suffix.is_empty() {
            return Err(AppError::validation("invalid_setting", "summary_suffix must not be empty"));
        }
        Ok(())
    }

    pub fn query_defaults(&self) -> QueryDefaults {
        QueryDefaults::new(self.default_database.clone(), self.default_schema.clone())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            db_root: Self::default_db_root(),
            default_database: Self::default_database(),
            default_schema: Self::default_schema(),
            partial_batch_rows: Self::default_partial_batch_rows(),
            summary_suffix: Self::default_summary_suffix(),
        }
    }
}
