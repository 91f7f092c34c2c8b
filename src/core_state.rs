//! Application state shared by every command handler.
//!
//! Holds the database and export locations, the runtime configuration and the
//! activity catalog. Each handler opens its own short-lived connection.

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard};

use crate::config::{self, CareConfig, ConfigError};
use crate::db;
use crate::notes::{default_catalog, Activity, ParagraphPool};

pub struct CoreState {
    pub db_path: PathBuf,
    pub exports_dir: PathBuf,
    config: RwLock<CareConfig>,
    catalog: Vec<Activity>,
    pool: ParagraphPool,
}

impl CoreState {
    pub fn new(db_path: PathBuf, exports_dir: PathBuf, config: CareConfig) -> Self {
        Self {
            db_path,
            exports_dir,
            config: RwLock::new(config),
            catalog: default_catalog(),
            pool: ParagraphPool::builtin(),
        }
    }

    /// State rooted at the application data directory, with `config.json`
    /// applied when present.
    pub fn from_app_dirs() -> Result<Self, CoreError> {
        let config = CareConfig::load()?;
        Ok(Self::new(config::database_path(), config::exports_dir(), config))
    }

    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn read_config(&self) -> Result<RwLockReadGuard<'_, CareConfig>, CoreError> {
        self.config.read().map_err(|_| CoreError::LockPoisoned)
    }

    /// Owned copy of the configuration, for handlers that hold it across calls.
    pub fn config(&self) -> Result<CareConfig, CoreError> {
        Ok(self.read_config()?.clone())
    }

    /// Replaces the configuration after validating it.
    pub fn update_config(&self, config: CareConfig) -> Result<(), CoreError> {
        config.validate()?;
        let mut guard = self.config.write().map_err(|_| CoreError::LockPoisoned)?;
        *guard = config;
        tracing::info!("Configuration updated");
        Ok(())
    }

    pub fn catalog(&self) -> &[Activity] {
        &self.catalog
    }

    pub fn pool(&self) -> &ParagraphPool {
        &self.pool
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
