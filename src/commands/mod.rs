//! Command surface consumed by front ends. Every handler takes the shared
//! [`CoreState`] and reports failures as display strings.

pub mod attendance;
pub mod notes;
pub mod reviews;

use serde::{Deserialize, Serialize};

use crate::config::{self, CareConfig};
use crate::core_state::CoreState;

/// Health check, verifies the backend is running.
pub fn health_check() -> String {
    tracing::debug!("Health check called");
    "ok".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub database_path: String,
    pub exports_dir: String,
}

pub fn app_info(state: &CoreState) -> AppInfo {
    AppInfo {
        name: config::APP_NAME.to_string(),
        version: config::APP_VERSION.to_string(),
        database_path: state.db_path.to_string_lossy().into_owned(),
        exports_dir: state.exports_dir.to_string_lossy().into_owned(),
    }
}

pub fn get_config(state: &CoreState) -> Result<CareConfig, String> {
    state.config().map_err(|e| e.to_string())
}

pub fn update_config(state: &CoreState, config: CareConfig) -> Result<(), String> {
    state.update_config(config).map_err(|e| e.to_string())
}
