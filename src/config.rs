use std::path::{Path, PathBuf};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::document::ExportFormat;
use crate::models::enums::ProgramType;
use crate::notes::program::ProgramSchedule;
use crate::scheduling::MAX_SERIES_LENGTH;

/// Application-level constants
pub const APP_NAME: &str = "Careplan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const CONFIG_FILE: &str = "config.json";

/// Get the application data directory (~/Careplan/)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Get the database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("database").join("careplan.db")
}

/// Get the directory rendered documents are written to
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "careplan=info,careplan_lib=info"
}

// ═══════════════════════════════════════════════════════════
// Runtime configuration
// ═══════════════════════════════════════════════════════════

/// Tunable rules for scheduling, gating and note generation.
///
/// Every field has a default; `config.json` may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CareConfig {
    /// Weekday on which no review may fall; such dates move one day forward.
    pub rest_day: Weekday,
    /// Days from admission to the first review.
    pub first_review_offset_days: i64,
    /// Days between consecutive reviews.
    pub review_interval_days: i64,
    /// Reviews created per series at admission.
    pub initial_series_length: u32,
    pub min_days_since_admission: i64,
    pub min_attendance_percent: f64,
    pub required_goal_count: usize,
    /// A goal without an assessment for this many days raises an advisory warning.
    pub assessment_staleness_days: i64,
    /// When false, a review cannot be generated while an earlier one is open.
    pub allow_out_of_order_completion: bool,
    /// Responses shorter than this (in characters, after trimming) are exempt
    /// from the uniqueness check.
    pub min_unique_response_len: usize,
    /// Pause between consecutive documents of a batch run.
    pub pacing_delay_ms: u64,
    pub export_format: ExportFormat,
    pub programs: Vec<ProgramSchedule>,
}

impl Default for CareConfig {
    fn default() -> Self {
        Self {
            rest_day: Weekday::Sat,
            first_review_offset_days: 18,
            review_interval_days: 30,
            initial_series_length: 6,
            min_days_since_admission: 10,
            min_attendance_percent: 50.0,
            required_goal_count: 4,
            assessment_staleness_days: 30,
            allow_out_of_order_completion: true,
            min_unique_response_len: 20,
            pacing_delay_ms: 250,
            export_format: ExportFormat::Docx,
            programs: ProgramSchedule::defaults(),
        }
    }
}

impl CareConfig {
    /// Load `config.json` from `dir`, falling back to defaults when absent.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let config: CareConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from the application data directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&app_data_dir())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_review_offset_days < 1 || self.review_interval_days < 1 {
            return Err(ConfigError::Invalid(
                "review offsets must be at least one day".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_attendance_percent) {
            return Err(ConfigError::Invalid(format!(
                "min_attendance_percent out of range: {}",
                self.min_attendance_percent
            )));
        }
        if self.initial_series_length > MAX_SERIES_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "initial_series_length above {MAX_SERIES_LENGTH}: {}",
                self.initial_series_length
            )));
        }
        for program in &self.programs {
            program
                .validate(self.rest_day)
                .map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    /// Schedule for a program type, if configured.
    pub fn program(&self, program_type: ProgramType) -> Option<&ProgramSchedule> {
        self.programs.iter().find(|p| p.program_type == program_type)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Careplan"));
    }

    #[test]
    fn exports_dir_under_app_data() {
        assert!(exports_dir().starts_with(app_data_dir()));
        assert!(database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_are_valid() {
        let config = CareConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rest_day, Weekday::Sat);
        assert_eq!(config.first_review_offset_days, 18);
        assert_eq!(config.review_interval_days, 30);
        assert!(config.program(ProgramType::PartialHospitalization).is_some());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CareConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.min_unique_response_len, 20);
    }

    #[test]
    fn partial_file_overrides_subset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"rest_day": "Sun", "pacing_delay_ms": 0}"#,
        )
        .unwrap();
        let config = CareConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.rest_day, Weekday::Sun);
        assert_eq!(config.pacing_delay_ms, 0);
        assert_eq!(config.review_interval_days, 30);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"min_attendance_percent": 150.0}"#)
            .unwrap();
        assert!(matches!(
            CareConfig::load_from(dir.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
