pub mod attendance; // Weekly attendance grid and lock
pub mod commands;
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod db;
pub mod document; // Document tree + DOCX/PDF rendering
pub mod eligibility; // Review gates, advisories, week-slot checks
pub mod models;
pub mod notes; // Session-note orchestration
pub mod progress; // Escalation labels + goal assessments
pub mod reviews; // Review series lifecycle
pub mod scheduling; // Due-date rule
pub mod uniqueness; // Response uniqueness registry

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
