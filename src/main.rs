//! Careplan command-line front end.
//!
//! Thin wrapper over `careplan_lib::commands`: arguments in, JSON out.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use careplan_lib::attendance::AttendanceEdit;
use careplan_lib::commands::{self, attendance, notes, reviews};
use careplan_lib::core_state::CoreState;
use careplan_lib::models::enums::AttendanceStatus;

#[derive(Parser)]
#[command(name = "careplan")]
#[command(about = "Review scheduling, attendance and session notes for behavioral-health programs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the due dates of a review series
    Schedule {
        /// Admission date (YYYY-MM-DD)
        admission: NaiveDate,

        /// Number of reviews
        #[arg(short, long, default_value = "6")]
        count: u32,
    },

    /// Print escalation labels for a list of items
    Progress {
        /// Review number (1-based)
        review: u32,

        /// Items in display order
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Admit a patient from a JSON file
    Admit {
        /// Admission JSON (full_name, program_type, admission_date, goals, diagnoses)
        file: PathBuf,
    },

    /// List every open review whose due date is before a date
    Overdue {
        /// Reference date, defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Check whether a scheduled review may be generated
    Check {
        schedule_id: Uuid,

        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Generate a scheduled review document
    Generate {
        schedule_id: Uuid,

        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Record one attendance slot
    Attend {
        group_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,

        /// present, absent or discharged
        status: AttendanceStatus,

        /// Required for absences before the week can be locked
        #[arg(short, long)]
        justification: Option<String>,
    },

    /// Show a group week with its open violations
    Week {
        group_id: Uuid,

        /// Any day of the week
        date: NaiveDate,
    },

    /// Lock a group week
    Lock {
        group_id: Uuid,

        /// Any day of the week
        date: NaiveDate,
    },

    /// Generate session notes for a group week from a JSON selection file
    Notes {
        group_id: Uuid,

        /// Any day of the week
        date: NaiveDate,

        /// JSON array of day selections
        file: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| format!("Cannot serialize output: {e}"))?;
    println!("{out}");
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("Malformed {}: {e}", path.display()))
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

fn run(cli: Cli) -> Result<(), String> {
    let state = CoreState::from_app_dirs().map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Schedule { admission, count } => {
            print_json(&reviews::calculate_series(&state, admission, count)?)
        }
        Commands::Progress { review, items } => {
            for entry in reviews::compute_progress(items, review)? {
                println!("{}\t{}", entry.level, entry.item);
            }
            Ok(())
        }
        Commands::Admit { file } => print_json(&reviews::admit_patient(&state, read_json(&file)?)?),
        Commands::Overdue { today } => print_json(&reviews::list_overdue(&state, today_or(today))?),
        Commands::Check { schedule_id, today } => {
            print_json(&reviews::check_eligibility(&state, schedule_id, today_or(today))?)
        }
        Commands::Generate { schedule_id, today } => {
            print_json(&reviews::generate_review(&state, schedule_id, today_or(today))?)
        }
        Commands::Attend { group_id, patient_id, date, status, justification } => {
            let edit = AttendanceEdit { patient_id, date, status, justification };
            print_json(&attendance::record_attendance(&state, group_id, edit)?)
        }
        Commands::Week { group_id, date } => print_json(&attendance::get_week(&state, group_id, date)?),
        Commands::Lock { group_id, date } => print_json(&attendance::lock_week(&state, group_id, date)?),
        Commands::Notes { group_id, date, file } => {
            print_json(&notes::generate_week_notes(&state, group_id, date, read_json(&file)?)?)
        }
    }
}

fn main() -> ExitCode {
    careplan_lib::init_tracing();
    tracing::info!("{} v{}", careplan_lib::config::APP_NAME, careplan_lib::config::APP_VERSION);
    tracing::debug!(status = %commands::health_check(), "Backend ready");

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
