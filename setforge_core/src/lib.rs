#![forbid(unsafe_code)]

//! Core domain model and execution engine for the SetForge workout tracker.
//!
//! This crate provides:
//! - Domain types (template blocks, workout steps, logs, history rows)
//! - Template expansion into flat step sequences
//! - The session state machine with rest countdown and crash recovery
//! - Persistence (JSONL store, recovery snapshots)
//! - The completion pipeline (history, records, achievements)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod rest;
pub mod steps;
pub mod timer;
pub mod session;
pub mod recovery;
pub mod store;
pub mod history;
pub mod records;
pub mod achievements;
pub mod pipeline;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use rest::{resolve_rest, resolve_transition_rest};
pub use steps::{count_exercise_steps, exercise_ordinal, exercise_step_at, generate_steps};
pub use timer::{RestTimer, TimerPhase, TimerSignal};
pub use session::{NoCues, SessionCues, SessionEvent, SessionPhase, WorkoutSession};
pub use store::{JsonlStore, WorkoutStore};
pub use history::{aggregate_by_exercise, epley_one_rm, write_exercise_history};
pub use records::{detect_personal_records, PersonalRecords, RecordEntry};
pub use achievements::{achievement_catalog, achievement_def, check_achievements};
pub use pipeline::{run_completion_pipeline, CompletionOutcome};
