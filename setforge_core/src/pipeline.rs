//! Post-completion pipeline.
//!
//! After a workout log has been persisted, three follow-up stages run:
//! history denormalization, personal-record detection, and achievement
//! evaluation. The log is already durable before this runs, so a stage
//! failure loses only that stage's output. Failures are captured per stage
//! and reported to the caller instead of aborting the remaining stages.

use crate::history::write_exercise_history;
use crate::records::{detect_personal_records, PersonalRecords};
use crate::store::WorkoutStore;
use crate::types::{UnlockedAchievement, WorkoutLog};
use crate::Result;

/// Per-stage results of one pipeline run
#[derive(Debug)]
pub struct CompletionOutcome {
    /// Number of history rows written.
    pub history_entries: Result<usize>,
    /// Records broken by this workout.
    pub records: Result<PersonalRecords>,
    /// Achievements newly unlocked by this workout.
    pub achievements: Result<Vec<UnlockedAchievement>>,
}

impl CompletionOutcome {
    pub fn fully_succeeded(&self) -> bool {
        self.history_entries.is_ok() && self.records.is_ok() && self.achievements.is_ok()
    }
}

/// Run all completion stages for a persisted log.
///
/// History runs first so the denormalized rows exist as early as possible;
/// record detection and achievement evaluation both exclude this log's own
/// rows, so they are insensitive to the ordering.
pub fn run_completion_pipeline<S: WorkoutStore>(
    store: &mut S,
    log: &WorkoutLog,
) -> CompletionOutcome {
    let history_entries = write_exercise_history(store, log).map_err(|e| {
        tracing::warn!(log_id = %log.id, "history stage failed: {}", e);
        e
    });

    let records = detect_personal_records(store, log).map_err(|e| {
        tracing::warn!(log_id = %log.id, "record-detection stage failed: {}", e);
        e
    });

    let achievements = check_achievements_stage(store, log);

    CompletionOutcome {
        history_entries,
        records,
        achievements,
    }
}

fn check_achievements_stage<S: WorkoutStore>(
    store: &mut S,
    log: &WorkoutLog,
) -> Result<Vec<UnlockedAchievement>> {
    crate::achievements::check_achievements(store, log).map_err(|e| {
        tracing::warn!(log_id = %log.id, "achievement stage failed: {}", e);
        e
    })
}
