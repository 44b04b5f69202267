//! Personal-record detection.
//!
//! A record requires a strictly better result than a positive prior best.
//! The first recorded performance of an exercise establishes a baseline and
//! never counts as a record, and matching a previous best is not beating it.

use crate::history::aggregate_by_exercise;
use crate::store::WorkoutStore;
use crate::types::WorkoutLog;
use crate::Result;

/// One beaten record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    pub exercise_id: String,
    pub exercise_name: String,
    pub previous_g: u64,
    pub achieved_g: u64,
}

/// Records broken by a single workout, by category
#[derive(Clone, Debug, Default)]
pub struct PersonalRecords {
    /// Estimated one-rep-max records.
    pub one_rm: Vec<RecordEntry>,
    /// Per-exercise session-volume records.
    pub volume: Vec<RecordEntry>,
}

impl PersonalRecords {
    pub fn is_empty(&self) -> bool {
        self.one_rm.is_empty() && self.volume.is_empty()
    }
}

/// Whether `achieved` beats a prior best: the prior must exist, be
/// positive, and be strictly exceeded.
pub fn beats_prior(achieved: u64, prior: Option<u64>) -> bool {
    matches!(prior, Some(best) if best > 0 && achieved > best)
}

/// Compare a completed log's per-exercise bests against stored history.
///
/// History rows belonging to the log itself are excluded, so detection
/// gives the same answer whether it runs before or after the history
/// denormalization stage.
pub fn detect_personal_records<S: WorkoutStore>(
    store: &S,
    log: &WorkoutLog,
) -> Result<PersonalRecords> {
    let mut records = PersonalRecords::default();

    for agg in aggregate_by_exercise(log) {
        let prior: Vec<_> = store
            .history_for_exercise(&agg.exercise_id)?
            .into_iter()
            .filter(|entry| entry.log_id != log.id)
            .collect();
        if prior.is_empty() {
            continue;
        }

        let prior_best_one_rm = prior.iter().filter_map(|e| e.estimated_one_rm_g).max();
        let prior_best_volume = prior.iter().map(|e| e.total_volume_g).max();

        if let Some(achieved) = agg.best_one_rm_g {
            if beats_prior(achieved, prior_best_one_rm) {
                tracing::info!(
                    exercise = %agg.exercise_id,
                    achieved_g = achieved,
                    "new estimated 1RM record"
                );
                records.one_rm.push(RecordEntry {
                    exercise_id: agg.exercise_id.clone(),
                    exercise_name: agg.exercise_name.clone(),
                    previous_g: prior_best_one_rm.unwrap_or(0),
                    achieved_g: achieved,
                });
            }
        }

        if beats_prior(agg.total_volume_g, prior_best_volume) {
            tracing::info!(
                exercise = %agg.exercise_id,
                achieved_g = agg.total_volume_g,
                "new session-volume record"
            );
            records.volume.push(RecordEntry {
                exercise_id: agg.exercise_id,
                exercise_name: agg.exercise_name,
                previous_g: prior_best_volume.unwrap_or(0),
                achieved_g: agg.total_volume_g,
            });
        }
    }

    Ok(records)
}
