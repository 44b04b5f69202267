//! Per-exercise aggregation and history denormalization.
//!
//! When a workout completes, its sets are rolled up per exercise and the
//! rollups are appended to the history file. Exercise detail views read
//! those rows directly instead of re-scanning every stored log.

use crate::store::WorkoutStore;
use crate::types::{ExerciseHistoryEntry, WorkoutLog};
use crate::Result;

/// Highest rep count the Epley estimate is considered meaningful for.
pub const ONE_RM_MAX_REPS: u32 = 12;

/// Estimated one-rep max in grams using the Epley formula
/// `weight * (1 + reps/30)`, computed in integer arithmetic with
/// round-half-up. Returns `None` outside the meaningful rep range
/// (zero reps, or more than [`ONE_RM_MAX_REPS`]).
pub fn epley_one_rm(weight_g: u32, reps_done: u32) -> Option<u64> {
    if reps_done == 0 || reps_done > ONE_RM_MAX_REPS {
        return None;
    }
    Some((u64::from(weight_g) * (30 + u64::from(reps_done)) + 15) / 30)
}

/// Rollup of one exercise's sets within a single workout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExerciseAggregate {
    pub exercise_id: String,
    pub exercise_name: String,
    pub total_volume_g: u64,
    pub total_reps: u32,
    pub total_sets: u32,
    pub best_weight_g: u32,
    /// Best Epley estimate across qualifying sets; `None` when no set
    /// qualified.
    pub best_one_rm_g: Option<u64>,
}

/// Roll up a log's performed sets per exercise, in first-seen order.
pub fn aggregate_by_exercise(log: &WorkoutLog) -> Vec<ExerciseAggregate> {
    let mut aggregates: Vec<ExerciseAggregate> = Vec::new();

    for set in &log.performed_sets {
        let index = match aggregates
            .iter()
            .position(|agg| agg.exercise_id == set.exercise_id)
        {
            Some(i) => i,
            None => {
                aggregates.push(ExerciseAggregate {
                    exercise_id: set.exercise_id.clone(),
                    exercise_name: set.exercise_name.clone(),
                    total_volume_g: 0,
                    total_reps: 0,
                    total_sets: 0,
                    best_weight_g: 0,
                    best_one_rm_g: None,
                });
                aggregates.len() - 1
            }
        };

        let agg = &mut aggregates[index];
        agg.total_volume_g += set.volume_g();
        agg.total_reps += set.reps_done;
        agg.total_sets += 1;
        agg.best_weight_g = agg.best_weight_g.max(set.weight_g);
        if let Some(estimate) = epley_one_rm(set.weight_g, set.reps_done) {
            agg.best_one_rm_g = Some(match agg.best_one_rm_g {
                Some(best) => best.max(estimate),
                None => estimate,
            });
        }
    }

    aggregates
}

/// Denormalize a completed log into per-exercise history rows and append
/// them to the store. Returns the number of rows written.
pub fn write_exercise_history<S: WorkoutStore>(store: &mut S, log: &WorkoutLog) -> Result<usize> {
    let aggregates = aggregate_by_exercise(log);
    if aggregates.is_empty() {
        tracing::debug!(log_id = %log.id, "log has no sets, nothing to denormalize");
        return Ok(0);
    }

    let entries: Vec<ExerciseHistoryEntry> = aggregates
        .into_iter()
        .map(|agg| ExerciseHistoryEntry {
            log_id: log.id,
            exercise_id: agg.exercise_id,
            exercise_name: agg.exercise_name,
            performed_at: log.started_at,
            best_weight_g: agg.best_weight_g,
            total_volume_g: agg.total_volume_g,
            total_sets: agg.total_sets,
            total_reps: agg.total_reps,
            estimated_one_rm_g: agg.best_one_rm_g,
        })
        .collect();

    store.add_history_entries(&entries)?;
    tracing::info!(
        log_id = %log.id,
        exercises = entries.len(),
        "wrote exercise history rows"
    );
    Ok(entries.len())
}
