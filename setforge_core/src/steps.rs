//! Template expansion into flat step sequences.
//!
//! A session never interprets template blocks directly. At start time the
//! blocks are expanded, once, into a `Vec<WorkoutStep>` that the session
//! walks with a cursor. Expansion is deterministic: the same blocks and the
//! same rest defaults always produce the same sequence.
//!
//! Invariants upheld here:
//! - the sequence ends with exactly one `Complete` step and contains no other
//! - rest steps never appear adjacent to each other
//! - the sequence never begins or ends with a rest step
//! - zero-duration rests are omitted entirely

use crate::rest::{resolve_rest, resolve_transition_rest};
use crate::types::{ExerciseBlock, SupersetBlock, TemplateBlock, WorkoutStep};

/// Expand template blocks into the flat sequence a session executes.
///
/// `template_rest_sec` is the template-level default for rest between
/// straight sets; `global_rest_sec` and `global_transition_sec` come from
/// configuration. Transition rests between blocks are tagged with the index
/// of the block they follow.
pub fn generate_steps(
    blocks: &[TemplateBlock],
    template_rest_sec: Option<u32>,
    global_rest_sec: u32,
    global_transition_sec: u32,
) -> Vec<WorkoutStep> {
    let mut steps: Vec<WorkoutStep> = Vec::new();
    // Transition owed by the previously emitted block, flushed only when a
    // later block actually emits steps. This keeps no-op blocks from
    // stranding a rest at the end or doubling one up.
    let mut pending_transition: Option<(usize, u32)> = None;

    for (block_index, block) in blocks.iter().enumerate() {
        let block_steps = match block {
            TemplateBlock::Exercise(ex) => {
                expand_exercise_block(block_index, ex, template_rest_sec, global_rest_sec)
            }
            TemplateBlock::Superset(ss) => expand_superset_block(block_index, ss),
        };

        if block_steps.is_empty() {
            continue;
        }

        if let Some((prev_index, duration)) = pending_transition.take() {
            if duration > 0 {
                steps.push(WorkoutStep::Rest {
                    block_index: prev_index,
                    rest_duration_sec: duration,
                });
            }
        }

        steps.extend(block_steps);
        pending_transition = Some((
            block_index,
            resolve_transition_rest(block.transition_rest_sec(), global_transition_sec),
        ));
    }

    // A trailing transition is never emitted; the workout just ends.
    steps.push(WorkoutStep::Complete {
        block_index: blocks.len(),
    });
    steps
}

fn expand_exercise_block(
    block_index: usize,
    block: &ExerciseBlock,
    template_rest_sec: Option<u32>,
    global_rest_sec: u32,
) -> Vec<WorkoutStep> {
    if block.sets == 0 {
        tracing::warn!(block_id = %block.id, "exercise block with zero sets, skipping");
        return Vec::new();
    }

    let rest = resolve_rest(block.rest_between_sets_sec, template_rest_sec, global_rest_sec);
    let mut steps = Vec::with_capacity(block.sets as usize * 2);

    for set_index in 0..block.sets {
        steps.push(WorkoutStep::Exercise {
            block_index,
            exercise_id: block.exercise_id.clone(),
            set_index,
            total_sets: block.sets,
            reps_min: block.reps_min,
            reps_max: block.reps_max,
            is_superset: false,
            superset_exercise_index: None,
            superset_total_exercises: None,
        });
        // No rest after the final set; the block transition covers that.
        if set_index + 1 < block.sets && rest > 0 {
            steps.push(WorkoutStep::Rest {
                block_index,
                rest_duration_sec: rest,
            });
        }
    }
    steps
}

fn expand_superset_block(block_index: usize, block: &SupersetBlock) -> Vec<WorkoutStep> {
    if block.sets == 0 {
        tracing::warn!(block_id = %block.id, "superset block with zero rounds, skipping");
        return Vec::new();
    }
    if block.exercises.len() < 2 {
        tracing::warn!(
            block_id = %block.id,
            exercises = block.exercises.len(),
            "superset block needs at least two exercises, skipping"
        );
        return Vec::new();
    }

    let total_exercises = block.exercises.len() as u32;
    let mut steps = Vec::new();

    for round in 0..block.sets {
        for (position, entry) in block.exercises.iter().enumerate() {
            steps.push(WorkoutStep::Exercise {
                block_index,
                exercise_id: entry.exercise_id.clone(),
                set_index: round,
                total_sets: block.sets,
                reps_min: entry.reps_min,
                reps_max: entry.reps_max,
                is_superset: true,
                superset_exercise_index: Some(position as u32),
                superset_total_exercises: Some(total_exercises),
            });
            if position + 1 < block.exercises.len() && block.rest_between_exercises_sec > 0 {
                steps.push(WorkoutStep::Rest {
                    block_index,
                    rest_duration_sec: block.rest_between_exercises_sec,
                });
            }
        }
        if round + 1 < block.sets && block.rest_between_supersets_sec > 0 {
            steps.push(WorkoutStep::SupersetRest {
                block_index,
                rest_duration_sec: block.rest_between_supersets_sec,
            });
        }
    }
    steps
}

/// Number of exercise steps in a sequence, i.e. the number of loggable sets.
pub fn count_exercise_steps(steps: &[WorkoutStep]) -> usize {
    steps.iter().filter(|s| s.is_exercise()).count()
}

/// The step at `index` if it exists and is an exercise step. Out-of-range
/// indices and rest/complete positions both yield `None`.
pub fn exercise_step_at(steps: &[WorkoutStep], index: usize) -> Option<&WorkoutStep> {
    steps.get(index).filter(|s| s.is_exercise())
}

/// Ordinal of the exercise step at raw index `index` within the subsequence
/// of exercise steps. Logged sets are keyed by this ordinal so that rest
/// steps do not shift the keys.
pub fn exercise_ordinal(steps: &[WorkoutStep], index: usize) -> Option<usize> {
    exercise_step_at(steps, index)?;
    Some(
        steps[..index]
            .iter()
            .filter(|s| s.is_exercise())
            .count(),
    )
}
