//! Core domain types for the SetForge workout engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Template blocks (straight sets and supersets)
//! - Workout steps produced by template expansion
//! - Performed sets and workout logs
//! - Denormalized exercise history rows
//! - Achievement unlock records and crash-recovery snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Limits and Sentinels
// ============================================================================

/// Sentinel `reps_max` value meaning "as many reps as possible".
pub const AMRAP_REPS: u32 = 999;

/// Upper bound on reps recorded for a single performed set.
pub const MAX_REPS: u32 = 500;

/// Upper bound on the weight recorded for a single performed set, in grams.
pub const MAX_WEIGHT_G: u32 = 2_000_000;

/// Whether a `reps_max` value is the AMRAP sentinel rather than a real target.
pub fn is_amrap(reps_max: u32) -> bool {
    reps_max == AMRAP_REPS
}

// ============================================================================
// Template Block Types
// ============================================================================

/// One exercise slot within a superset round
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupersetEntry {
    pub exercise_id: String,
    pub reps_min: u32,
    pub reps_max: u32,
}

/// A straight-sets block: one movement performed for `sets` sets
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseBlock {
    pub id: String,
    pub exercise_id: String,
    pub sets: u32,
    pub reps_min: u32,
    pub reps_max: u32,
    /// Rest between sets; `None` inherits the template default, then the
    /// global default.
    #[serde(default)]
    pub rest_between_sets_sec: Option<u32>,
    /// Rest after the whole block; `None` inherits the global transition
    /// default.
    #[serde(default)]
    pub transition_rest_sec: Option<u32>,
}

/// A superset block: `sets` rounds of the listed exercises back to back
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupersetBlock {
    pub id: String,
    pub sets: u32,
    pub exercises: Vec<SupersetEntry>,
    pub rest_between_exercises_sec: u32,
    pub rest_between_supersets_sec: u32,
    #[serde(default)]
    pub transition_rest_sec: Option<u32>,
}

/// A template authoring unit, expanded into steps at session start
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateBlock {
    Exercise(ExerciseBlock),
    Superset(SupersetBlock),
}

impl TemplateBlock {
    pub fn is_superset(&self) -> bool {
        matches!(self, TemplateBlock::Superset(_))
    }

    /// The per-block transition-rest override, if the author set one.
    pub fn transition_rest_sec(&self) -> Option<u32> {
        match self {
            TemplateBlock::Exercise(block) => block.transition_rest_sec,
            TemplateBlock::Superset(block) => block.transition_rest_sec,
        }
    }
}

// ============================================================================
// Workout Step Types
// ============================================================================

/// One element of the flat sequence a session walks through.
///
/// Every variant carries the index of the template block it came from, so
/// the UI can show "block 2 of 4" and recovery snapshots stay traceable.
/// `Complete` is tagged with `blocks.len()` (one past the last block).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkoutStep {
    /// Perform one set of one exercise
    Exercise {
        block_index: usize,
        exercise_id: String,
        set_index: u32,
        total_sets: u32,
        reps_min: u32,
        reps_max: u32,
        is_superset: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        superset_exercise_index: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        superset_total_exercises: Option<u32>,
    },
    /// Timed rest between sets, between superset exercises, or between blocks
    Rest {
        block_index: usize,
        rest_duration_sec: u32,
    },
    /// Timed rest between superset rounds
    SupersetRest {
        block_index: usize,
        rest_duration_sec: u32,
    },
    /// Terminal marker; always the last step of a sequence
    Complete { block_index: usize },
}

impl WorkoutStep {
    pub fn block_index(&self) -> usize {
        match self {
            WorkoutStep::Exercise { block_index, .. }
            | WorkoutStep::Rest { block_index, .. }
            | WorkoutStep::SupersetRest { block_index, .. }
            | WorkoutStep::Complete { block_index } => *block_index,
        }
    }

    pub fn is_exercise(&self) -> bool {
        matches!(self, WorkoutStep::Exercise { .. })
    }

    /// True for both rest variants.
    pub fn is_rest(&self) -> bool {
        matches!(
            self,
            WorkoutStep::Rest { .. } | WorkoutStep::SupersetRest { .. }
        )
    }

    /// Rest duration for rest-type steps, `None` otherwise.
    pub fn rest_duration_sec(&self) -> Option<u32> {
        match self {
            WorkoutStep::Rest {
                rest_duration_sec, ..
            }
            | WorkoutStep::SupersetRest {
                rest_duration_sec, ..
            } => Some(*rest_duration_sec),
            _ => None,
        }
    }

    /// Stable path of the originating template slot, e.g. `block1` or
    /// `block2.ex0` for a superset entry.
    pub fn block_path(&self) -> String {
        match self {
            WorkoutStep::Exercise {
                block_index,
                superset_exercise_index: Some(pos),
                ..
            } => format!("block{block_index}.ex{pos}"),
            other => format!("block{}", other.block_index()),
        }
    }
}

// ============================================================================
// Performed Set and Log Types
// ============================================================================

/// One set as the user actually performed it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformedSet {
    pub exercise_id: String,
    pub exercise_name: String,
    /// Path back to the authoring slot (`block1`, `block2.ex0`, ...).
    pub block_path: String,
    pub set_index: u32,
    pub reps_target_min: u32,
    pub reps_target_max: u32,
    pub reps_done: u32,
    /// Weight in grams; unit conversion is a display concern.
    pub weight_g: u32,
}

impl PerformedSet {
    /// Caps reps and weight at the recording limits.
    pub fn clamped(mut self) -> Self {
        self.reps_done = self.reps_done.min(MAX_REPS);
        self.weight_g = self.weight_g.min(MAX_WEIGHT_G);
        self
    }

    /// Volume contribution of this set in grams (weight x reps).
    pub fn volume_g(&self) -> u64 {
        u64::from(self.weight_g) * u64::from(self.reps_done)
    }
}

/// How a workout ended
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// The user walked every step to the end
    Completed,
    /// The user bailed early; logged sets were kept
    Partial,
}

/// An immutable record of one finished workout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: Uuid,
    pub status: LogStatus,
    pub template_id: Option<String>,
    pub template_name: String,
    /// Full copy of the blocks as they were at session start, so later
    /// template edits never rewrite history.
    pub template_snapshot: Vec<TemplateBlock>,
    pub performed_sets: Vec<PerformedSet>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_sec: u32,
    pub total_volume_g: u64,
}

impl WorkoutLog {
    /// Whether the snapshot contains at least one superset block.
    pub fn has_superset(&self) -> bool {
        self.template_snapshot.iter().any(TemplateBlock::is_superset)
    }
}

// ============================================================================
// History and Achievement Types
// ============================================================================

/// Denormalized per-exercise summary of one workout, written at completion
/// so exercise detail screens never scan full logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseHistoryEntry {
    pub log_id: Uuid,
    pub exercise_id: String,
    pub exercise_name: String,
    pub performed_at: DateTime<Utc>,
    pub best_weight_g: u32,
    pub total_volume_g: u64,
    pub total_sets: u32,
    pub total_reps: u32,
    /// Best estimated one-rep max across qualifying sets, `None` when no
    /// set qualified.
    pub estimated_one_rm_g: Option<u64>,
}

/// A permanently unlocked achievement
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnlockedAchievement {
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
    /// Human-readable detail about what triggered the unlock.
    pub context: Option<String>,
}

// ============================================================================
// Crash Recovery Snapshot
// ============================================================================

/// Serializable image of an in-flight session, written periodically so an
/// interrupted workout can be offered for resume on next launch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub template_id: Option<String>,
    pub template_name: String,
    pub blocks: Vec<TemplateBlock>,
    pub steps: Vec<WorkoutStep>,
    pub cursor: usize,
    /// Logged sets keyed by exercise-step ordinal.
    pub performed: BTreeMap<usize, PerformedSet>,
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the running rest timer, if one was running.
    pub rest_ends_at: Option<DateTime<Utc>>,
    pub saved_at: DateTime<Utc>,
}
