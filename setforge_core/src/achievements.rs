//! Achievement catalog and unlock evaluation.
//!
//! Achievements unlock once and stay unlocked; evaluation only ever adds.
//! Each completed workout is checked against the catalog after its log is
//! persisted, with already-unlocked ids skipped up front.

use crate::history::{aggregate_by_exercise, ExerciseAggregate};
use crate::records::beats_prior;
use crate::store::WorkoutStore;
use crate::types::{ExerciseHistoryEntry, UnlockedAchievement, WorkoutLog};
use crate::Result;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Condition an achievement checks after each completed workout
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AchievementRule {
    /// Total stored logs reached `n` (counting the one just saved).
    TotalLogsAtLeast(usize),
    /// At least `n` logs started within the 7 days ending at this workout.
    LogsInTrailingWeekAtLeast(usize),
    /// Some exercise set a new estimated 1RM record this workout.
    OneRmRecord,
    /// Some exercise set a new session-volume record this workout.
    SessionVolumeRecord,
    /// The workout's template contained a superset block.
    SupersetInTemplate,
}

/// A catalog entry
#[derive(Clone, Debug)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rule: AchievementRule,
}

/// Cached achievement catalog - built once and reused across evaluations
static CATALOG: Lazy<Vec<AchievementDef>> = Lazy::new(|| {
    vec![
        AchievementDef {
            id: "first_workout",
            name: "First Workout",
            description: "Complete your first workout",
            rule: AchievementRule::TotalLogsAtLeast(1),
        },
        AchievementDef {
            id: "week_streak_3",
            name: "Back for More",
            description: "Log three workouts within seven days",
            rule: AchievementRule::LogsInTrailingWeekAtLeast(3),
        },
        AchievementDef {
            id: "ten_workouts",
            name: "Ten Down",
            description: "Log ten workouts",
            rule: AchievementRule::TotalLogsAtLeast(10),
        },
        AchievementDef {
            id: "hundred_workouts",
            name: "Century Club",
            description: "Log one hundred workouts",
            rule: AchievementRule::TotalLogsAtLeast(100),
        },
        AchievementDef {
            id: "one_rm_record",
            name: "New Max",
            description: "Beat your estimated one-rep max on any exercise",
            rule: AchievementRule::OneRmRecord,
        },
        AchievementDef {
            id: "volume_record",
            name: "Volume Dealer",
            description: "Beat your session volume on any exercise",
            rule: AchievementRule::SessionVolumeRecord,
        },
        AchievementDef {
            id: "superset_debut",
            name: "Superset Debut",
            description: "Complete a workout containing a superset",
            rule: AchievementRule::SupersetInTemplate,
        },
    ]
});

/// The full achievement catalog, locked and unlocked alike.
pub fn achievement_catalog() -> &'static [AchievementDef] {
    &CATALOG
}

/// Look up a catalog entry by id.
pub fn achievement_def(id: &str) -> Option<&'static AchievementDef> {
    CATALOG.iter().find(|def| def.id == id)
}

enum RuleOutcome {
    Locked,
    Unlocked(Option<String>),
}

struct EvalContext<'a> {
    log: &'a WorkoutLog,
    aggregates: &'a [ExerciseAggregate],
    prior_history: &'a HashMap<String, Vec<ExerciseHistoryEntry>>,
    total_logs: usize,
    week_logs: usize,
}

/// Evaluate the catalog against a just-completed workout and persist any
/// new unlocks. Returns the newly unlocked achievements only; previously
/// unlocked ids are never re-issued.
pub fn check_achievements<S: WorkoutStore>(
    store: &mut S,
    log: &WorkoutLog,
) -> Result<Vec<UnlockedAchievement>> {
    // Prefetch everything the rules need so each rule stays a pure check.
    let total_logs = store.log_count()?;
    let week_logs = store.logs_started_since(log.ended_at - Duration::days(7))?;
    let already_unlocked = store.unlocked_achievement_ids()?;

    let aggregates = aggregate_by_exercise(log);
    let mut prior_history: HashMap<String, Vec<ExerciseHistoryEntry>> = HashMap::new();
    for agg in &aggregates {
        let rows = store
            .history_for_exercise(&agg.exercise_id)?
            .into_iter()
            .filter(|entry| entry.log_id != log.id)
            .collect();
        prior_history.insert(agg.exercise_id.clone(), rows);
    }

    let ctx = EvalContext {
        log,
        aggregates: &aggregates,
        prior_history: &prior_history,
        total_logs,
        week_logs,
    };

    let mut new_unlocks = Vec::new();
    for def in CATALOG.iter() {
        if already_unlocked.contains(def.id) {
            continue;
        }
        if let RuleOutcome::Unlocked(context) = evaluate_rule(&def.rule, &ctx) {
            tracing::info!(achievement = def.id, "achievement unlocked");
            new_unlocks.push(UnlockedAchievement {
                achievement_id: def.id.to_string(),
                unlocked_at: Utc::now(),
                context,
            });
        }
    }

    if !new_unlocks.is_empty() {
        store.append_achievements(&new_unlocks)?;
    }
    Ok(new_unlocks)
}

fn evaluate_rule(rule: &AchievementRule, ctx: &EvalContext) -> RuleOutcome {
    match rule {
        AchievementRule::TotalLogsAtLeast(n) => {
            if ctx.total_logs >= *n {
                RuleOutcome::Unlocked(Some(format!("{} workouts logged", ctx.total_logs)))
            } else {
                RuleOutcome::Locked
            }
        }
        AchievementRule::LogsInTrailingWeekAtLeast(n) => {
            if ctx.week_logs >= *n {
                RuleOutcome::Unlocked(Some(format!(
                    "{} workouts in seven days",
                    ctx.week_logs
                )))
            } else {
                RuleOutcome::Locked
            }
        }
        AchievementRule::OneRmRecord => {
            for agg in ctx.aggregates {
                let prior_best = prior_best_one_rm(ctx, &agg.exercise_id);
                if let Some(achieved) = agg.best_one_rm_g {
                    if beats_prior(achieved, prior_best) {
                        return RuleOutcome::Unlocked(Some(format!(
                            "{}: est. 1RM {}",
                            agg.exercise_name,
                            format_kg(achieved)
                        )));
                    }
                }
            }
            RuleOutcome::Locked
        }
        AchievementRule::SessionVolumeRecord => {
            for agg in ctx.aggregates {
                let prior_best = prior_best_volume(ctx, &agg.exercise_id);
                if beats_prior(agg.total_volume_g, prior_best) {
                    return RuleOutcome::Unlocked(Some(format!(
                        "{}: volume {}",
                        agg.exercise_name,
                        format_kg(agg.total_volume_g)
                    )));
                }
            }
            RuleOutcome::Locked
        }
        AchievementRule::SupersetInTemplate => {
            if ctx.log.has_superset() {
                RuleOutcome::Unlocked(None)
            } else {
                RuleOutcome::Locked
            }
        }
    }
}

fn prior_best_one_rm(ctx: &EvalContext, exercise_id: &str) -> Option<u64> {
    ctx.prior_history
        .get(exercise_id)?
        .iter()
        .filter_map(|entry| entry.estimated_one_rm_g)
        .max()
}

fn prior_best_volume(ctx: &EvalContext, exercise_id: &str) -> Option<u64> {
    ctx.prior_history
        .get(exercise_id)?
        .iter()
        .map(|entry| entry.total_volume_g)
        .max()
}

/// Display helper: grams to kilograms with one decimal.
pub fn format_kg(grams: u64) -> String {
    format!("{:.1} kg", grams as f64 / 1000.0)
}
