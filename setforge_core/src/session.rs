//! Workout session state machine.
//!
//! One [`WorkoutSession`] instance drives one workout from start to saved
//! log. The phase moves Idle -> Active -> Recap -> Complete; `reset` is the
//! only way back to Idle. All mutating operations are guarded by phase, so
//! double-taps and late timer signals degrade to logged no-ops instead of
//! corrupting state.
//!
//! The session is the only writer of the crash-recovery snapshot and
//! refuses to write one outside the Active phase, which is what guarantees
//! a finished workout can never resurrect as a phantom resume offer.

use crate::steps::{count_exercise_steps, exercise_ordinal, generate_steps};
use crate::store::WorkoutStore;
use crate::timer::{RestTimer, TimerSignal};
use crate::types::{
    LogStatus, PerformedSet, SessionSnapshot, TemplateBlock, WorkoutLog, WorkoutStep,
};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Host-supplied sensory cues (sounds, haptics, toasts). All methods
/// default to no-ops; cue failures must never affect session state, so
/// implementations should swallow their own errors.
pub trait SessionCues {
    /// Rest is about to end.
    fn rest_ending(&self, _remaining_ms: u64) {}
    /// Rest ended.
    fn rest_complete(&self) {}
    /// The workout log was persisted.
    fn workout_saved(&self) {}
}

/// Cue sink that does nothing
pub struct NoCues;

impl SessionCues for NoCues {}

/// Lifecycle phase of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No workout running
    Idle,
    /// Walking the step sequence
    Active,
    /// All steps done or ended early; reviewing before save
    Recap,
    /// Log persisted; session is spent
    Complete,
}

/// Events surfaced to the host from [`WorkoutSession::poll`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Rest countdown ticked.
    RestTick { remaining_ms: u64 },
    /// Rest countdown crossed the cue threshold; the cue already fired.
    RestEndingSoon { remaining_ms: u64 },
    /// Rest finished and the session advanced to `next_cursor`.
    RestFinished { next_cursor: usize },
}

/// State machine for one workout execution
pub struct WorkoutSession {
    phase: SessionPhase,
    template_id: Option<String>,
    template_name: String,
    blocks: Vec<TemplateBlock>,
    steps: Vec<WorkoutStep>,
    cursor: usize,
    performed: BTreeMap<usize, PerformedSet>,
    started_at: Option<DateTime<Utc>>,
    ended_early: bool,
    timer: RestTimer,
    cue_threshold_ms: u64,
    cue_fired: bool,
    cues: Box<dyn SessionCues>,
    recovery_path: Option<PathBuf>,
}

impl WorkoutSession {
    pub fn new() -> Self {
        Self::with_cues(Box::new(NoCues))
    }

    pub fn with_cues(cues: Box<dyn SessionCues>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            template_id: None,
            template_name: String::new(),
            blocks: Vec::new(),
            steps: Vec::new(),
            cursor: 0,
            performed: BTreeMap::new(),
            started_at: None,
            ended_early: false,
            timer: RestTimer::new(),
            cue_threshold_ms: 3_000,
            cue_fired: false,
            cues,
            recovery_path: None,
        }
    }

    /// Where crash snapshots go. `None` disables snapshotting.
    pub fn set_recovery_path(&mut self, path: Option<PathBuf>) {
        self.recovery_path = path;
    }

    /// Remaining rest at which the rest-ending cue fires.
    pub fn set_cue_threshold(&mut self, threshold_sec: u32) {
        self.cue_threshold_ms = u64::from(threshold_sec) * 1_000;
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Expand the template and begin walking it. Runs at most once per
    /// session: calls outside Idle are logged no-ops.
    pub fn start_workout(
        &mut self,
        template_id: Option<String>,
        template_name: &str,
        blocks: Vec<TemplateBlock>,
        template_rest_sec: Option<u32>,
        global_rest_sec: u32,
        global_transition_sec: u32,
    ) {
        if self.phase != SessionPhase::Idle {
            tracing::warn!(phase = ?self.phase, "start_workout ignored outside idle");
            return;
        }

        self.steps = generate_steps(
            &blocks,
            template_rest_sec,
            global_rest_sec,
            global_transition_sec,
        );
        self.blocks = blocks;
        self.template_id = template_id;
        self.template_name = template_name.to_string();
        self.cursor = 0;
        self.performed.clear();
        self.started_at = Some(Utc::now());
        self.ended_early = false;
        self.cue_fired = false;
        self.phase = SessionPhase::Active;

        tracing::info!(
            template = %self.template_name,
            steps = self.steps.len(),
            "workout session started"
        );
    }

    /// Rebuild an Active session from a crash snapshot. Only valid from
    /// Idle. If the snapshot recorded a running rest that has not expired
    /// yet, the countdown resumes for the remaining wall-clock time.
    pub fn resume_from(&mut self, snapshot: SessionSnapshot) {
        if self.phase != SessionPhase::Idle {
            tracing::warn!(phase = ?self.phase, "resume_from ignored outside idle");
            return;
        }

        self.template_id = snapshot.template_id;
        self.template_name = snapshot.template_name;
        self.blocks = snapshot.blocks;
        self.cursor = snapshot
            .cursor
            .min(snapshot.steps.len().saturating_sub(1));
        self.steps = snapshot.steps;
        self.performed = snapshot.performed;
        self.started_at = Some(snapshot.started_at);
        self.ended_early = false;
        self.cue_fired = false;
        self.phase = SessionPhase::Active;

        if let Some(ends_at) = snapshot.rest_ends_at {
            let remaining = (ends_at - Utc::now()).num_seconds();
            let on_rest = self
                .steps
                .get(self.cursor)
                .map(WorkoutStep::is_rest)
                .unwrap_or(false);
            if remaining > 0 && on_rest {
                self.timer
                    .start(remaining.min(i64::from(u32::MAX)) as u32);
            }
        }

        tracing::info!(
            template = %self.template_name,
            cursor = self.cursor,
            sets = self.performed.len(),
            "session resumed from snapshot"
        );
    }

    /// Move to the next step. Walking onto the terminal step enters Recap.
    /// Any running rest countdown is abandoned, so a pending completion
    /// can never double-advance.
    pub fn advance_step(&mut self) -> Option<&WorkoutStep> {
        if self.phase != SessionPhase::Active {
            tracing::warn!(phase = ?self.phase, "advance_step ignored outside active");
            return None;
        }

        self.timer.stop();
        self.cue_fired = false;
        if self.cursor + 1 < self.steps.len() {
            self.cursor += 1;
        }
        if matches!(
            self.steps.get(self.cursor),
            Some(WorkoutStep::Complete { .. })
        ) {
            self.enter_recap();
        }
        self.steps.get(self.cursor)
    }

    /// Bail out now, keeping every logged set. Enters Recap; the eventual
    /// log is marked partial.
    pub fn end_workout_early(&mut self) {
        if self.phase != SessionPhase::Active {
            tracing::warn!(phase = ?self.phase, "end_workout_early ignored outside active");
            return;
        }
        self.ended_early = true;
        tracing::info!(sets = self.performed.len(), "workout ended early");
        self.enter_recap();
    }

    fn enter_recap(&mut self) {
        self.timer.stop();
        self.phase = SessionPhase::Recap;
        tracing::debug!("session entered recap");
    }

    /// Build the immutable log, persist it, and finish the session.
    ///
    /// The log append is the prerequisite for everything else: if it fails
    /// the error propagates, the session stays in Recap, and the recovery
    /// snapshot is left in place so nothing is lost. Only after the log is
    /// durable is the snapshot cleared. Returns `Ok(None)` when there is
    /// nothing worth saving (no sets and no elapsed time).
    pub fn complete_workout<S: WorkoutStore>(&mut self, store: &mut S) -> Result<Option<WorkoutLog>> {
        if self.phase != SessionPhase::Recap {
            tracing::warn!(phase = ?self.phase, "complete_workout ignored outside recap");
            return Ok(None);
        }
        let Some(started_at) = self.started_at else {
            return Ok(None);
        };

        let ended_at = Utc::now();
        let duration_sec = (ended_at - started_at).num_seconds().max(0) as u32;
        if self.performed.is_empty() && duration_sec == 0 {
            tracing::info!("nothing performed and no time elapsed, discarding session");
            return Ok(None);
        }

        let performed_sets: Vec<PerformedSet> = self.performed.values().cloned().collect();
        let total_volume_g = performed_sets.iter().map(PerformedSet::volume_g).sum();
        let log = WorkoutLog {
            id: Uuid::new_v4(),
            status: if self.ended_early {
                LogStatus::Partial
            } else {
                LogStatus::Completed
            },
            template_id: self.template_id.clone(),
            template_name: self.template_name.clone(),
            template_snapshot: self.blocks.clone(),
            performed_sets,
            started_at,
            ended_at,
            duration_sec,
            total_volume_g,
        };

        store.append_log(&log)?;
        self.clear_recovery();
        self.cues.workout_saved();
        self.phase = SessionPhase::Complete;

        tracing::info!(
            log_id = %log.id,
            status = ?log.status,
            sets = log.performed_sets.len(),
            "workout log saved"
        );
        Ok(Some(log))
    }

    /// Return to Idle, dropping all in-memory state and the recovery
    /// snapshot. Safe in any phase.
    pub fn reset(&mut self) {
        self.timer.stop();
        self.clear_recovery();
        self.phase = SessionPhase::Idle;
        self.template_id = None;
        self.template_name.clear();
        self.blocks.clear();
        self.steps.clear();
        self.cursor = 0;
        self.performed.clear();
        self.started_at = None;
        self.ended_early = false;
        self.cue_fired = false;
    }

    // ------------------------------------------------------------------
    // Set logging
    // ------------------------------------------------------------------

    /// Record or overwrite the set for one exercise ordinal. Values are
    /// clamped to the recording limits. Allowed while Active and in Recap
    /// (the recap screen lets the user fix numbers before saving).
    pub fn upsert_set(&mut self, ordinal: usize, set: PerformedSet) -> bool {
        if !matches!(self.phase, SessionPhase::Active | SessionPhase::Recap) {
            tracing::warn!(phase = ?self.phase, "upsert_set ignored in this phase");
            return false;
        }
        let total = count_exercise_steps(&self.steps);
        if ordinal >= total {
            tracing::warn!(ordinal, total, "set ordinal out of range, ignoring");
            return false;
        }
        self.performed.insert(ordinal, set.clamped());
        true
    }

    // ------------------------------------------------------------------
    // Rest timing
    // ------------------------------------------------------------------

    /// Start the countdown for the rest step under the cursor.
    ///
    /// `entry_elapsed_sec` is how long the user already spent entering set
    /// data; it is deducted so logging time counts as rest already taken.
    /// A deduction at or beyond the step duration completes on first poll.
    /// Returns false when not on a rest step.
    pub fn start_rest_timer(&mut self, entry_elapsed_sec: u32) -> bool {
        if self.phase != SessionPhase::Active {
            tracing::warn!(phase = ?self.phase, "start_rest_timer ignored outside active");
            return false;
        }
        let Some(duration) = self
            .steps
            .get(self.cursor)
            .and_then(WorkoutStep::rest_duration_sec)
        else {
            tracing::warn!(cursor = self.cursor, "start_rest_timer on a non-rest step");
            return false;
        };

        self.cue_fired = false;
        self.timer.start(duration.saturating_sub(entry_elapsed_sec));
        true
    }

    /// Drive the rest countdown. Call at display cadence while resting.
    pub fn poll(&mut self) -> Option<SessionEvent> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        match self.timer.poll()? {
            TimerSignal::Tick { remaining_ms, .. } => {
                if !self.cue_fired && remaining_ms <= self.cue_threshold_ms {
                    self.cue_fired = true;
                    self.cues.rest_ending(remaining_ms);
                    Some(SessionEvent::RestEndingSoon { remaining_ms })
                } else {
                    Some(SessionEvent::RestTick { remaining_ms })
                }
            }
            TimerSignal::Completed { generation } => self.finish_rest(generation),
        }
    }

    /// Cut the rest short, advancing exactly as natural expiry would.
    /// Also usable on a rest step whose countdown was never started.
    pub fn skip_rest(&mut self) -> Option<SessionEvent> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        if let Some(TimerSignal::Completed { generation }) = self.timer.skip() {
            return self.finish_rest(generation);
        }
        let on_rest = self
            .steps
            .get(self.cursor)
            .map(WorkoutStep::is_rest)
            .unwrap_or(false);
        if on_rest {
            self.advance_step();
            return Some(SessionEvent::RestFinished {
                next_cursor: self.cursor,
            });
        }
        None
    }

    /// Add or remove seconds on the running countdown.
    pub fn adjust_rest(&mut self, delta_sec: i64) {
        if self.phase == SessionPhase::Active {
            self.timer.adjust(delta_sec);
        }
    }

    /// Handle a countdown completion, ignoring signals from an abandoned
    /// countdown or ones arriving after the session moved off the rest
    /// step. Exactly one advance per rest, no matter how signals race.
    fn finish_rest(&mut self, generation: u64) -> Option<SessionEvent> {
        if generation != self.timer.generation() {
            tracing::debug!(generation, "stale rest completion ignored");
            return None;
        }
        let on_rest = self
            .steps
            .get(self.cursor)
            .map(WorkoutStep::is_rest)
            .unwrap_or(false);
        if !on_rest {
            tracing::debug!(cursor = self.cursor, "rest completion after moving on, ignored");
            return None;
        }

        self.cues.rest_complete();
        self.advance_step();
        Some(SessionEvent::RestFinished {
            next_cursor: self.cursor,
        })
    }

    // ------------------------------------------------------------------
    // Crash recovery
    // ------------------------------------------------------------------

    /// Persist a crash snapshot of the running session. Refuses outside
    /// Active so a session in Recap or Complete can never leave a snapshot
    /// behind. Write failures are logged, not propagated; losing one
    /// snapshot tick must not disturb the workout.
    pub fn write_crash_recovery(&self) -> bool {
        if self.phase != SessionPhase::Active {
            tracing::debug!(phase = ?self.phase, "snapshot suppressed outside active");
            return false;
        }
        let Some(path) = self.recovery_path.as_ref() else {
            return false;
        };
        let Some(started_at) = self.started_at else {
            return false;
        };

        let rest_ends_at = if self.timer.is_running() {
            Some(Utc::now() + chrono::Duration::milliseconds(self.timer.remaining_ms() as i64))
        } else {
            None
        };

        let snapshot = SessionSnapshot {
            template_id: self.template_id.clone(),
            template_name: self.template_name.clone(),
            blocks: self.blocks.clone(),
            steps: self.steps.clone(),
            cursor: self.cursor,
            performed: self.performed.clone(),
            started_at,
            rest_ends_at,
            saved_at: Utc::now(),
        };

        match snapshot.save(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("crash snapshot write failed: {}", e);
                false
            }
        }
    }

    fn clear_recovery(&self) {
        if let Some(path) = self.recovery_path.as_ref() {
            if let Err(e) = SessionSnapshot::clear(path) {
                tracing::warn!("failed to clear recovery snapshot: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn steps(&self) -> &[WorkoutStep] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_step(&self) -> Option<&WorkoutStep> {
        self.steps.get(self.cursor)
    }

    /// Exercise ordinal of the current step, `None` on rest and terminal
    /// steps. This is the key [`Self::upsert_set`] expects.
    pub fn current_exercise_ordinal(&self) -> Option<usize> {
        exercise_ordinal(&self.steps, self.cursor)
    }

    pub fn performed_sets(&self) -> &BTreeMap<usize, PerformedSet> {
        &self.performed
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn rest_remaining_ms(&self) -> Option<u64> {
        self.timer.is_running().then(|| self.timer.remaining_ms())
    }
}

impl Default for WorkoutSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonlStore;
    use crate::types::{ExerciseBlock, SupersetBlock, SupersetEntry};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn two_block_template() -> Vec<TemplateBlock> {
        vec![
            TemplateBlock::Exercise(ExerciseBlock {
                id: "b1".to_string(),
                exercise_id: "squat".to_string(),
                sets: 2,
                reps_min: 5,
                reps_max: 8,
                rest_between_sets_sec: Some(60),
                transition_rest_sec: Some(0),
            }),
            TemplateBlock::Superset(SupersetBlock {
                id: "b2".to_string(),
                sets: 1,
                exercises: vec![
                    SupersetEntry {
                        exercise_id: "row".to_string(),
                        reps_min: 8,
                        reps_max: 12,
                    },
                    SupersetEntry {
                        exercise_id: "curl".to_string(),
                        reps_min: 10,
                        reps_max: 15,
                    },
                ],
                rest_between_exercises_sec: 30,
                rest_between_supersets_sec: 120,
                transition_rest_sec: None,
            }),
        ]
    }

    fn performed(exercise_id: &str, reps: u32, weight_g: u32) -> PerformedSet {
        PerformedSet {
            exercise_id: exercise_id.to_string(),
            exercise_name: exercise_id.to_string(),
            block_path: "block0".to_string(),
            set_index: 0,
            reps_target_min: 5,
            reps_target_max: 8,
            reps_done: reps,
            weight_g,
        }
    }

    fn started_session() -> WorkoutSession {
        let mut session = WorkoutSession::new();
        session.start_workout(
            Some("tpl-1".to_string()),
            "Leg Day",
            two_block_template(),
            None,
            90,
            60,
        );
        session
    }

    struct RecordingCues(Rc<RefCell<Vec<&'static str>>>);

    impl SessionCues for RecordingCues {
        fn rest_ending(&self, _remaining_ms: u64) {
            self.0.borrow_mut().push("rest_ending");
        }
        fn rest_complete(&self) {
            self.0.borrow_mut().push("rest_complete");
        }
        fn workout_saved(&self) {
            self.0.borrow_mut().push("workout_saved");
        }
    }

    #[test]
    fn test_start_generates_steps_and_activates() {
        let session = started_session();
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.cursor(), 0);
        // Squat x2 with rest + superset round = Ex,Rest,Ex,Ex,Rest,Ex,Complete
        assert_eq!(session.steps().len(), 7);
        assert!(session.current_step().unwrap().is_exercise());
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_start_is_guarded_once_active() {
        let mut session = started_session();
        let steps_before = session.steps().to_vec();
        session.start_workout(None, "Other", vec![], None, 90, 60);
        assert_eq!(session.template_name(), "Leg Day");
        assert_eq!(session.steps(), steps_before.as_slice());
    }

    #[test]
    fn test_walk_to_recap() {
        let mut session = started_session();
        for _ in 0..session.steps().len() {
            if session.phase() != SessionPhase::Active {
                break;
            }
            if session.current_step().map(|s| s.is_rest()).unwrap_or(false) {
                session.skip_rest();
            } else {
                session.advance_step();
            }
        }
        assert_eq!(session.phase(), SessionPhase::Recap);
    }

    #[test]
    fn test_upsert_set_clamps_and_bounds() {
        let mut session = started_session();
        assert!(session.upsert_set(0, performed("squat", 9_999, 5_000_000)));
        let stored = &session.performed_sets()[&0];
        assert_eq!(stored.reps_done, crate::types::MAX_REPS);
        assert_eq!(stored.weight_g, crate::types::MAX_WEIGHT_G);

        // 4 exercise steps in this template: ordinals 0..=3 only.
        assert!(!session.upsert_set(4, performed("squat", 5, 60_000)));
        assert_eq!(session.performed_sets().len(), 1);
    }

    #[test]
    fn test_upsert_overwrites_same_ordinal() {
        let mut session = started_session();
        session.upsert_set(0, performed("squat", 5, 60_000));
        session.upsert_set(0, performed("squat", 6, 62_500));
        assert_eq!(session.performed_sets().len(), 1);
        assert_eq!(session.performed_sets()[&0].reps_done, 6);
    }

    #[test]
    fn test_complete_workout_persists_and_reports() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        let mut session = started_session();
        session.upsert_set(0, performed("squat", 5, 100_000));
        session.upsert_set(1, performed("squat", 5, 100_000));
        for _ in 0..session.steps().len() {
            if session.phase() != SessionPhase::Active {
                break;
            }
            if session.current_step().map(|s| s.is_rest()).unwrap_or(false) {
                session.skip_rest();
            } else {
                session.advance_step();
            }
        }

        let log = session.complete_workout(&mut store).unwrap().unwrap();
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert_eq!(log.status, LogStatus::Completed);
        assert_eq!(log.performed_sets.len(), 2);
        assert_eq!(log.total_volume_g, 1_000_000);
        assert_eq!(log.template_snapshot.len(), 2);
        assert_eq!(store.log_count().unwrap(), 1);
    }

    #[test]
    fn test_end_early_marks_partial() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        let mut session = started_session();
        session.upsert_set(0, performed("squat", 5, 100_000));
        session.end_workout_early();
        assert_eq!(session.phase(), SessionPhase::Recap);

        let log = session.complete_workout(&mut store).unwrap().unwrap();
        assert_eq!(log.status, LogStatus::Partial);
        assert_eq!(log.performed_sets.len(), 1);
    }

    #[test]
    fn test_complete_without_recap_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        let mut session = started_session();
        let result = session.complete_workout(&mut store).unwrap();
        assert!(result.is_none());
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(store.log_count().unwrap(), 0);
    }

    #[test]
    fn test_rest_flow_with_cues() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut session = WorkoutSession::with_cues(Box::new(RecordingCues(events.clone())));
        session.set_cue_threshold(3);
        session.start_workout(None, "Legs", two_block_template(), None, 90, 60);

        // Move onto the first rest step (60s between squat sets).
        session.advance_step();
        assert!(session.current_step().unwrap().is_rest());

        // Entry time eats 58s of the 60s rest, leaving ~2s: under the cue
        // threshold, so the first poll cues "rest ending".
        assert!(session.start_rest_timer(58));
        match session.poll() {
            Some(SessionEvent::RestEndingSoon { remaining_ms }) => {
                assert!(remaining_ms <= 3_000);
            }
            other => panic!("expected ending-soon, got {:?}", other),
        }
        // The cue fires once; later polls are plain ticks.
        assert!(matches!(
            session.poll(),
            Some(SessionEvent::RestTick { .. })
        ));

        let finished = session.skip_rest();
        assert!(matches!(finished, Some(SessionEvent::RestFinished { .. })));
        assert!(session.current_step().unwrap().is_exercise());

        let recorded = events.borrow();
        assert_eq!(*recorded, vec!["rest_ending", "rest_complete"]);
    }

    #[test]
    fn test_entry_time_swallowing_whole_rest() {
        let mut session = started_session();
        session.advance_step();
        assert!(session.current_step().unwrap().is_rest());

        // 90s of data entry against a 60s rest: countdown is born expired.
        assert!(session.start_rest_timer(90));
        match session.poll() {
            Some(SessionEvent::RestFinished { next_cursor }) => {
                assert_eq!(next_cursor, 2);
            }
            other => panic!("expected immediate finish, got {:?}", other),
        }
        assert!(session.current_step().unwrap().is_exercise());
    }

    #[test]
    fn test_manual_advance_abandons_countdown() {
        let mut session = started_session();
        session.advance_step();
        assert!(session.start_rest_timer(0));
        assert!(matches!(session.poll(), Some(SessionEvent::RestTick { .. })));

        // User taps "next" instead of waiting; the countdown dies with it.
        session.advance_step();
        assert!(session.current_step().unwrap().is_exercise());
        assert_eq!(session.poll(), None);
        assert_eq!(session.rest_remaining_ms(), None);
    }

    #[test]
    fn test_skip_rest_without_countdown_still_advances() {
        let mut session = started_session();
        session.advance_step();
        assert!(session.current_step().unwrap().is_rest());

        let finished = session.skip_rest();
        assert!(matches!(finished, Some(SessionEvent::RestFinished { .. })));
        assert!(session.current_step().unwrap().is_exercise());
    }

    #[test]
    fn test_skip_rest_on_exercise_step_is_noop() {
        let mut session = started_session();
        assert!(session.current_step().unwrap().is_exercise());
        assert_eq!(session.skip_rest(), None);
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn test_start_rest_timer_on_exercise_step_refused() {
        let mut session = started_session();
        assert!(!session.start_rest_timer(0));
        assert_eq!(session.rest_remaining_ms(), None);
    }

    #[test]
    fn test_adjust_rest_can_finish_countdown() {
        let mut session = started_session();
        session.advance_step();
        session.start_rest_timer(0);
        session.adjust_rest(-120);
        assert!(matches!(
            session.poll(),
            Some(SessionEvent::RestFinished { .. })
        ));
    }

    #[test]
    fn test_crash_snapshot_only_while_active() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recovery = temp_dir.path().join("recovery.json");

        let mut session = started_session();
        session.set_recovery_path(Some(recovery.clone()));
        session.upsert_set(0, performed("squat", 5, 100_000));

        assert!(session.write_crash_recovery());
        assert!(recovery.exists());

        session.end_workout_early();
        assert_eq!(session.phase(), SessionPhase::Recap);
        // Snapshot still on disk from the active phase, but no new writes.
        assert!(!session.write_crash_recovery());

        let mut store = JsonlStore::open(temp_dir.path().join("data")).unwrap();
        session.complete_workout(&mut store).unwrap().unwrap();
        assert_eq!(session.phase(), SessionPhase::Complete);
        assert!(!session.write_crash_recovery());
        // Completing cleared the stale snapshot.
        assert!(!recovery.exists());
    }

    #[test]
    fn test_failed_save_preserves_recap_and_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recovery = temp_dir.path().join("recovery.json");
        let data_dir = temp_dir.path().join("data");
        let mut store = JsonlStore::open(&data_dir).unwrap();
        // Block the log file so the append fails.
        std::fs::create_dir(store.logs_path()).unwrap();

        let mut session = started_session();
        session.set_recovery_path(Some(recovery.clone()));
        session.upsert_set(0, performed("squat", 5, 100_000));
        session.write_crash_recovery();
        session.end_workout_early();

        assert!(session.complete_workout(&mut store).is_err());
        // Failure leaves the session in recap with the snapshot intact.
        assert_eq!(session.phase(), SessionPhase::Recap);
        assert!(recovery.exists());
    }

    #[test]
    fn test_resume_restores_progress() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recovery = temp_dir.path().join("recovery.json");

        let mut session = started_session();
        session.set_recovery_path(Some(recovery.clone()));
        session.upsert_set(0, performed("squat", 5, 100_000));
        session.advance_step();
        session.write_crash_recovery();
        let cursor_at_crash = session.cursor();

        // "Crash": load the snapshot into a fresh session.
        let snapshot = SessionSnapshot::load(&recovery).unwrap().unwrap();
        let mut resumed = WorkoutSession::new();
        resumed.resume_from(snapshot);

        assert_eq!(resumed.phase(), SessionPhase::Active);
        assert_eq!(resumed.cursor(), cursor_at_crash);
        assert_eq!(resumed.template_name(), "Leg Day");
        assert_eq!(resumed.performed_sets().len(), 1);
        assert_eq!(resumed.performed_sets()[&0].weight_g, 100_000);
    }

    #[test]
    fn test_resume_revives_running_rest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recovery = temp_dir.path().join("recovery.json");

        let mut session = started_session();
        session.set_recovery_path(Some(recovery.clone()));
        session.advance_step();
        session.start_rest_timer(0);
        session.write_crash_recovery();

        let snapshot = SessionSnapshot::load(&recovery).unwrap().unwrap();
        assert!(snapshot.rest_ends_at.is_some());

        let mut resumed = WorkoutSession::new();
        resumed.resume_from(snapshot);
        let remaining = resumed.rest_remaining_ms().expect("rest should resume");
        assert!(remaining <= 60_000);
        assert!(remaining > 50_000);
    }

    #[test]
    fn test_resume_with_expired_rest_does_not_revive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recovery = temp_dir.path().join("recovery.json");

        let mut session = started_session();
        session.set_recovery_path(Some(recovery.clone()));
        session.advance_step();
        session.start_rest_timer(0);
        session.write_crash_recovery();

        let mut snapshot = SessionSnapshot::load(&recovery).unwrap().unwrap();
        // Pretend the rest ended while the app was gone.
        snapshot.rest_ends_at = Some(Utc::now() - chrono::Duration::seconds(30));

        let mut resumed = WorkoutSession::new();
        resumed.resume_from(snapshot);
        assert_eq!(resumed.rest_remaining_ms(), None);
        // Still parked on the rest step; the user decides when to move on.
        assert!(resumed.current_step().unwrap().is_rest());
    }

    #[test]
    fn test_reset_returns_to_idle_and_clears_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let recovery = temp_dir.path().join("recovery.json");

        let mut session = started_session();
        session.set_recovery_path(Some(recovery.clone()));
        session.write_crash_recovery();
        assert!(recovery.exists());

        session.reset();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.steps().is_empty());
        assert!(session.performed_sets().is_empty());
        assert!(!recovery.exists());

        // A reset session can start fresh.
        session.start_workout(None, "Again", two_block_template(), None, 90, 60);
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_empty_session_discarded_on_complete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        let mut session = started_session();
        session.end_workout_early();
        // No sets and sub-second elapsed time: nothing worth saving.
        let result = session.complete_workout(&mut store).unwrap();
        assert!(result.is_none());
        assert_eq!(store.log_count().unwrap(), 0);
        assert_eq!(session.phase(), SessionPhase::Recap);
    }

    #[test]
    fn test_workout_saved_cue_fires_on_persist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));

        let mut session = WorkoutSession::with_cues(Box::new(RecordingCues(events.clone())));
        session.start_workout(None, "Legs", two_block_template(), None, 90, 60);
        session.upsert_set(0, performed("squat", 5, 100_000));
        session.end_workout_early();
        session.complete_workout(&mut store).unwrap().unwrap();

        assert!(events.borrow().contains(&"workout_saved"));
    }
}
