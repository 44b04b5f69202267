//! Append-oriented persistence for logs, history, and achievements.
//!
//! Three JSONL (JSON Lines) files live under the data directory:
//! `logs.jsonl` for finished workouts, `history.jsonl` for denormalized
//! per-exercise rows, `achievements.jsonl` for unlock records. Appends and
//! reads take fs2 file locks so concurrent invocations stay safe. Corrupt
//! lines are skipped with a warning rather than failing the whole read.

use crate::{Error, ExerciseHistoryEntry, Result, UnlockedAchievement, WorkoutLog};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Persistence operations the engine needs from its backing store.
///
/// The completion pipeline and the session are written against this trait,
/// so tests and alternative frontends can substitute their own storage.
pub trait WorkoutStore {
    /// Append a finished workout log.
    fn append_log(&mut self, log: &WorkoutLog) -> Result<()>;

    /// Total number of stored logs.
    fn log_count(&self) -> Result<usize>;

    /// Number of logs whose `started_at` is at or after `cutoff`.
    fn logs_started_since(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// All stored logs, oldest first.
    fn all_logs(&self) -> Result<Vec<WorkoutLog>>;

    /// Remove a log and its denormalized history rows. Achievements are
    /// permanent and stay untouched.
    fn delete_log(&mut self, id: &Uuid) -> Result<()>;

    /// Append denormalized history rows for one completed workout.
    fn add_history_entries(&mut self, entries: &[ExerciseHistoryEntry]) -> Result<()>;

    /// History rows for one exercise, sorted by `performed_at` ascending.
    fn history_for_exercise(&self, exercise_id: &str) -> Result<Vec<ExerciseHistoryEntry>>;

    /// All unlock records, in unlock order.
    fn unlocked_achievements(&self) -> Result<Vec<UnlockedAchievement>>;

    /// Ids of already-unlocked achievements.
    fn unlocked_achievement_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .unlocked_achievements()?
            .into_iter()
            .map(|a| a.achievement_id)
            .collect())
    }

    /// Append freshly unlocked achievements.
    fn append_achievements(&mut self, unlocked: &[UnlockedAchievement]) -> Result<()>;
}

/// File-backed store over JSONL files in a single data directory
pub struct JsonlStore {
    root: PathBuf,
}

impl JsonlStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn logs_path(&self) -> PathBuf {
        self.root.join("logs.jsonl")
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.jsonl")
    }

    pub fn achievements_path(&self) -> PathBuf {
        self.root.join("achievements.jsonl")
    }
}

impl WorkoutStore for JsonlStore {
    fn append_log(&mut self, log: &WorkoutLog) -> Result<()> {
        append_lines(&self.logs_path(), std::slice::from_ref(log))?;
        tracing::debug!(log_id = %log.id, "appended workout log");
        Ok(())
    }

    fn log_count(&self) -> Result<usize> {
        Ok(read_lines::<WorkoutLog>(&self.logs_path())?.len())
    }

    fn logs_started_since(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(read_lines::<WorkoutLog>(&self.logs_path())?
            .iter()
            .filter(|log| log.started_at >= cutoff)
            .count())
    }

    fn all_logs(&self) -> Result<Vec<WorkoutLog>> {
        read_lines(&self.logs_path())
    }

    fn delete_log(&mut self, id: &Uuid) -> Result<()> {
        let logs: Vec<WorkoutLog> = read_lines(&self.logs_path())?
            .into_iter()
            .filter(|log: &WorkoutLog| log.id != *id)
            .collect();
        rewrite_lines(&self.logs_path(), &logs)?;

        let history: Vec<ExerciseHistoryEntry> = read_lines(&self.history_path())?
            .into_iter()
            .filter(|entry: &ExerciseHistoryEntry| entry.log_id != *id)
            .collect();
        rewrite_lines(&self.history_path(), &history)?;

        tracing::info!(log_id = %id, "deleted workout log and its history rows");
        Ok(())
    }

    fn add_history_entries(&mut self, entries: &[ExerciseHistoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        append_lines(&self.history_path(), entries)?;
        tracing::debug!(count = entries.len(), "appended history entries");
        Ok(())
    }

    fn history_for_exercise(&self, exercise_id: &str) -> Result<Vec<ExerciseHistoryEntry>> {
        let mut entries: Vec<ExerciseHistoryEntry> = read_lines(&self.history_path())?
            .into_iter()
            .filter(|entry: &ExerciseHistoryEntry| entry.exercise_id == exercise_id)
            .collect();
        entries.sort_by_key(|entry| entry.performed_at);
        Ok(entries)
    }

    fn unlocked_achievements(&self) -> Result<Vec<UnlockedAchievement>> {
        read_lines(&self.achievements_path())
    }

    fn append_achievements(&mut self, unlocked: &[UnlockedAchievement]) -> Result<()> {
        if unlocked.is_empty() {
            return Ok(());
        }
        append_lines(&self.achievements_path(), unlocked)
    }
}

/// Append records as JSON lines under one exclusive lock.
fn append_lines<T: Serialize>(path: &Path, values: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let mut writer = std::io::BufWriter::new(&file);
    for value in values {
        let line = serde_json::to_string(value)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    file.unlock()?;
    Ok(())
}

/// Read every parseable record from a JSONL file under a shared lock.
/// Missing files read as empty; unparseable lines are skipped with a warning.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut values = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(value) => values.push(value),
            Err(e) => {
                tracing::warn!("Skipping bad record at {:?}:{}: {}", path, line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    Ok(values)
}

/// Replace a JSONL file's contents atomically via temp file and rename.
fn rewrite_lines<T: Serialize>(path: &Path, values: &[T]) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Err(Error::Store(format!("path {:?} has no parent", path)));
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for value in values {
            let line = serde_json::to_string(value)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogStatus, PerformedSet};
    use chrono::Duration;

    fn sample_log(started_offset_days: i64) -> WorkoutLog {
        let started_at = Utc::now() - Duration::days(started_offset_days);
        WorkoutLog {
            id: Uuid::new_v4(),
            status: LogStatus::Completed,
            template_id: Some("tpl-push".to_string()),
            template_name: "Push Day".to_string(),
            template_snapshot: vec![],
            performed_sets: vec![PerformedSet {
                exercise_id: "bench_press".to_string(),
                exercise_name: "Bench Press".to_string(),
                block_path: "block0".to_string(),
                set_index: 0,
                reps_target_min: 5,
                reps_target_max: 8,
                reps_done: 5,
                weight_g: 80_000,
            }],
            started_at,
            ended_at: started_at + Duration::minutes(45),
            duration_sec: 2_700,
            total_volume_g: 400_000,
        }
    }

    fn sample_history(log_id: Uuid, exercise_id: &str, days_ago: i64) -> ExerciseHistoryEntry {
        ExerciseHistoryEntry {
            log_id,
            exercise_id: exercise_id.to_string(),
            exercise_name: exercise_id.to_string(),
            performed_at: Utc::now() - Duration::days(days_ago),
            best_weight_g: 80_000,
            total_volume_g: 400_000,
            total_sets: 1,
            total_reps: 5,
            estimated_one_rm_g: Some(93_333),
        }
    }

    #[test]
    fn test_append_and_count_logs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        assert_eq!(store.log_count().unwrap(), 0);

        store.append_log(&sample_log(0)).unwrap();
        store.append_log(&sample_log(1)).unwrap();
        assert_eq!(store.log_count().unwrap(), 2);
        assert_eq!(store.all_logs().unwrap().len(), 2);
    }

    #[test]
    fn test_logs_started_since_cutoff() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        store.append_log(&sample_log(0)).unwrap();
        store.append_log(&sample_log(3)).unwrap();
        store.append_log(&sample_log(30)).unwrap();

        let cutoff = Utc::now() - Duration::days(7);
        assert_eq!(store.logs_started_since(cutoff).unwrap(), 2);
    }

    #[test]
    fn test_history_sorted_and_filtered() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        let log_id = Uuid::new_v4();
        // Insert newest first to prove the read sorts ascending.
        store
            .add_history_entries(&[
                sample_history(log_id, "bench_press", 1),
                sample_history(log_id, "bench_press", 10),
                sample_history(log_id, "squat", 5),
            ])
            .unwrap();

        let bench = store.history_for_exercise("bench_press").unwrap();
        assert_eq!(bench.len(), 2);
        assert!(bench[0].performed_at < bench[1].performed_at);

        let squat = store.history_for_exercise("squat").unwrap();
        assert_eq!(squat.len(), 1);
        assert!(store.history_for_exercise("deadlift").unwrap().is_empty());
    }

    #[test]
    fn test_delete_log_cascades_to_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        let keep = sample_log(0);
        let drop = sample_log(1);
        store.append_log(&keep).unwrap();
        store.append_log(&drop).unwrap();
        store
            .add_history_entries(&[
                sample_history(keep.id, "bench_press", 0),
                sample_history(drop.id, "bench_press", 1),
            ])
            .unwrap();

        store.delete_log(&drop.id).unwrap();

        assert_eq!(store.log_count().unwrap(), 1);
        assert_eq!(store.all_logs().unwrap()[0].id, keep.id);
        let history = store.history_for_exercise("bench_press").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].log_id, keep.id);
    }

    #[test]
    fn test_achievement_roundtrip_and_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        store
            .append_achievements(&[UnlockedAchievement {
                achievement_id: "first_workout".to_string(),
                unlocked_at: Utc::now(),
                context: Some("1 workout logged".to_string()),
            }])
            .unwrap();

        let ids = store.unlocked_achievement_ids().unwrap();
        assert!(ids.contains("first_workout"));
        assert_eq!(store.unlocked_achievements().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = JsonlStore::open(temp_dir.path()).unwrap();

        store.append_log(&sample_log(0)).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(store.logs_path())
                .unwrap();
            writeln!(file, "this is not json").unwrap();
        }
        store.append_log(&sample_log(1)).unwrap();

        // The poisoned line disappears; both real logs survive.
        assert_eq!(store.log_count().unwrap(), 2);
    }
}
