//! The durable key-value store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use pomo_core::{Task, TimerSettings, TimerState, TimerStats, Validate};

use crate::error::StoreError;
use crate::migration::{self, MigrationReport};

/// The on-disk document: four record kinds under fixed keys.
///
/// Missing keys fall back to defaults so a first read of a fresh (or
/// partially written) store always yields a usable document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    settings: TimerSettings,

    #[serde(default)]
    stats: TimerStats,

    #[serde(default)]
    tasks: Vec<Task>,

    #[serde(default)]
    timer_state: TimerState,
}

/// Durable store for settings, stats, tasks, and view-layer timer-state
/// snapshots.
///
/// The store is explicitly constructed via [`TimerStore::open`] and
/// passed by reference (usually inside an `Arc`) to every consumer -
/// there is no global instance and no re-initialization path. All
/// reads and writes round-trip through validation; a record that fails
/// its schema fails the call rather than being coerced.
///
/// The document is cached in memory behind an async `RwLock`; every
/// mutation is flushed to disk atomically (write to a temp file, then
/// rename) before the call returns.
pub struct TimerStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl TimerStore {
    /// Opens the store at `path`, creating it with defaults if absent.
    ///
    /// This is the single initialization gate: the legacy-id migration
    /// runs here, before the store is visible to anyone, and any repair
    /// is persisted immediately.
    ///
    /// # Errors
    ///
    /// - `StoreError::Read` if the file exists but cannot be read
    /// - `StoreError::Corrupt` if the document is not a JSON object of
    ///   the expected shape
    /// - `StoreError::Write` if the initial or repaired document cannot
    ///   be persisted
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let (data, report) = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| StoreError::Read {
                path: path.clone(),
                error: e.to_string(),
            })?;

            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| StoreError::Corrupt(e.to_string()))?;

            let mut doc = match value {
                serde_json::Value::Object(map) => map,
                other => {
                    return Err(StoreError::Corrupt(format!(
                        "expected a JSON object, got {other}"
                    )))
                }
            };

            let report = migration::migrate(&mut doc);

            let data: StoreData = serde_json::from_value(serde_json::Value::Object(doc))
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;

            (data, report)
        } else {
            debug!(path = %path.display(), "no store file, starting from defaults");
            (StoreData::default(), MigrationReport::default())
        };

        let store = Self {
            path,
            data: RwLock::new(data.clone()),
        };

        // Persist defaults on first open, and any migration repair,
        // so the next startup sees a settled document.
        if report.changed() || !store.path.exists() {
            store.persist(&data)?;
        }

        info!(path = %store.path.display(), "store opened");
        Ok(store)
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Reads the persisted timer settings.
    pub async fn settings(&self) -> Result<TimerSettings, StoreError> {
        let settings = self.data.read().await.settings.clone();
        settings.validate()?;
        Ok(settings)
    }

    /// Validates and persists new timer settings.
    pub async fn save_settings(&self, settings: &TimerSettings) -> Result<(), StoreError> {
        settings.validate()?;
        let mut data = self.data.write().await;
        data.settings = settings.clone();
        self.persist(&data)
    }

    // ========================================================================
    // Stats
    // ========================================================================

    /// Reads the persisted stats counters.
    pub async fn stats(&self) -> Result<TimerStats, StoreError> {
        let stats = self.data.read().await.stats.clone();
        stats.validate()?;
        Ok(stats)
    }

    /// Validates and persists stats counters.
    pub async fn save_stats(&self, stats: &TimerStats) -> Result<(), StoreError> {
        stats.validate()?;
        let mut data = self.data.write().await;
        data.stats = stats.clone();
        self.persist(&data)
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Reads the persisted task list.
    pub async fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = self.data.read().await.tasks.clone();
        tasks.validate()?;
        Ok(tasks)
    }

    /// Validates and persists the task list wholesale.
    pub async fn save_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        tasks.iter().try_for_each(Validate::validate)?;
        let mut data = self.data.write().await;
        data.tasks = tasks.to_vec();
        self.persist(&data)
    }

    // ========================================================================
    // Timer-state snapshot
    // ========================================================================

    /// Reads the view-layer timer-state snapshot.
    ///
    /// This is the persisted snapshot views save for themselves, not
    /// the live engine state.
    pub async fn timer_state(&self) -> Result<TimerState, StoreError> {
        let state = self.data.read().await.timer_state.clone();
        state.validate()?;
        Ok(state)
    }

    /// Validates and persists a view-layer timer-state snapshot.
    pub async fn save_timer_state(&self, state: &TimerState) -> Result<(), StoreError> {
        state.validate()?;
        let mut data = self.data.write().await;
        data.timer_state = state.clone();
        self.persist(&data)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Writes the document atomically: serialize, write to a temp file
    /// next to the target, rename over it.
    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let write_err = |e: String| StoreError::Write {
            path: self.path.clone(),
            error: e,
        };

        let text = serde_json::to_string_pretty(data).map_err(|e| write_err(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, text).map_err(|e| write_err(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| write_err(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_core::TaskId;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("store.json")
    }

    #[tokio::test]
    async fn test_fresh_store_serves_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimerStore::open(store_path(&dir)).unwrap();

        assert_eq!(store.settings().await.unwrap(), TimerSettings::default());
        assert_eq!(store.stats().await.unwrap(), TimerStats::default());
        assert!(store.tasks().await.unwrap().is_empty());
        assert_eq!(store.timer_state().await.unwrap(), TimerState::default());

        // defaults are settled on disk immediately
        assert!(store_path(&dir).exists());
    }

    #[tokio::test]
    async fn test_settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        let mut settings = TimerSettings::default();
        settings.work_duration = 50;
        settings.auto_start_breaks = true;

        {
            let store = TimerStore::open(&path).unwrap();
            store.save_settings(&settings).await.unwrap();
        }

        let store = TimerStore::open(&path).unwrap();
        assert_eq!(store.settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_and_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimerStore::open(store_path(&dir)).unwrap();

        let mut settings = TimerSettings::default();
        settings.long_break_interval = 1;

        let result = store.save_settings(&settings).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        // the stored document still holds the defaults
        assert_eq!(
            store.settings().await.unwrap(),
            TimerSettings::default()
        );
    }

    #[tokio::test]
    async fn test_tasks_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimerStore::open(store_path(&dir)).unwrap();

        let tasks = vec![Task::new("Write tests", 2), Task::new("Review", 1)];
        store.save_tasks(&tasks).await.unwrap();
        assert_eq!(store.tasks().await.unwrap(), tasks);
    }

    #[tokio::test]
    async fn test_invalid_task_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimerStore::open(store_path(&dir)).unwrap();

        let mut task = Task::new("x", 1);
        task.title = String::new();

        let result = store.save_tasks(&[task]).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timer_state_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimerStore::open(store_path(&dir)).unwrap();

        let state = TimerState {
            time_left: 120,
            is_running: false,
            is_break: true,
            completed_pomodoros: 3,
            current_task_id: Some(TaskId::generate()),
        };
        store.save_timer_state(&state).await.unwrap();
        assert_eq!(store.timer_state().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_reset_stats_flow() {
        let dir = tempfile::tempdir().unwrap();
        let store = TimerStore::open(store_path(&dir)).unwrap();

        let stats = TimerStats {
            total_pomodoros: 9,
            total_focus_time: 225,
            ..TimerStats::default()
        };
        store.save_stats(&stats).await.unwrap();

        let fresh = TimerStats::fresh(chrono::Utc::now());
        store.save_stats(&fresh).await.unwrap();

        let loaded = store.stats().await.unwrap();
        assert_eq!(loaded.total_pomodoros, 0);
        assert!(loaded.last_reset_date.is_some());
    }

    #[tokio::test]
    async fn test_open_migrates_legacy_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        fs::write(
            &path,
            json!({
                "tasks": [
                    {"id": "not-a-uuid", "title": "legacy task", "completed": false,
                     "pomodoros": 1, "estimated_pomodoros": 2}
                ],
                "timer_state": {
                    "time_left": 0, "is_running": false, "is_break": false,
                    "completed_pomodoros": 0, "current_task_id": "not-a-uuid"
                }
            })
            .to_string(),
        )
        .unwrap();

        let store = TimerStore::open(&path).unwrap();

        let tasks = store.tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_ne!(tasks[0].id.as_str(), "not-a-uuid");
        assert!(tasks[0].id.is_canonical());
        assert_eq!(tasks[0].title, "legacy task");

        // the dangling active-task reference is cleared
        assert!(store
            .timer_state()
            .await
            .unwrap()
            .current_task_id
            .is_none());

        // the repair is persisted: a second open sees canonical ids
        drop(store);
        let reopened = TimerStore::open(&path).unwrap();
        let tasks = reopened.tasks().await.unwrap();
        assert!(tasks[0].id.is_canonical());
    }

    #[tokio::test]
    async fn test_open_recovers_from_unreadable_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);

        fs::write(
            &path,
            json!({
                "tasks": "definitely not a list",
                "timer_state": {
                    "time_left": 0, "is_running": false, "is_break": false,
                    "completed_pomodoros": 0, "current_task_id": "task-1"
                }
            })
            .to_string(),
        )
        .unwrap();

        let store = TimerStore::open(&path).unwrap();
        assert!(store.tasks().await.unwrap().is_empty());
        assert!(store
            .timer_state()
            .await
            .unwrap()
            .current_task_id
            .is_none());
    }

    #[test]
    fn test_open_rejects_non_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "this is not json").unwrap();

        let result = TimerStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_open_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        fs::write(&path, "[1, 2, 3]").unwrap();

        let result = TimerStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        fs::write(&path, json!({"settings": TimerSettings::default()}).to_string()).unwrap();

        let store = TimerStore::open(&path).unwrap();
        assert!(store.tasks().await.unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap(), TimerStats::default());
    }
}
