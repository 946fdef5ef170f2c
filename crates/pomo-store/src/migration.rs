//! One-time repair pass for legacy store documents.
//!
//! Early releases generated task identifiers client-side with ad hoc
//! schemes (`task-1`, timestamps). The migration rewrites every task id
//! that does not match the canonical UUID format and clears the
//! persisted active-task reference when it points at a non-canonical
//! id. It runs inside [`crate::TimerStore::open`], before any command
//! handling.

use serde_json::{Map, Value};
use tracing::{info, warn};

use pomo_core::{Task, TaskId};

use crate::error::MigrationError;

const TASKS_KEY: &str = "tasks";
const TIMER_STATE_KEY: &str = "timer_state";
const CURRENT_TASK_KEY: &str = "current_task_id";

/// What the migration pass did to the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Task identifiers replaced with freshly generated ones.
    pub rewritten_ids: usize,

    /// Whether the persisted active-task reference was cleared.
    pub cleared_active_task: bool,

    /// Whether the tasks section was unreadable and discarded.
    pub recovered: bool,
}

impl MigrationReport {
    /// Returns true if the document was modified and must be persisted.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.rewritten_ids > 0 || self.cleared_active_task || self.recovered
    }
}

/// Runs the migration pass over a raw store document.
///
/// Never fails: a fault while decoding the tasks section triggers the
/// recovery policy (discard all tasks, clear the active-task reference)
/// rather than aborting startup.
pub(crate) fn migrate(doc: &mut Map<String, Value>) -> MigrationReport {
    let mut report = MigrationReport::default();

    match repair_task_ids(doc) {
        Ok(rewritten) => report.rewritten_ids = rewritten,
        Err(e) => {
            warn!(error = %e, "store migration failed, discarding tasks");
            doc.insert(TASKS_KEY.to_string(), Value::Array(Vec::new()));
            report.recovered = true;
            report.cleared_active_task = clear_active_task(doc);
        }
    }

    if !report.recovered && clear_dangling_active_task(doc) {
        report.cleared_active_task = true;
    }

    if report.changed() {
        info!(
            rewritten_ids = report.rewritten_ids,
            cleared_active_task = report.cleared_active_task,
            recovered = report.recovered,
            "store migration applied"
        );
    }

    report
}

/// Rewrites non-canonical task identifiers in place.
fn repair_task_ids(doc: &mut Map<String, Value>) -> Result<usize, MigrationError> {
    let raw = match doc.get(TASKS_KEY) {
        Some(raw) => raw.clone(),
        None => return Ok(0),
    };

    let mut tasks: Vec<Task> = serde_json::from_value(raw)
        .map_err(|e| MigrationError::UnreadableTasks(e.to_string()))?;

    let mut rewritten = 0;
    for task in &mut tasks {
        if !task.id.is_canonical() {
            let fresh = TaskId::generate();
            warn!(old_id = %task.id, new_id = %fresh, "rewriting non-canonical task id");
            task.id = fresh;
            rewritten += 1;
        }
    }

    if rewritten > 0 {
        let value = serde_json::to_value(&tasks)
            .map_err(|e| MigrationError::UnreadableTasks(e.to_string()))?;
        doc.insert(TASKS_KEY.to_string(), value);
    }

    Ok(rewritten)
}

/// Clears the active-task reference if it points at a non-canonical id.
fn clear_dangling_active_task(doc: &mut Map<String, Value>) -> bool {
    let id = doc
        .get(TIMER_STATE_KEY)
        .and_then(|state| state.get(CURRENT_TASK_KEY))
        .and_then(Value::as_str);

    match id {
        Some(id) if !TaskId::new(id).is_canonical() => {
            warn!(task_id = %id, "clearing non-canonical active-task reference");
            clear_active_task(doc)
        }
        _ => false,
    }
}

/// Unconditionally nulls the active-task reference. Returns whether a
/// value was actually replaced.
fn clear_active_task(doc: &mut Map<String, Value>) -> bool {
    if let Some(Value::Object(state)) = doc.get_mut(TIMER_STATE_KEY) {
        if matches!(state.get(CURRENT_TASK_KEY), Some(v) if !v.is_null()) {
            state.insert(CURRENT_TASK_KEY.to_string(), Value::Null);
            return true;
        }
    }
    false
}
