//! Task records and their lifecycle state.
//!
//! Tasks are pure data. They are created once, eagerly, when a job is
//! constructed, and every task keeps the list position it was created at
//! for its whole life. That index, not any state echoed back by a worker,
//! is the key used to find the authoritative record when a completion
//! report arrives.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Lifecycle state of a single task.
///
/// There is no failed state. A stalled or crashed assignee is
/// indistinguishable from a slow one, so an overdue task simply goes back
/// to [`TaskStatus::Idle`] and is handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    InProgress,
    Completed,
}

/// The two kinds of work a job is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

/// Scheduling state shared by both task kinds.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub status: TaskStatus,
    /// Worker currently holding the task. Meaningful only while
    /// [`TaskStatus::InProgress`]; cleared when the task is reclaimed.
    pub assigned_worker: Option<String>,
    /// Time of the most recent assignment, used to detect staleness.
    pub started_at: Instant,
    /// Fixed position in the owning task list.
    pub index: usize,
}

impl TaskState {
    pub fn new(index: usize) -> Self {
        Self {
            status: TaskStatus::Idle,
            assigned_worker: None,
            started_at: Instant::now(),
            index,
        }
    }

    /// Hand the task to `worker_id` and refresh its assignment timestamp.
    pub fn claim(&mut self, worker_id: &str) {
        self.status = TaskStatus::InProgress;
        self.assigned_worker = Some(worker_id.to_string());
        self.started_at = Instant::now();
    }

    /// Return the task to the idle pool after its assignee went stale.
    pub fn reclaim(&mut self) {
        self.status = TaskStatus::Idle;
        self.assigned_worker = None;
    }
}

/// One unit of map work: transform a single input partition into
/// per-bucket intermediate files.
#[derive(Debug, Clone)]
pub struct MapTask {
    pub state: TaskState,
    /// The input partition to map.
    pub source_file: PathBuf,
}

/// One unit of reduce work: aggregate every record routed to one bucket.
#[derive(Debug, Clone)]
pub struct ReduceTask {
    pub state: TaskState,
    /// Which bucket in `[0, bucket_count)` this task consumes.
    pub bucket_id: usize,
    /// One intermediate file name per map task. A location that was never
    /// written (the map produced nothing for this bucket) is simply absent
    /// on disk.
    pub source_locations: Vec<String>,
}

/// Conventional name of the intermediate file holding the records that map
/// task `map_index` routed to bucket `bucket_id`. Both sides derive it
/// independently, so no registry lookup is ever needed.
pub fn intermediate_name(map_index: usize, bucket_id: usize) -> String {
    format!("mr-{map_index}-{bucket_id}")
}

/// Conventional name of the final output file for `bucket_id`.
pub fn output_name(bucket_id: usize) -> String {
    format!("mr-out-{bucket_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_is_deterministic() {
        assert_eq!(intermediate_name(3, 1), "mr-3-1");
        assert_eq!(intermediate_name(3, 1), intermediate_name(3, 1));
        assert_eq!(output_name(0), "mr-out-0");
    }

    #[test]
    fn claim_binds_worker_and_reclaim_clears_it() {
        let mut state = TaskState::new(4);
        assert_eq!(state.status, TaskStatus::Idle);

        state.claim("w-1");
        assert_eq!(state.status, TaskStatus::InProgress);
        assert_eq!(state.assigned_worker.as_deref(), Some("w-1"));
        assert_eq!(state.index, 4);

        state.reclaim();
        assert_eq!(state.status, TaskStatus::Idle);
        assert_eq!(state.assigned_worker, None);
        // The index never changes.
        assert_eq!(state.index, 4);
    }
}
