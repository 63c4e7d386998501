//! The coordinator: all scheduling state for one job, behind one lock.
//!
//! [`Job`] owns the task lists and remaining-work counters and implements
//! the scheduling state machine; [`CoordinatorService`] wraps it in the
//! gRPC surface workers talk to. Every public operation takes the lock for
//! its whole (short, in-memory) duration — no I/O ever happens under it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;
use tonic::{Request, Response, Status};

use crate::proto;
use crate::proto::coordinator_server::{Coordinator, CoordinatorServer};
use crate::task::{intermediate_name, MapTask, ReduceTask, TaskKind, TaskState, TaskStatus};

/// How long an assignment may go unreported before the task is considered
/// stale and handed to another worker.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// What the coordinator tells a requesting worker to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Map {
        task_index: usize,
        source_file: PathBuf,
        bucket_count: usize,
    },
    Reduce {
        task_index: usize,
        bucket_id: usize,
        source_locations: Vec<String>,
    },
    /// Nothing claimable right now; poll again shortly.
    Wait,
    /// The job is finished; stop the worker loop.
    Exit,
}

/// Why a completion report was not accepted. A rejected report never
/// changes coordinator state, and the caller does not retry it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no {kind} task has index {index}")]
    UnknownTask { kind: TaskKind, index: usize },
    #[error("{kind} task {index} is not held by worker {worker_id}")]
    NotOwner {
        kind: TaskKind,
        index: usize,
        worker_id: String,
    },
}

/// All scheduling state for one MapReduce job.
///
/// Tasks are created eagerly at construction and never afterward. The
/// reduce phase is gated on `map_remaining == 0`: no reduce task is ever
/// handed out while a map task is outstanding, which is what lets reduce
/// tasks assume every intermediate file already exists.
pub struct Job {
    map_tasks: Vec<MapTask>,
    reduce_tasks: Vec<ReduceTask>,
    map_remaining: usize,
    reduce_remaining: usize,
    bucket_count: usize,
    timeout: Duration,
}

impl Job {
    /// Build a job over the given input partitions with the default
    /// staleness timeout.
    pub fn new(files: Vec<PathBuf>, bucket_count: usize) -> Self {
        Self::with_timeout(files, bucket_count, DEFAULT_TASK_TIMEOUT)
    }

    /// Build a job with an explicit staleness timeout.
    pub fn with_timeout(files: Vec<PathBuf>, bucket_count: usize, timeout: Duration) -> Self {
        assert!(!files.is_empty(), "a job needs at least one input file");
        assert!(bucket_count > 0, "a job needs at least one reduce bucket");

        let map_tasks: Vec<MapTask> = files
            .into_iter()
            .enumerate()
            .map(|(index, source_file)| MapTask {
                state: TaskState::new(index),
                source_file,
            })
            .collect();

        // Each reduce task knows up front which intermediate file every map
        // task will publish for its bucket.
        let reduce_tasks: Vec<ReduceTask> = (0..bucket_count)
            .map(|bucket_id| ReduceTask {
                state: TaskState::new(bucket_id),
                bucket_id,
                source_locations: (0..map_tasks.len())
                    .map(|map_index| intermediate_name(map_index, bucket_id))
                    .collect(),
            })
            .collect();

        let map_remaining = map_tasks.len();
        let reduce_remaining = reduce_tasks.len();
        info!(
            "job constructed with {} map tasks and {} reduce tasks",
            map_remaining, reduce_remaining
        );

        Self {
            map_tasks,
            reduce_tasks,
            map_remaining,
            reduce_remaining,
            bucket_count,
            timeout,
        }
    }

    /// Hand out the next unit of work for `worker_id`.
    ///
    /// Each call first reclaims every stale in-progress task of the active
    /// phase, then claims the first idle one. Doing the reclaim as its own
    /// pass keeps a just-reclaimed early task from losing its turn to a
    /// later idle one forever.
    pub fn request_task(&mut self, worker_id: &str) -> Assignment {
        if self.map_remaining > 0 {
            reclaim_stale(
                TaskKind::Map,
                self.map_tasks.iter_mut().map(|t| &mut t.state),
                self.timeout,
            );
            if let Some(task) = self
                .map_tasks
                .iter_mut()
                .find(|t| t.state.status == TaskStatus::Idle)
            {
                task.state.claim(worker_id);
                info!(
                    "assigned map task {} ({}) to worker {}",
                    task.state.index,
                    task.source_file.display(),
                    worker_id
                );
                return Assignment::Map {
                    task_index: task.state.index,
                    source_file: task.source_file.clone(),
                    bucket_count: self.bucket_count,
                };
            }
            return Assignment::Wait;
        }

        if self.reduce_remaining > 0 {
            reclaim_stale(
                TaskKind::Reduce,
                self.reduce_tasks.iter_mut().map(|t| &mut t.state),
                self.timeout,
            );
            if let Some(task) = self
                .reduce_tasks
                .iter_mut()
                .find(|t| t.state.status == TaskStatus::Idle)
            {
                task.state.claim(worker_id);
                info!(
                    "assigned reduce task {} (bucket {}) to worker {}",
                    task.state.index, task.bucket_id, worker_id
                );
                return Assignment::Reduce {
                    task_index: task.state.index,
                    bucket_id: task.bucket_id,
                    source_locations: task.source_locations.clone(),
                };
            }
            return Assignment::Wait;
        }

        Assignment::Exit
    }

    /// Record a completion report from `worker_id`.
    ///
    /// The index is the only thing trusted from the report; it is checked
    /// against the task list bounds, and the recorded owner must match the
    /// reporter so a long-gone worker cannot complete a task out from
    /// under its replacement. A duplicate report for an already completed
    /// task is an accepted no-op.
    pub fn notify_complete(
        &mut self,
        worker_id: &str,
        kind: TaskKind,
        index: usize,
    ) -> Result<(), Rejection> {
        let (state, remaining) = match kind {
            TaskKind::Map => (
                self.map_tasks.get_mut(index).map(|t| &mut t.state),
                &mut self.map_remaining,
            ),
            TaskKind::Reduce => (
                self.reduce_tasks.get_mut(index).map(|t| &mut t.state),
                &mut self.reduce_remaining,
            ),
        };
        let Some(state) = state else {
            return Err(Rejection::UnknownTask { kind, index });
        };
        if state.assigned_worker.as_deref() != Some(worker_id) {
            return Err(Rejection::NotOwner {
                kind,
                index,
                worker_id: worker_id.to_string(),
            });
        }
        if state.status == TaskStatus::InProgress {
            state.status = TaskStatus::Completed;
            *remaining -= 1;
            info!(
                "{} task {} completed by worker {} ({} remaining)",
                kind, index, worker_id, remaining
            );
        }
        Ok(())
    }

    /// True exactly when every map and reduce task is completed.
    pub fn done(&self) -> bool {
        self.map_remaining == 0 && self.reduce_remaining == 0
    }
}

fn reclaim_stale<'a>(
    kind: TaskKind,
    states: impl Iterator<Item = &'a mut TaskState>,
    timeout: Duration,
) {
    for state in states {
        if state.status == TaskStatus::InProgress && state.started_at.elapsed() > timeout {
            warn!(
                "reclaiming stale {} task {} from worker {:?}",
                kind, state.index, state.assigned_worker
            );
            state.reclaim();
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// gRPC surface
/////////////////////////////////////////////////////////////////////////////

/// The gRPC service wrapping a [`Job`].
#[derive(Clone)]
pub struct CoordinatorService {
    job: Arc<Mutex<Job>>,
}

impl CoordinatorService {
    pub fn new(job: Job) -> Self {
        Self {
            job: Arc::new(Mutex::new(job)),
        }
    }

    /// Polling hook for the bootstrapper: has the whole job finished?
    pub fn done(&self) -> bool {
        self.job.lock().unwrap_or_else(|e| e.into_inner()).done()
    }

    /// Wrap this service for [`tonic::transport::Server::add_service`].
    pub fn into_server(self) -> CoordinatorServer<CoordinatorService> {
        CoordinatorServer::new(self)
    }
}

impl From<Assignment> for proto::TaskAssignment {
    fn from(assignment: Assignment) -> Self {
        use proto::task_assignment::Kind;
        let kind = match assignment {
            Assignment::Map {
                task_index,
                source_file,
                bucket_count,
            } => Kind::Map(proto::MapAssignment {
                task_index: task_index as u32,
                source_file: source_file.to_string_lossy().into_owned(),
                bucket_count: bucket_count as u32,
            }),
            Assignment::Reduce {
                task_index,
                bucket_id,
                source_locations,
            } => Kind::Reduce(proto::ReduceAssignment {
                task_index: task_index as u32,
                bucket_id: bucket_id as u32,
                source_locations,
            }),
            Assignment::Wait => Kind::Wait(proto::Wait {}),
            Assignment::Exit => Kind::Exit(proto::Exit {}),
        };
        proto::TaskAssignment { kind: Some(kind) }
    }
}

#[tonic::async_trait]
impl Coordinator for CoordinatorService {
    async fn request_task(
        &self,
        request: Request<proto::TaskRequest>,
    ) -> Result<Response<proto::TaskAssignment>, Status> {
        let worker_id = request.into_inner().worker_id;
        if worker_id.is_empty() {
            return Err(Status::invalid_argument("worker_id is required"));
        }
        let assignment = {
            let mut job = self.job.lock().unwrap_or_else(|e| e.into_inner());
            job.request_task(&worker_id)
        };
        Ok(Response::new(assignment.into()))
    }

    async fn notify_complete(
        &self,
        request: Request<proto::CompletionReport>,
    ) -> Result<Response<proto::CompletionAck>, Status> {
        let report = request.into_inner();
        let Ok(kind) = proto::TaskKind::try_from(report.kind) else {
            return Ok(Response::new(proto::CompletionAck {
                accepted: false,
                reason: format!("unknown task kind {}", report.kind),
            }));
        };
        let kind = match kind {
            proto::TaskKind::Map => TaskKind::Map,
            proto::TaskKind::Reduce => TaskKind::Reduce,
        };

        let result = {
            let mut job = self.job.lock().unwrap_or_else(|e| e.into_inner());
            job.notify_complete(&report.worker_id, kind, report.task_index as usize)
        };
        let ack = match result {
            Ok(()) => proto::CompletionAck {
                accepted: true,
                reason: String::new(),
            },
            Err(rejection) => {
                warn!("rejected completion report: {}", rejection);
                proto::CompletionAck {
                    accepted: false,
                    reason: rejection.to_string(),
                }
            }
        };
        Ok(Response::new(ack))
    }
}
