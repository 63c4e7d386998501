//! The worker: a stateless, disposable polling loop.
//!
//! A worker owns nothing but its generated id and the pluggable workload.
//! It pulls one assignment at a time from the coordinator, executes it
//! against the shared filesystem, reports completion, and repeats until it
//! is told to exit. All output is published by atomic rename, so a worker
//! that was silently reclaimed can keep running to completion without
//! corrupting anything.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior::AllowOverwrite};
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use itertools::Itertools;
use log::{error, info, warn};
use tokio::time::sleep;
use tonic::transport::Channel;
use tonic::Request;
use uuid::Uuid;

use crate::proto::coordinator_client::CoordinatorClient;
use crate::proto::task_assignment::Kind;
use crate::task::{intermediate_name, output_name};
use crate::{codec, ihash, proto, KeyValue, Workload};

/// How long to sleep after a wait response or a failed call.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

type BucketIndex = u32;
type Buckets = DashMap<BucketIndex, Vec<KeyValue>>;

pub struct Worker {
    id: String,
    /// Directory holding intermediate and final output files.
    dir: PathBuf,
    workload: Workload,
    /// Serialized auxiliary arguments handed to every map/reduce call.
    aux: Bytes,
}

impl Worker {
    pub fn new(dir: PathBuf, workload: Workload, aux: Bytes) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dir,
            workload,
            aux,
        }
    }

    /// Request, execute, report, repeat, until the coordinator says exit.
    ///
    /// A failed call is never fatal: the worker logs it, sleeps, and polls
    /// again. An execution failure skips the completion report and lets
    /// the coordinator's timeout hand the task to someone else.
    pub async fn run(&self, endpoint: String) -> Result<()> {
        let mut client = CoordinatorClient::connect(endpoint).await?;
        info!("worker {} joined", self.id);

        loop {
            let request = Request::new(proto::TaskRequest {
                worker_id: self.id.clone(),
            });
            let assignment = match client.request_task(request).await {
                Ok(response) => response.into_inner().kind,
                Err(status) => {
                    warn!("worker {}: request_task failed: {status}", self.id);
                    sleep(POLL_INTERVAL).await;
                    continue;
                }
            };

            match assignment {
                Some(Kind::Map(task)) => match self.execute_map(&task) {
                    Ok(()) => {
                        self.report(&mut client, proto::TaskKind::Map, task.task_index)
                            .await
                    }
                    Err(err) => error!(
                        "worker {}: map task {} failed: {err:#}",
                        self.id, task.task_index
                    ),
                },
                Some(Kind::Reduce(task)) => match self.execute_reduce(&task) {
                    Ok(()) => {
                        self.report(&mut client, proto::TaskKind::Reduce, task.task_index)
                            .await
                    }
                    Err(err) => error!(
                        "worker {}: reduce task {} failed: {err:#}",
                        self.id, task.task_index
                    ),
                },
                Some(Kind::Exit(_)) => {
                    info!("worker {}: job finished, exiting", self.id);
                    break;
                }
                Some(Kind::Wait(_)) | None => sleep(POLL_INTERVAL).await,
            }
        }
        Ok(())
    }

    /// Tell the coordinator a task is finished. A rejected or failed
    /// report is logged and not retried; if the completion was really
    /// lost, the coordinator reassigns the task and a later rename is a
    /// harmless overwrite.
    async fn report(
        &self,
        client: &mut CoordinatorClient<Channel>,
        kind: proto::TaskKind,
        task_index: u32,
    ) {
        let report = proto::CompletionReport {
            worker_id: self.id.clone(),
            kind: kind as i32,
            task_index,
        };
        match client.notify_complete(Request::new(report)).await {
            Ok(response) => {
                let ack = response.into_inner();
                if !ack.accepted {
                    warn!(
                        "worker {}: completion report rejected: {}",
                        self.id, ack.reason
                    );
                }
            }
            Err(status) => warn!("worker {}: notify_complete failed: {status}", self.id),
        }
    }

    fn execute_map(&self, task: &proto::MapAssignment) -> Result<()> {
        info!(
            "worker {}: map task {} over {}",
            self.id, task.task_index, task.source_file
        );
        let content = fs::read(&task.source_file)
            .with_context(|| format!("reading {}", task.source_file))?;
        let input = KeyValue::new(Bytes::from(task.source_file.clone()), Bytes::from(content));

        let buckets: Buckets = Buckets::new();
        for item in (self.workload.map_fn)(input, self.aux.clone())? {
            let KeyValue { key, value } = item?;
            let bucket_no = ihash(&key) % task.bucket_count;
            buckets
                .entry(bucket_no)
                .or_default()
                .push(KeyValue { key, value });
        }

        for (bucket_no, records) in buckets.into_iter() {
            let encoded = codec::encode_records(&records);
            let path = self
                .dir
                .join(intermediate_name(task.task_index as usize, bucket_no as usize));
            publish(&path, &encoded)?;
        }
        Ok(())
    }

    fn execute_reduce(&self, task: &proto::ReduceAssignment) -> Result<()> {
        info!(
            "worker {}: reduce task {} over bucket {}",
            self.id, task.task_index, task.bucket_id
        );
        let mut records = Vec::new();
        for location in &task.source_locations {
            let path = self.dir.join(location);
            let encoded = match fs::read(&path) {
                Ok(buf) => buf,
                // Never written: the map task routed nothing to this
                // bucket. Every map task has published its non-empty
                // buckets by now, since reduce work is only handed out
                // once all maps are complete.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("reading {}", path.display()))
                }
            };
            records.extend(codec::decode_records(Bytes::from(encoded))?);
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));

        let mut out = BytesMut::new();
        for (key, group) in &records.into_iter().chunk_by(KeyValue::key) {
            let values = group.map(KeyValue::into_value);
            let reduced = (self.workload.reduce_fn)(key, Box::new(values), self.aux.clone())?;
            out.extend_from_slice(&reduced);
        }

        // A bucket no key ever hashed to still publishes an empty file.
        publish(&self.dir.join(output_name(task.bucket_id as usize)), &out)
    }
}

/// Write `bytes` to a uniquely named temporary file in the target
/// directory, then atomically rename it into `path`. Readers never observe
/// a partial file, and when a reclaimed task races its replacement the
/// last complete rename wins.
fn publish(path: &Path, bytes: &[u8]) -> Result<()> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|file| file.write_all(bytes))
        .with_context(|| format!("publishing {}", path.display()))?;
    Ok(())
}
