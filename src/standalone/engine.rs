//! A single-process MapReduce engine.
//!
//! Runs a whole job inside one process with in-memory buckets, no
//! coordinator and no intermediate files. Useful for developing workloads
//! before running them on a cluster.

use anyhow::Result;
use bytes::Bytes;
use dashmap::DashMap;
use glob::glob;
use itertools::Itertools;
use std::fs::{self, File};
use std::io::Write;

use crate::standalone::Job;
use crate::task::output_name;
use crate::{ihash, KeyValue, Workload};

type BucketIndex = u32;
type Buckets = DashMap<BucketIndex, Vec<KeyValue>>;

/// Map every input file and route each emitted record to its bucket.
/// The shuffle collapses into the bucket map, since everything is local.
pub fn perform_map(
    job: &Job,
    engine: &Workload,
    serialized_args: &Bytes,
    bucket_count: u32,
) -> Result<Buckets> {
    let buckets: Buckets = Buckets::new();
    for pathspec in glob(&job.input)?.flatten() {
        let contents = fs::read(&pathspec)?;
        let filename = pathspec.to_str().unwrap_or("unknown").to_string();
        let input_kv = KeyValue::new(Bytes::from(filename), Bytes::from(contents));

        for item in (engine.map_fn)(input_kv, serialized_args.clone())? {
            let KeyValue { key, value } = item?;
            let bucket_no = ihash(&key) % bucket_count;
            buckets
                .entry(bucket_no)
                .or_default()
                .push(KeyValue { key, value });
        }
    }
    Ok(buckets)
}

/// Reduce each bucket into its conventional output file, keys ascending.
pub fn perform_reduce(
    job: &Job,
    engine: &Workload,
    serialized_args: &Bytes,
    buckets: Buckets,
) -> Result<()> {
    fs::create_dir_all(&job.output)?;
    for (bucket_no, mut records) in buckets.into_iter() {
        let mut out_file =
            File::create(format!("{}/{}", job.output, output_name(bucket_no as usize)))?;
        records.sort_by(|a, b| a.key.cmp(&b.key));
        for (key, value_group) in &records.into_iter().chunk_by(KeyValue::key) {
            let values = value_group.map(KeyValue::into_value);
            let out = (engine.reduce_fn)(key, Box::new(values), serialized_args.clone())?;
            out_file.write_all(&out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload;

    #[test]
    fn runs_a_whole_wc_job_in_process() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "apple pear").unwrap();
        fs::write(dir.path().join("b.txt"), "apple plum").unwrap();

        let job = Job {
            input: dir.path().join("*.txt").to_string_lossy().into_owned(),
            workload: "wc".to_string(),
            output: dir.path().join("out").to_string_lossy().into_owned(),
            args: Vec::new(),
        };
        let engine = workload::named("wc").unwrap();
        let aux = Bytes::from(serde_json::to_string(&job.args).unwrap());

        let buckets = perform_map(&job, &engine, &aux, 4).unwrap();
        perform_reduce(&job, &engine, &aux, buckets).unwrap();

        let mut lines: Vec<String> = Vec::new();
        for entry in fs::read_dir(dir.path().join("out")).unwrap() {
            let contents = fs::read_to_string(entry.unwrap().path()).unwrap();
            lines.extend(contents.lines().map(String::from));
        }
        lines.sort();
        assert_eq!(lines, vec!["apple 2", "pear 1", "plum 1"]);
    }
}
