use anyhow::Result;
use bytes::Bytes;
use clap::Parser;

use minimr::standalone::{engine, Args, Commands, Job};
use minimr::workload;

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();
    let Commands::Submit {
        input,
        workload: name,
        output,
        buckets,
        args,
    } = args.command;

    let job = Job {
        input,
        workload: name,
        output,
        args,
    };
    let engine_fns = workload::named(&job.workload)?;
    let serialized_args = Bytes::from(serde_json::to_string(&job.args)?);

    /* The map step carries out mapping and also the shuffle, which makes
     * sense for a single-process engine. */
    let buckets = engine::perform_map(&job, &engine_fns, &serialized_args, buckets)?;
    engine::perform_reduce(&job, &engine_fns, &serialized_args, buckets)
}
