use anyhow::Result;
use bytes::Bytes;
use clap::Parser;

use minimr::cmd::worker::Args;
use minimr::worker::Worker;
use minimr::workload;

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let engine = workload::named(&args.workload)?;
    let aux = Bytes::from(serde_json::to_string(&args.args)?);

    let worker = Worker::new(args.dir, engine, aux);
    worker.run(format!("http://{}", args.join)).await
}
