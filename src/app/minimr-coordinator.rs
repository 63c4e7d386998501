use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use minimr::cmd::coordinator::Args;
use minimr::coordinator::{CoordinatorService, Job};

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(&args.input).context("parsing input glob")? {
        files.push(entry?);
    }
    ensure!(!files.is_empty(), "no input files match `{}`", args.input);

    let job = Job::with_timeout(files, args.buckets, Duration::from_secs(args.timeout));
    let service = CoordinatorService::new(job);

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("coordinator listening on {}", listener.local_addr()?);

    let monitor = service.clone();
    Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            while !monitor.done() {
                sleep(Duration::from_millis(500)).await;
            }
            info!("job complete");
            // Linger so polling workers observe the exit response instead
            // of a dead endpoint.
            sleep(Duration::from_secs(3)).await;
        })
        .await?;

    Ok(())
}
