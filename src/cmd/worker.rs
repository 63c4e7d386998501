use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Connect to a coordinator at the given IP address and port
    #[clap(short, long)]
    pub join: String,

    /// Directory for intermediate and final output files
    #[clap(short, long)]
    pub dir: PathBuf,

    /// Name of the workload
    #[clap(short, long)]
    pub workload: String,

    /// Auxiliary arguments to pass to the MapReduce application.
    #[clap(value_parser, last = true)]
    pub args: Vec<String>,
}
