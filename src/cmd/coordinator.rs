use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Port for the coordinator to listen on
    #[clap(short, long, default_value_t = 50051)]
    pub port: u16,

    /// Glob spec for the input files, one map task per file
    #[clap(short, long)]
    pub input: String,

    /// Number of reduce buckets
    #[clap(short, long, default_value_t = 8)]
    pub buckets: usize,

    /// Seconds before an unreported assignment is handed to another worker
    #[clap(short, long, default_value_t = 10)]
    pub timeout: u64,
}
