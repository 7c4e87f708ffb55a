use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Input memory dump
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for carved files and the manifest
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Limit carving to these types (comma-separated signature ids, format
    /// ids, extensions, or keywords like "texture")
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<String>>,

    /// Maximum files carved per signature
    #[arg(long, default_value_t = 10_000)]
    pub max_per_type: u64,

    /// Skip DDX/XUR conversion and keep raw bytes only
    #[arg(long)]
    pub no_convert: bool,

    /// Write the flattened-mip atlas sidecar when a converter produces one
    #[arg(long)]
    pub save_atlas: bool,

    /// Number of extraction worker threads
    #[arg(long, default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Scan window size, in MiB
    #[arg(long, default_value_t = 64)]
    pub window_mib: u64,

    /// Per-offset diagnostics for dropped candidates
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
