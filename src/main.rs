use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::info;

use xbcarve::pipeline::{
    CarveOptions, DEFAULT_WINDOW_SIZE, MemoryCarver, ProgressReporter, ProgressSnapshot,
    ProgressStage,
};
use xbcarve::registry::FormatRegistry;
use xbcarve::{cli, logging, util};

struct LogReporter;

impl ProgressReporter for LogReporter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let stage = match snapshot.stage {
            ProgressStage::Scanning => "scan",
            ProgressStage::Extracting => "extract",
        };
        info!(
            "{stage} {:.1}% ({} matches, {} files, {:.1} MiB/s)",
            snapshot.completion_pct,
            snapshot.matches_found,
            snapshot.files_written,
            snapshot.throughput_mib
        );
    }
}

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.verbose);

    util::ensure_output_dir(&cli_opts.output)?;

    let requested_filter = match &cli_opts.types {
        Some(entries) => Some(FormatRegistry::global().resolve_filter(entries)?),
        None => None,
    };

    let options = CarveOptions {
        input: cli_opts.input.clone(),
        output_dir: cli_opts.output.clone(),
        max_files_per_type: Some(cli_opts.max_per_type),
        enable_conversion: !cli_opts.no_convert,
        save_atlas: cli_opts.save_atlas,
        requested_filter,
        workers: cli_opts.workers.max(1),
        window_size: cli_opts
            .window_mib
            .saturating_mul(1024 * 1024)
            .max(1)
            .min(DEFAULT_WINDOW_SIZE * 8),
    };

    info!(
        "starting carve input={} output={} workers={} window_mib={}",
        cli_opts.input.display(),
        cli_opts.output.display(),
        options.workers,
        cli_opts.window_mib
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::Relaxed);
        })?;
    }

    let carver = MemoryCarver::new(options);
    let stats = carver.run(Some(cancel), Some(Arc::new(LogReporter)))?;

    let dropped = stats.parse_rejects + stats.size_rejects + stats.quota_skips;
    info!(
        "processed={} succeeded={} failed={} dropped={}",
        stats.matches_found, stats.files_written, stats.write_failures, dropped
    );
    if stats.cancelled {
        info!("run cancelled; manifest reflects completed extractions only");
    }

    Ok(())
}
