//! Command-line driver of the H → WW → eμνν analysis
//!
//! The work is split into the following phases:
//!
//! * read in the configuration and the sample file lists
//! * process each file, possibly in parallel, and merge the results
//! * then display / store the result.

use clap::Parser;
use eyre::{Result, WrapErr};
use hww_emu::{
    config::Configuration,
    dataset,
    output,
    resfin::FinalResults,
    scheduling,
    source::JsonSource,
    worker::{FileTask, FileWorker},
};
use std::{path::PathBuf, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// e-μ H → WW analysis: event selection, cutflows and histograms
#[derive(Parser, Debug)]
#[command(name = "hww-analysis", version, about)]
struct Cli {
    /// Analysis configuration (JSON). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of sample file lists, overriding the configuration
    #[arg(short, long = "input-dir")]
    input_dirs: Vec<PathBuf>,

    /// Directory where results are written, overriding the configuration
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Local mirror of the storage that file list URLs point to
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Number of worker threads (0 = auto), overriding the configuration
    #[arg(short, long)]
    threads: Option<usize>,

    /// Maximal number of files to read from each file list
    #[arg(long)]
    max_files: Option<usize>,

    /// Log debugging information (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

/// This will act as our main function, with suitable error handling
fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // ### CONFIGURATION READOUT ###

    let mut cfg = match &cli.config {
        Some(path) => Configuration::load(path).wrap_err("Failed to load the configuration")?,
        None => {
            let cfg = Configuration::default();
            cfg.print();
            cfg
        }
    };
    if !cli.input_dirs.is_empty() {
        cfg.input_dirs = cli.input_dirs;
    }
    if let Some(output_dir) = cli.output_dir {
        cfg.output_dir = output_dir;
    }
    if cli.data_dir.is_some() {
        cfg.data_dir = cli.data_dir;
    }
    if let Some(threads) = cli.threads {
        cfg.num_threads = threads;
    }
    if cli.max_files.is_some() {
        cfg.max_files_per_list = cli.max_files;
    }
    let context = cfg.context().wrap_err("Failed to set up the analysis")?;

    // ### INPUT DISCOVERY ###

    let file_lists = dataset::load_file_lists(&cfg.input_dirs, cfg.max_files_per_list)
        .wrap_err("Failed to read the file lists")?;
    if file_lists.is_empty() {
        warn!("No input files were found, results will be empty");
    }
    let tasks = file_lists
        .iter()
        .flat_map(|(label, files)| {
            files.iter().map(move |file| FileTask {
                label: label.clone(),
                file: file.clone(),
            })
        })
        .collect::<Vec<_>>();
    for label in dataset::sort_samples(file_lists.keys().map(String::as_str)) {
        info!("{label}: {} files", file_lists[label].len());
    }

    // ### ANALYSIS EXECUTION ###

    // Start the clock after configuration I/O
    let saved_time = Instant::now();

    let source = match &cfg.data_dir {
        Some(dir) => JsonSource::with_root(dir),
        None => JsonSource::new(),
    };
    let worker = FileWorker::new(&context, &source);
    let results = FinalResults::new(&context, file_lists.keys().map(String::as_str));
    let results = scheduling::run_analysis(
        &tasks,
        cfg.num_threads,
        |task: &FileTask| worker.process(task),
        results,
    );

    let elapsed_time = saved_time.elapsed();

    // ### RESULTS DISPLAY AND STORAGE ###

    output::dump_results(&cfg, &results, elapsed_time).wrap_err("Failed to output the results")?;
    Ok(())
}
