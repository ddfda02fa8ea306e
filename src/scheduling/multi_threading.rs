//! Multi-threaded back-end of the analysis

use crate::{
    resfin::FinalResults,
    worker::{FileOutcome, FileTask},
};
use rayon::prelude::*;
use std::{sync::mpsc, thread};
use tracing::warn;

/// Process files in parallel on a thread pool
///
/// Workers send their outcomes over a channel, and the calling thread merges
/// them into the final results as they arrive, so that no more than one
/// outcome per worker is held in memory at any time.
///
pub fn run_analysis_impl(
    tasks: &[FileTask],
    num_threads: usize,
    process_file: impl Send + Sync + Fn(&FileTask) -> FileOutcome,
    results: &mut FinalResults,
) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|idx| format!("worker-{idx}"))
        .build();
    let (sender, receiver) = mpsc::channel();

    // This is a synchronization scope: it will only return once all files
    // have been processed and all outcomes have been merged
    thread::scope(|scope| {
        let process_file = &process_file;
        scope.spawn(move || {
            let work = move || {
                tasks.par_iter().for_each_with(sender, |sender, task| {
                    // The receiver outlives all senders
                    let _ = sender.send(process_file(task));
                });
            };
            match pool {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    warn!("Could not set up a thread pool ({e}), using the global one");
                    work()
                }
            }
        });

        // The channel closes once every worker is done
        for outcome in receiver {
            results.integrate(outcome);
        }
    });
}
