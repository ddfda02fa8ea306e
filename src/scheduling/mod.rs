//! This module takes care of scheduling the analysis work, encapsulating use
//! of multiple threads and anything else that will come in the future

#[cfg(not(feature = "multi-threading"))] mod sequential;
#[cfg(feature = "multi-threading")] mod multi_threading;

use crate::{
    resfin::FinalResults,
    worker::{FileOutcome, FileTask},
};
use tracing::info;


/// Run the analysis in the manner that was configured at build time.
///
/// Takes as parameters the files to be processed, the number of worker
/// threads (0 for an automatic choice, ignored in sequential mode), and a
/// kernel that processes one file.
///
/// Outcomes are integrated into the final results one at a time, in the
/// order in which files complete. Since merging results is commutative,
/// this order does not affect the outcome beyond floating-point rounding.
///
pub fn run_analysis(
    tasks: &[FileTask],
    num_threads: usize,
    process_file: impl Send + Sync + Fn(&FileTask) -> FileOutcome,
    mut results: FinalResults,
) -> FinalResults {
    info!("Processing {} files", tasks.len());

    // Integrate analysis results...
    {
        // ...in sequential mode
        #[cfg(not(feature = "multi-threading"))]
        {
            let _ = num_threads;
            sequential::run_analysis_impl(tasks, process_file, &mut results);
        }

        // ...in multi-threaded mode
        #[cfg(feature = "multi-threading")]
        {
            multi_threading::run_analysis_impl(tasks, num_threads, process_file, &mut results);
        }
    }

    info!(
        "Processed {} files, {} failed",
        results.processed_files,
        results.failed_files()
    );
    results
}
