//! Sequential back-end of the analysis

use crate::{
    resfin::FinalResults,
    worker::{FileOutcome, FileTask},
};

/// Process files one after another, in submission order
pub fn run_analysis_impl(
    tasks: &[FileTask],
    process_file: impl Fn(&FileTask) -> FileOutcome,
    results: &mut FinalResults,
) {
    for task in tasks {
        results.integrate(process_file(task));
    }
}
