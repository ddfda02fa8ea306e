//! Processing of one input file, with retries
//!
//! A file goes through the following states:
//!
//! - It is opened and read batch by batch, each batch being integrated into
//!   a fresh `ResultsAccumulator`.
//! - If opening or reading fails with a transient error, everything that was
//!   accumulated from this file is thrown away, and after some delay the file
//!   is read again from the start, within a fixed attempt budget.
//! - Any other error, or a transient error on the last attempt, fails the
//!   file for good.

use crate::{
    config::AnalysisContext,
    dataset::{self, SampleKey},
    error::{Error, Result},
    event::SampleKind,
    resacc::ResultsAccumulator,
    source::EventSource,
    weights::Normalization,
};
use std::{
    fmt::{self, Display},
    thread,
    time::Duration,
};
use tracing::{debug, info_span, warn};

/// Maximal length of the error messages that are reported
const MAX_MESSAGE_LEN: usize = 100;

/// How hard to try reading a file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts, including the first one
    pub max_attempts: usize,
    /// Delay between attempts
    pub backoff: Duration,
}
//
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(3),
        }
    }
}

/// One file to be processed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTask {
    /// Sample which the file belongs to
    pub label: String,
    /// Location of the file
    pub file: String,
}

/// Why a file could not be processed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileError {
    /// Short name of the error class
    pub class: &'static str,
    /// Truncated error message
    pub message: String,
    /// Number of attempts made
    pub attempts: usize,
}
//
impl FileError {
    fn new(error: &Error, attempts: usize) -> Self {
        Self {
            class: error.class(),
            message: error.to_string().chars().take(MAX_MESSAGE_LEN).collect(),
            attempts,
        }
    }
}
//
impl Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts > 1 {
            write!(f, "{} after {} attempts - {}", self.class, self.attempts, self.message)
        } else {
            write!(f, "{} - {}", self.class, self.message)
        }
    }
}

/// What came out of processing a file
#[derive(Debug)]
pub struct FileOutcome {
    /// Sample which the file belongs to
    pub label: String,
    /// Location of the file
    pub file: String,
    /// Accumulated results, or why there are none
    pub result: std::result::Result<ResultsAccumulator, FileError>,
}

/// Stateless file processor, parametrized by the analysis configuration
pub struct FileWorker<'a, S: EventSource + ?Sized> {
    context: &'a AnalysisContext,
    source: &'a S,
}
//
impl<'a, S: EventSource + ?Sized> FileWorker<'a, S> {
    /// Set up a worker
    pub fn new(context: &'a AnalysisContext, source: &'a S) -> Self {
        Self { context, source }
    }

    /// Process one file, never failing but possibly reporting a failure
    pub fn process(&self, task: &FileTask) -> FileOutcome {
        let name = dataset::file_name(&task.file);
        let _span = info_span!("file", sample = %task.label, file = name).entered();
        let kind = SampleKind::of_label(&task.label);
        let normalization = self.normalization(task, kind);
        let policy = &self.context.retry;

        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            debug!("Reading (attempt {attempt}/{})", policy.max_attempts);
            match self.read(task, kind, normalization) {
                Ok(results) => break Ok(results),
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    warn!(
                        "{} - retry {attempt}/{} in {:?}",
                        e.class(),
                        policy.max_attempts - 1,
                        policy.backoff
                    );
                    if !policy.backoff.is_zero() {
                        thread::sleep(policy.backoff);
                    }
                }
                Err(e) => {
                    warn!("Failed after {attempt} attempt(s): {e}");
                    break Err(FileError::new(&e, attempt));
                }
            }
        };

        FileOutcome {
            label: task.label.clone(),
            file: task.file.clone(),
            result,
        }
    }

    /// Normalization of the events of a file
    fn normalization(&self, task: &FileTask, kind: SampleKind) -> Normalization {
        if kind == SampleKind::Data {
            return Normalization::Data;
        }
        let key = dataset::sample_key(&task.file);
        let normalization = match key {
            SampleKey::Simulation(key) => Normalization::lookup(
                Some(key),
                &self.context.samples,
                self.context.luminosity,
            ),
            SampleKey::Data | SampleKey::Unknown => Normalization::Unknown,
        };
        if normalization == Normalization::Unknown {
            warn!("No sample metadata for this file ({key:?}), its events will weigh zero");
        }
        normalization
    }

    /// Make one attempt at reading a file
    fn read(
        &self,
        task: &FileTask,
        kind: SampleKind,
        normalization: Normalization,
    ) -> Result<ResultsAccumulator> {
        let reader = self.source.open(&task.file, self.context.batch_size, kind)?;
        let mut results = ResultsAccumulator::new(self.context);
        for batch in reader {
            let batch = batch?;
            debug!("Processing a batch of {} events", batch.len());
            results.integrate_batch(&batch, kind, normalization, self.context)?;
        }
        Ok(results)
    }
}
