//! Sources of event batches
//!
//! The analysis does not care where events come from, only that a file can be
//! opened and read as a sequence of batches. Reading may fail at any point,
//! and the failure is reported through the batch iterator.

use crate::{
    error::{Error, Result},
    event::{EventBatch, EventRecord, SampleKind},
};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader, Lines},
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Iterator over the event batches of an open file
pub trait BatchReader: Iterator<Item = Result<EventBatch>> + Send {}
//
impl<T: Iterator<Item = Result<EventBatch>> + Send> BatchReader for T {}

/// Something that can open event files
pub trait EventSource: Sync {
    /// Open a file, to be read in batches of at most `batch_size` events
    fn open(
        &self,
        file: &str,
        batch_size: usize,
        kind: SampleKind,
    ) -> Result<Box<dyn BatchReader + '_>>;
}

/// Failure injected into a `MemorySource`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// I/O error of some kind
    Io(io::ErrorKind),
    /// Malformed input data
    Malformed,
}
//
impl Fault {
    fn to_error(self) -> Error {
        match self {
            Fault::Io(kind) => io::Error::new(kind, "injected I/O failure").into(),
            Fault::Malformed => Error::MalformedBatch("injected malformed batch".to_owned()),
        }
    }
}

/// When a scripted failure strikes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScriptedFault {
    /// Number of attempts at reading the file that are affected
    attempts: usize,
    /// Number of batches successfully read before failing, None if the
    /// failure happens at open time
    after_batches: Option<usize>,
    fault: Fault,
}

/// In-memory file contents
#[derive(Debug, Default)]
struct MemoryFile {
    records: Vec<EventRecord>,
    faults: Vec<ScriptedFault>,
    opens: AtomicUsize,
}

/// Event source which serves files from memory, with scripted failures
#[derive(Debug, Default)]
pub struct MemorySource {
    files: BTreeMap<String, MemoryFile>,
}
//
impl MemorySource {
    /// Set up an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file
    pub fn with_file(mut self, file: &str, records: Vec<EventRecord>) -> Self {
        self.files.entry(file.to_owned()).or_default().records = records;
        self
    }

    /// Make the first `attempts` opens of a file fail
    pub fn fail_open(self, file: &str, attempts: usize, fault: Fault) -> Self {
        self.script(file, attempts, None, fault)
    }

    /// Make the first `attempts` reads of a file fail after some batches
    pub fn fail_read(self, file: &str, attempts: usize, after_batches: usize, fault: Fault) -> Self {
        self.script(file, attempts, Some(after_batches), fault)
    }

    fn script(mut self, file: &str, attempts: usize, after_batches: Option<usize>, fault: Fault) -> Self {
        self.files
            .entry(file.to_owned())
            .or_default()
            .faults
            .push(ScriptedFault {
                attempts,
                after_batches,
                fault,
            });
        self
    }

    /// Number of times a file was opened so far
    pub fn opens(&self, file: &str) -> usize {
        self.files
            .get(file)
            .map_or(0, |f| f.opens.load(Ordering::Relaxed))
    }
}
//
impl EventSource for MemorySource {
    fn open(
        &self,
        file: &str,
        batch_size: usize,
        _kind: SampleKind,
    ) -> Result<Box<dyn BatchReader + '_>> {
        let Some(contents) = self.files.get(file) else {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("no such file: {file}")).into());
        };
        let attempt = contents.opens.fetch_add(1, Ordering::Relaxed) + 1;
        let active = contents.faults.iter().filter(|f| attempt <= f.attempts);
        let mut read_fault = None;
        for scripted in active {
            match scripted.after_batches {
                None => return Err(scripted.fault.to_error()),
                Some(after) => read_fault = read_fault.or(Some((after, scripted.fault))),
            }
        }

        let batches = contents
            .records
            .chunks(batch_size.max(1))
            .map(|chunk| Ok::<_, Error>(EventBatch::from_records(chunk.to_vec())));
        let reader: Box<dyn BatchReader + '_> = match read_fault {
            None => Box::new(batches),
            Some((after, fault)) => Box::new(
                batches
                    .take(after)
                    .chain(std::iter::once(Err(fault.to_error()))),
            ),
        };
        Ok(reader)
    }
}

/// Event source reading local newline-delimited JSON files
///
/// Each non-blank line holds one `EventRecord`. When a root directory is set,
/// it acts as a local mirror of the remote storage: the URL
/// `root://host//store/file.root` is read from `<root>/store/file.root`.
#[derive(Clone, Debug, Default)]
pub struct JsonSource {
    /// Directory that relative paths and URLs are resolved against
    root: Option<PathBuf>,
}
//
impl JsonSource {
    /// Set up a source for absolute or working directory relative paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up a source for paths relative to some directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Local path of a file, None for URLs that have no local mirror
    pub fn local_path(&self, file: &str) -> Option<PathBuf> {
        match (file.split_once("://"), &self.root) {
            (Some((_scheme, rest)), Some(root)) => {
                let (_host, path) = rest.split_once('/')?;
                let path = path.trim_start_matches('/');
                (!path.is_empty()).then(|| root.join(path))
            }
            (Some(_), None) => None,
            (None, Some(root)) => Some(root.join(file)),
            (None, None) => Some(PathBuf::from(file)),
        }
    }
}
//
impl EventSource for JsonSource {
    fn open(
        &self,
        file: &str,
        batch_size: usize,
        _kind: SampleKind,
    ) -> Result<Box<dyn BatchReader + '_>> {
        let Some(path) = self.local_path(file) else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("remote file {file} has no local mirror"),
            )
            .into());
        };
        Ok(Box::new(JsonReader {
            lines: BufReader::new(File::open(path)?).lines(),
            batch_size: batch_size.max(1),
            done: false,
        }))
    }
}

/// Batch iterator over a newline-delimited JSON file
struct JsonReader {
    lines: Lines<BufReader<File>>,
    batch_size: usize,
    done: bool,
}
//
impl Iterator for JsonReader {
    type Item = Result<EventBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.lines.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => match serde_json::from_str::<EventRecord>(&line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e.into()));
                    }
                },
            }
        }
        (!records.is_empty()).then(|| Ok(EventBatch::from_records(records)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn records(n: usize) -> Vec<EventRecord> {
        (0..n)
            .map(|i| EventRecord {
                met_pt: i as _,
                gen_weight: Some(1.),
                ..EventRecord::default()
            })
            .collect()
    }

    fn batch_sizes(reader: Box<dyn BatchReader + '_>) -> Vec<Result<usize>> {
        reader.map(|batch| batch.map(|b| b.len())).collect()
    }

    #[test]
    fn memory_batches() {
        let source = MemorySource::new().with_file("a", records(5));
        let sizes = batch_sizes(source.open("a", 2, SampleKind::Simulation).unwrap());
        assert_eq!(sizes.into_iter().collect::<Result<Vec<_>>>().unwrap(), [2, 2, 1]);
        assert_eq!(source.opens("a"), 1);

        let missing = source.open("b", 2, SampleKind::Simulation).err().unwrap();
        assert!(!missing.is_transient());
    }

    #[test]
    fn scripted_failures() {
        let source = MemorySource::new()
            .with_file("a", records(5))
            .fail_open("a", 1, Fault::Io(io::ErrorKind::TimedOut))
            .fail_read("a", 2, 1, Fault::Io(io::ErrorKind::ConnectionReset));

        let first = source.open("a", 2, SampleKind::Simulation).err().unwrap();
        assert_eq!(first.class(), "TimeoutError");

        let second = batch_sizes(source.open("a", 2, SampleKind::Simulation).unwrap());
        assert_eq!(second.len(), 2);
        assert_eq!(*second[0].as_ref().unwrap(), 2);
        assert_eq!(second[1].as_ref().unwrap_err().class(), "ConnectionError");

        let third = batch_sizes(source.open("a", 2, SampleKind::Simulation).unwrap());
        assert!(third.iter().all(|r| r.is_ok()));
        assert_eq!(source.opens("a"), 3);
    }

    #[test]
    fn json_lines() {
        let dir = std::env::temp_dir().join(format!("hww-json-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        {
            let mut file = File::create(dir.join("events.jsonl")).unwrap();
            for record in records(3) {
                writeln!(file, "{}", serde_json::to_string(&record).unwrap()).unwrap();
                writeln!(file).unwrap();
            }
            writeln!(file, "{{\"met_pt\": oops}}").unwrap();
        }
        let source = JsonSource::with_root(&dir);
        let sizes = batch_sizes(source.open("events.jsonl", 2, SampleKind::Simulation).unwrap());
        // The batch holding the bad line is lost along with it
        assert_eq!(sizes.len(), 2);
        assert_eq!(*sizes[0].as_ref().unwrap(), 2);
        assert!(matches!(sizes[1], Err(Error::Json(_))));

        let mirrored = batch_sizes(source.open("root://host//events.jsonl", 2, SampleKind::Simulation).unwrap());
        assert_eq!(mirrored.len(), 2);

        let remote = JsonSource::new().open("root://host//events.jsonl", 2, SampleKind::Data).err().unwrap();
        assert!(!remote.is_transient());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn url_mirroring() {
        let mirror = JsonSource::with_root("/mirror");
        assert_eq!(
            mirror.local_path("root://eospublic.cern.ch//eos/opendata/cms/a.root"),
            Some(PathBuf::from("/mirror/eos/opendata/cms/a.root"))
        );
        assert_eq!(mirror.local_path("root://host/b.root"), Some(PathBuf::from("/mirror/b.root")));
        assert_eq!(mirror.local_path("root://host"), None);
        assert_eq!(mirror.local_path("c.jsonl"), Some(PathBuf::from("/mirror/c.jsonl")));
        assert_eq!(JsonSource::new().local_path("root://host//a.root"), None);
        assert_eq!(JsonSource::new().local_path("c.jsonl"), Some(PathBuf::from("c.jsonl")));
    }
}
