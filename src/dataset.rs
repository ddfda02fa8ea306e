//! Discovery of input files and their sample membership
//!
//! Input files are listed in plain text files, one URL per line, with one list
//! per physics process. The list file name tells which sample the files
//! belong to, while each file's own name tells which simulation it comes from
//! and hence which cross-section normalizes it.

use crate::{error::Result, event::SampleKind};
use std::{
    collections::BTreeMap,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Prefix of the URLs that file lists contain
pub const URL_PREFIX: &str = "root://";

/// Sample labels, keyed by a pattern that list file names must contain
///
/// Patterns are tried in order and the first match wins, so "ggww" must come
/// before "ww".
const SAMPLE_PATTERNS: [(&str, &str); 9] = [
    ("data", SampleKind::DATA_LABEL),
    ("higgs", "ggH_HWW"),
    ("dytoll", "DY_to_Tau_Tau"),
    ("top", "Top_antitop"),
    ("fakes", "Fakes"),
    ("vz", "Diboson"),
    ("ggww", "ggWW"),
    ("ww", "WW"),
    ("vg", "VG"),
];

/// Order in which samples are reported
pub const SAMPLE_ORDER: [&str; 9] = [
    SampleKind::DATA_LABEL,
    "ggH_HWW",
    "WW",
    "Top_antitop",
    "DY_to_Tau_Tau",
    "Fakes",
    "ggWW",
    "Diboson",
    "VG",
];

/// Sample label of a file list, from its file name
pub fn sample_label(list_name: &str) -> Option<&'static str> {
    let name = list_name.to_lowercase();
    let name = name.strip_suffix(".txt").unwrap_or(&name);
    SAMPLE_PATTERNS
        .iter()
        .find(|(pattern, _)| name.contains(pattern))
        .map(|&(_, label)| label)
}

/// Sort sample labels in reporting order, unknown labels last
pub fn sort_samples<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let rank = |label: &str| {
        SAMPLE_ORDER
            .iter()
            .position(|&known| known == label)
            .unwrap_or(SAMPLE_ORDER.len())
    };
    let mut labels = labels.into_iter().collect::<Vec<_>>();
    labels.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
    labels.dedup();
    labels
}

/// Read the URLs of a file list, up to some maximum
pub fn read_file_list(path: &Path, max_files: Option<usize>) -> Result<Vec<String>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.starts_with(URL_PREFIX) {
            continue;
        }
        urls.push(line.to_owned());
        if max_files.map_or(false, |max| urls.len() >= max) {
            break;
        }
    }
    Ok(urls)
}

/// Gather the input files of every sample from directories of file lists
///
/// Only `*.txt` files are considered, and those whose name matches no known
/// sample are skipped. Missing directories are skipped as well. The
/// `max_per_list` limit applies to each list file separately.
pub fn load_file_lists(
    dirs: &[PathBuf],
    max_per_list: Option<usize>,
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut files = BTreeMap::<String, Vec<String>>::new();
    for dir in dirs {
        if !dir.is_dir() {
            warn!("Skipping missing file list directory {}", dir.display());
            continue;
        }
        let mut lists = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        lists.sort();
        for path in lists {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".txt") {
                continue;
            }
            let Some(label) = sample_label(name) else {
                warn!("Unknown file list {name}, skipping it");
                continue;
            };
            let urls = read_file_list(&path, max_per_list)?;
            debug!("{name}: {} files of sample {label}", urls.len());
            if !urls.is_empty() {
                files.entry(label.to_owned()).or_default().extend(urls);
            }
        }
    }
    Ok(files)
}

/// Which sample metadata normalizes a file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKey {
    /// Detector data, not normalized
    Data,
    /// Simulation with a known metadata key
    Simulation(&'static str),
    /// Simulation which cannot be normalized
    Unknown,
}

/// Deduce the sample metadata key of a file from its URL
///
/// Patterns are tried in order, which matters for the single top samples
/// and for the Higgs samples, whose names contain `WWTo2L2Nu`.
pub fn sample_key(file_url: &str) -> SampleKey {
    const DATA_PATTERNS: [&str; 4] = ["Run2016", "SingleMuon", "DoubleEG", "MuonEG"];
    const SIMULATION_PATTERNS: [(&str, &str); 16] = [
        ("DYJetsToLL", "DYJetsToLL_M-50"),
        ("TTTo2L2Nu", "TTTo2L2Nu"),
        ("ST_t-channel_top", "ST_t-channel_top"),
        ("ST_t-channel_antitop", "ST_t-channel_antitop"),
        ("ST_tW_antitop", "ST_tW_antitop"),
        ("ST_tW_top", "ST_tW_top"),
        ("ST_s-channel", "ST_s-channel"),
        ("WJetsToLNu", "WJetsToLNu"),
        ("TTToSemiLeptonic", "TTToSemiLeptonic"),
        ("ZGToLLG", "ZGToLLG"),
        ("WGToLNuG", "WGToLNuG"),
        ("WZTo3LNu", "WZTo3LNu"),
        ("WZTo2Q2L", "WZTo2Q2L"),
        ("ZZ", "ZZ"),
        ("GluGluToWW", "GluGluToWW"),
        ("WWTo2L2Nu", "WWTo2L2Nu"),
    ];
    if DATA_PATTERNS.iter().any(|p| file_url.contains(p)) {
        return SampleKey::Data;
    }
    // Higgs dataset names also contain the WW decay pattern
    if file_url.contains("GluGluHToWW") || file_url.contains("Higgs") {
        return SampleKey::Simulation("Higgs");
    }
    SIMULATION_PATTERNS
        .iter()
        .find(|(pattern, _)| file_url.contains(pattern))
        .map_or(SampleKey::Unknown, |&(_, key)| SampleKey::Simulation(key))
}

/// Short name of a file, for reports
pub fn file_name(file_url: &str) -> &str {
    file_url.rsplit('/').next().unwrap_or(file_url)
}
