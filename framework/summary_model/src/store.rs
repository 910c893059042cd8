use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::round::Round;
use crate::summary::RunSummary;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid record on line {line} of {}: {source}", .path.display())]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize round: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The durable, append-only record of a run.
///
/// The file is created (or truncated) when the store is opened and closed when it is dropped.
/// Every appended round is written as one JSON line and synced before [ReportStore::append]
/// returns, so the report can be tailed while the run is in progress and survives an interrupted
/// run.
#[derive(Debug)]
pub struct ReportStore {
    path: PathBuf,
    file: File,
    rounds_written: usize,
}

impl ReportStore {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            file,
            rounds_written: 0,
        })
    }

    pub fn append(&mut self, round: &Round) -> Result<(), ReportError> {
        let mut line = serde_json::to_string(round)?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .map_err(|source| ReportError::Io {
                path: self.path.clone(),
                source,
            })?;

        self.rounds_written += 1;
        Ok(())
    }

    /// Read every record back from disk and summarise them.
    ///
    /// Only reads, so calling it repeatedly gives the same answer.
    pub fn summarize(&self) -> Result<RunSummary, ReportError> {
        let rounds = load_rounds(&self.path)?;
        Ok(RunSummary::from_rounds(&rounds))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rounds_written(&self) -> usize {
        self.rounds_written
    }
}

/// Load rounds from a report file.
///
/// The file should contain one JSON object per line. This is the format produced by
/// [ReportStore::append]. Blank lines are skipped.
pub fn load_rounds(path: impl AsRef<Path>) -> Result<Vec<Round>, ReportError> {
    let path = path.as_ref();
    let io_error = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut rounds = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }

        let round = serde_json::from_str(&line).map_err(|source| ReportError::Record {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        rounds.push(round);
    }

    Ok(rounds)
}
