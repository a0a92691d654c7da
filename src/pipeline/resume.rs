//! File-existence based resume for journey passes.
//!
//! The unit of recoverability is one stop's output file: a stop already
//! present in the target directory is picked up from there, so journeys
//! collected by an interrupted run are never thrown away.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::input::{list_json_files, load_record};
use crate::model::StopTravelRecord;
use crate::output::write_json_atomic;

/// Where a working record was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Output of an earlier, possibly partial, run of this pass.
    Resumed,
    /// Output of the previous stage.
    Input,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    input_dir: PathBuf,
    target_dir: PathBuf,
}

impl ResultStore {
    pub fn new(input_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Result<Self> {
        let target_dir = target_dir.into();
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("creating {}", target_dir.display()))?;
        Ok(Self {
            input_dir: input_dir.into(),
            target_dir,
        })
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Stop files produced by the previous stage, sorted by name.
    pub fn pending_files(&self) -> Result<Vec<String>> {
        list_json_files(&self.input_dir)
    }

    /// Loads the record to work on: the target file when an earlier run
    /// already wrote one, the input file otherwise.
    pub fn working_record(&self, file_name: &str) -> Result<(StopTravelRecord, RecordSource)> {
        let existing = self.target_dir.join(file_name);
        if existing.exists() {
            debug!(file = file_name, "Resuming from existing output");
            return Ok((load_record(&existing)?, RecordSource::Resumed));
        }
        Ok((
            load_record(&self.input_dir.join(file_name))?,
            RecordSource::Input,
        ))
    }

    /// A stop that already has a connection somewhere needs no queries.
    pub fn should_reuse_existing(&self, record: &StopTravelRecord) -> bool {
        !record.travel_times.is_empty()
    }

    /// Writes the whole record, replacing any earlier output for `stop_key`.
    pub fn persist(&self, stop_key: &str, record: &StopTravelRecord) -> Result<()> {
        write_json_atomic(&self.target_dir.join(format!("{stop_key}.json")), record)
    }
}
