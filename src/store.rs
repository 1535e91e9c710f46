//! Run persistence behind a trait so the pipeline never touches storage
//! directly. The JSON file store is the production backend; the memory store
//! backs tests and embedding callers.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::run::{RunRecord, RunResults};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub trait RunStore {
    fn save_run(&mut self, run: &RunRecord) -> Result<(), StoreError>;
    fn load_run(&self, id: &str) -> Result<Option<RunRecord>, StoreError>;
    fn save_results(&mut self, results: &RunResults) -> Result<(), StoreError>;
    fn load_results(&self, id: &str) -> Result<Option<RunResults>, StoreError>;
}

/// One `run-<id>.json` and one `results-<id>.json` per run under a base
/// directory. Run records are small and rewritten on every state change;
/// results are written once on completion.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonFileStore { dir: dir.into() }
    }

    fn run_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("run-{id}.json"))
    }

    fn results_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("results-{id}.json"))
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }
}

impl RunStore for JsonFileStore {
    fn save_run(&mut self, run: &RunRecord) -> Result<(), StoreError> {
        self.write_json(&self.run_path(&run.id), run)
    }

    fn load_run(&self, id: &str) -> Result<Option<RunRecord>, StoreError> {
        self.read_json(&self.run_path(id))
    }

    fn save_results(&mut self, results: &RunResults) -> Result<(), StoreError> {
        self.write_json(&self.results_path(&results.run_id), results)
    }

    fn load_results(&self, id: &str) -> Result<Option<RunResults>, StoreError> {
        self.read_json(&self.results_path(id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: BTreeMap<String, RunRecord>,
    results: BTreeMap<String, RunResults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

impl RunStore for MemoryStore {
    fn save_run(&mut self, run: &RunRecord) -> Result<(), StoreError> {
        self.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn load_run(&self, id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.runs.get(id).cloned())
    }

    fn save_results(&mut self, results: &RunResults) -> Result<(), StoreError> {
        self.results.insert(results.run_id.clone(), results.clone());
        Ok(())
    }

    fn load_results(&self, id: &str) -> Result<Option<RunResults>, StoreError> {
        Ok(self.results.get(id).cloned())
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/store.rs"]
mod tests;
