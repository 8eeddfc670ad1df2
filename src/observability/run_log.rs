//! Training Run Log
//!
//! One JSON line per training run, appended to an optional file, plus a
//! bounded in-memory history.

use crate::error::{MushError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Training run log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunEntry {
    pub timestamp: DateTime<Utc>,
    pub dataset: String,
    pub seed: u64,
    pub test_size: f64,
    pub stratify: bool,
    pub n_train: usize,
    pub n_test: usize,
    pub accuracy: f64,
    pub baseline_accuracy: f64,
    pub tree_depth: usize,
    pub tree_leaves: usize,
    pub duration_ms: u64,
}

/// Training run logger
pub struct RunLogger {
    log_file: Option<PathBuf>,
    runs: Arc<Mutex<VecDeque<TrainingRunEntry>>>,
    max_in_memory_logs: usize,
}

impl RunLogger {
    pub fn new(log_file: Option<PathBuf>, max_in_memory_logs: usize) -> Self {
        Self {
            log_file,
            runs: Arc::new(Mutex::new(VecDeque::new())),
            max_in_memory_logs,
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log a training run
    pub fn log_run(&self, entry: TrainingRunEntry) -> Result<()> {
        {
            let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.push_back(entry.clone());
            while runs.len() > self.max_in_memory_logs {
                runs.pop_front();
            }
        }

        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .map_err(|e| {
                    MushError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to open run log {}: {}", log_file.display(), e),
                    ))
                })?;
            let json = serde_json::to_string(&entry)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    /// Most recent runs, newest first
    pub fn recent_runs(&self, limit: usize) -> Vec<TrainingRunEntry> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.iter().rev().take(limit).cloned().collect()
    }

    /// Export the in-memory history as pretty JSON
    pub fn export_logs(&self) -> Result<String> {
        let runs: Vec<TrainingRunEntry> = self
            .runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect();

        let export = serde_json::json!({
            "runs": runs,
            "exported_at": Utc::now().to_rfc3339()
        });
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new(None, 100)
    }
}
