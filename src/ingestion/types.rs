//! Per-file results and run statistics for bulk ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Failed,
    Skipped,
}

/// Outcome for one input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProcessingResult {
    pub path: PathBuf,
    pub name: String,
    pub status: FileStatus,
    pub size_bytes: u64,
    pub processing_time_ms: u64,
    /// Failure message, or the skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl FileProcessingResult {
    pub fn success(
        path: &Path,
        size_bytes: u64,
        processing_time_ms: u64,
        derived_id: String,
        content_length: usize,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            status: FileStatus::Success,
            size_bytes,
            processing_time_ms,
            error: None,
            derived_id: Some(derived_id),
            content_length: Some(content_length),
        }
    }

    pub fn failed(path: &Path, size_bytes: u64, processing_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            status: FileStatus::Failed,
            size_bytes,
            processing_time_ms,
            error: Some(error.into()),
            derived_id: None,
            content_length: None,
        }
    }

    pub fn skipped(path: &Path, size_bytes: u64, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            status: FileStatus::Skipped,
            size_bytes,
            processing_time_ms: 0,
            error: Some(reason.into()),
            derived_id: None,
            content_length: None,
        }
    }
}

/// Aggregate statistics for one `process_files` run; the bulk-import response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProcessingStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub total_size_bytes: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub average_processing_time_ms: f64,
    pub average_file_size_bytes: f64,
    pub results: Vec<FileProcessingResult>,
}

impl FileProcessingStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_files: 0,
            failed_files: 0,
            skipped_files: 0,
            total_size_bytes: 0,
            start_time: Utc::now(),
            end_time: None,
            average_processing_time_ms: 0.0,
            average_file_size_bytes: 0.0,
            results: Vec::with_capacity(total_files),
        }
    }

    pub fn record(&mut self, result: FileProcessingResult) {
        match result.status {
            FileStatus::Success => self.processed_files += 1,
            FileStatus::Failed => self.failed_files += 1,
            FileStatus::Skipped => self.skipped_files += 1,
        }
        self.total_size_bytes += result.size_bytes;
        self.results.push(result);
    }

    /// Files with an outcome so far; never exceeds `total_files`
    pub fn completed_files(&self) -> usize {
        self.processed_files + self.failed_files + self.skipped_files
    }

    /// Stamp the end time and compute averages over the recorded results
    pub fn finalize(&mut self) {
        self.end_time = Some(Utc::now());
        let count = self.results.len();
        if count == 0 {
            return;
        }
        let total_time: u64 = self.results.iter().map(|r| r.processing_time_ms).sum();
        self.average_processing_time_ms = total_time as f64 / count as f64;
        self.average_file_size_bytes = self.total_size_bytes as f64 / count as f64;
    }
}
