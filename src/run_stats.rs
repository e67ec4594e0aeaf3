use crate::scheduler::{BatchReport, FileRecord, FileState};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Per-file processing statistics
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileStats {
    pub file_name: String,
    pub bytes_read: u64,
    pub rows_accepted: u64,
    /// Rows dropped for a column count mismatch
    pub rows_skipped: u64,
    pub invalid_values: u64,
    pub processing_time_ms: u64,
    pub bytes_per_sec: f64,
    /// summarized, failed, not_started or interrupted
    pub status: String,
    pub error: Option<String>,
}

impl From<&FileRecord> for FileStats {
    fn from(record: &FileRecord) -> Self {
        let metrics = &record.metrics;
        let status = match record.state {
            FileState::Summarized => "summarized",
            FileState::Failed => "failed",
            FileState::Queued => "not_started",
            FileState::Reading | FileState::Parsing => "interrupted",
        };
        Self {
            file_name: record.file_name.clone(),
            bytes_read: metrics.bytes_read,
            rows_accepted: metrics.rows_accepted,
            rows_skipped: metrics.rows_skipped,
            invalid_values: metrics.invalid_values,
            processing_time_ms: metrics.duration_ms,
            bytes_per_sec: throughput(metrics.bytes_read, metrics.duration_ms),
            status: status.to_string(),
            error: record.error.clone(),
        }
    }
}

/// Whole-run statistics written by `--stats-out`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunStats {
    /// Unix seconds at which the run started
    pub run_start: u64,
    pub total_processing_time_ms: u64,
    pub total_bytes_read: u64,
    pub overall_bytes_per_sec: f64,
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_not_started: usize,
    pub groups: usize,
    pub cancelled: bool,
    pub file_stats: Vec<FileStats>,
}

impl RunStats {
    pub fn from_report(report: &BatchReport, groups: usize, run_start: SystemTime) -> Self {
        let file_stats: Vec<FileStats> = report.records.iter().map(FileStats::from).collect();
        let total_bytes_read = file_stats.iter().map(|f| f.bytes_read).sum();
        let files_processed = report
            .records
            .iter()
            .filter(|r| r.state == FileState::Summarized)
            .count();

        Self {
            run_start: run_start
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            total_processing_time_ms: report.duration_ms,
            total_bytes_read,
            overall_bytes_per_sec: throughput(total_bytes_read, report.duration_ms),
            files_processed,
            files_failed: report.failed(),
            files_not_started: report.not_started(),
            groups,
            cancelled: report.cancelled,
            file_stats,
        }
    }
}

fn throughput(bytes: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        0.0
    } else {
        bytes as f64 / (duration_ms as f64 / 1000.0)
    }
}

/// Write run statistics as pretty JSON
pub async fn write_run_stats(path: &Path, stats: &RunStats) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let content = serde_json::to_vec_pretty(stats)?;
    writer.write_all(&content).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
