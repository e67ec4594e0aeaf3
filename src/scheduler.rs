use crate::parser::{ParseError, ParseOptions, RowParser};
use crate::progress::{IntervalThrottle, ProgressCallback, ProgressThrottle, ProgressUpdate};
use crate::reader::{read_lines, ContentSource, ReaderConfig};
use crate::stats::{FileSummary, NumericPolicy, StatsAccumulator};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upper bound on concurrently processed files
pub const MAX_CONCURRENCY: usize = 16;

/// Hardware parallelism clamped to `[1, MAX_CONCURRENCY]`
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, MAX_CONCURRENCY)
}

/// Batch-level failures
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no input files were provided")]
    NoInputFiles,

    #[error("no files processed successfully ({failed} failed)")]
    NoSuccessfulFiles { failed: usize },

    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

/// Scheduler settings, fixed for the lifetime of one [`Scheduler`]
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Files processed at the same time
    pub concurrency_limit: usize,
    /// Read size per chunk; with `concurrency_limit` this bounds buffer memory
    pub chunk_size: usize,
    /// Header token that marks the header row
    pub marker_column: String,
    /// Minimum gap between progress callbacks
    pub progress_interval_ms: u32,
    pub header_search_lines: usize,
    pub max_line_bytes: usize,
    pub numeric_policy: NumericPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let parse = ParseOptions::default();
        let reader = ReaderConfig::default();
        Self {
            concurrency_limit: default_concurrency(),
            chunk_size: reader.chunk_size,
            marker_column: parse.marker_column,
            progress_interval_ms: 200,
            header_search_lines: parse.header_search_lines,
            max_line_bytes: reader.max_line_bytes,
            numeric_policy: NumericPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.concurrency_limit == 0 {
            return Err(BatchError::InvalidConfig("concurrency_limit must be at least 1".into()));
        }
        if self.concurrency_limit > MAX_CONCURRENCY {
            return Err(BatchError::InvalidConfig(format!(
                "concurrency_limit must be at most {MAX_CONCURRENCY}, got {}",
                self.concurrency_limit
            )));
        }
        if self.chunk_size == 0 {
            return Err(BatchError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(BatchError::InvalidConfig("max_line_bytes must be at least 1".into()));
        }
        if self.marker_column.trim().is_empty() {
            return Err(BatchError::InvalidConfig("marker_column must not be empty".into()));
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            marker_column: self.marker_column.clone(),
            header_search_lines: self.header_search_lines,
        }
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            chunk_size: self.chunk_size,
            max_line_bytes: self.max_line_bytes,
        }
    }
}

/// Shared flag that stops new files from being dispatched
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One file to process
#[derive(Debug)]
pub struct FileInput {
    pub name: String,
    pub source: ContentSource,
}

impl FileInput {
    pub fn new(name: impl Into<String>, source: ContentSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Name the input after the path's final component
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(name, ContentSource::Path(path.to_path_buf()))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, ContentSource::memory(bytes))
    }
}

/// Lifecycle of a file within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileState {
    Queued,
    Reading,
    Parsing,
    Summarized,
    Failed,
}

impl FileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Summarized | FileState::Failed)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FileMetrics {
    pub bytes_read: u64,
    pub rows_accepted: u64,
    pub rows_skipped: u64,
    pub invalid_values: u64,
    pub duration_ms: u64,
}

/// Final state of one input
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Position in the input list
    pub index: usize,
    pub file_name: String,
    pub state: FileState,
    pub error: Option<String>,
    pub metrics: FileMetrics,
}

/// Everything a batch produced
#[derive(Debug)]
pub struct BatchReport {
    /// One record per input, in input order
    pub records: Vec<FileRecord>,
    /// Successful summaries, in input order
    pub summaries: Vec<FileSummary>,
    /// Cancellation was requested during the run
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.summaries.len()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Inputs never dispatched because of cancellation
    pub fn not_started(&self) -> usize {
        self.records.iter().filter(|r| r.state == FileState::Queued).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|r| r.state == FileState::Failed)
    }
}

struct WorkerContext {
    parse: ParseOptions,
    reader: ReaderConfig,
    numeric_policy: NumericPolicy,
}

struct FileOutcome {
    index: usize,
    result: Result<FileSummary, ParseError>,
    metrics: FileMetrics,
}

enum WorkerEvent {
    Started { index: usize },
    Parsing { index: usize },
    Finished(FileOutcome),
}

type MakeThrottle = Arc<dyn Fn() -> Box<dyn ProgressThrottle> + Send + Sync>;

/// Bounded worker pool over a shared file queue
///
/// Each worker pulls the next queued file when it becomes free, so a slow file never
/// holds back the rest. Per-file errors end in [`FileState::Failed`] and never abort
/// the batch.
pub struct Scheduler {
    config: SchedulerConfig,
    progress: Option<ProgressCallback>,
    make_throttle: Option<MakeThrottle>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            progress: None,
            make_throttle: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Replace the default interval throttle; `make` is called once per run
    pub fn with_throttle<F, T>(mut self, make: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: ProgressThrottle + 'static,
    {
        self.make_throttle = Some(Arc::new(move || Box::new(make()) as Box<dyn ProgressThrottle>));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn run(&self, inputs: Vec<FileInput>) -> Result<BatchReport, BatchError> {
        self.config.validate()?;
        if inputs.is_empty() {
            return Err(BatchError::NoInputFiles);
        }

        let start = Instant::now();
        let total = inputs.len();
        let workers = self.config.concurrency_limit.min(total);
        info!("Starting batch of {} files with {} workers", total, workers);

        let mut records: Vec<FileRecord> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| FileRecord {
                index,
                file_name: input.name.clone(),
                state: FileState::Queued,
                error: None,
                metrics: FileMetrics::default(),
            })
            .collect();

        let queue: Arc<Mutex<VecDeque<(usize, FileInput)>>> =
            Arc::new(Mutex::new(inputs.into_iter().enumerate().collect()));
        let context = Arc::new(WorkerContext {
            parse: self.config.parse_options(),
            reader: self.config.reader_config(),
            numeric_policy: self.config.numeric_policy,
        });

        // WHY: unbounded so a slow progress callback can never stall a worker
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&queue),
                    Arc::clone(&context),
                    self.cancel.clone(),
                    tx.clone(),
                ))
            })
            .collect();
        drop(tx);

        let mut slots: Vec<Option<FileSummary>> = vec![None; total];
        let mut in_flight: BTreeSet<usize> = BTreeSet::new();
        let mut current: Option<usize> = None;
        let mut completed = 0usize;
        let mut throttle: Box<dyn ProgressThrottle> = match &self.make_throttle {
            Some(make) => make(),
            None => Box::new(IntervalThrottle::from_millis(self.config.progress_interval_ms)),
        };

        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Started { index } => {
                    debug!("{}: Queued -> Reading", records[index].file_name);
                    records[index].state = FileState::Reading;
                    in_flight.insert(index);
                    current = Some(index);
                }
                WorkerEvent::Parsing { index } => {
                    debug!("{}: Reading -> Parsing", records[index].file_name);
                    records[index].state = FileState::Parsing;
                }
                WorkerEvent::Finished(outcome) => {
                    completed += 1;
                    let index = outcome.index;
                    in_flight.remove(&index);
                    if current == Some(index) {
                        current = in_flight.last().copied();
                    }

                    let record = &mut records[index];
                    record.metrics = outcome.metrics;
                    match outcome.result {
                        Ok(summary) => {
                            debug!("{}: Summarized ({} rows)", record.file_name, summary.row_count);
                            record.state = FileState::Summarized;
                            slots[index] = Some(summary);
                        }
                        Err(e) => {
                            warn!("Failed to process {}: {}", record.file_name, e);
                            record.state = FileState::Failed;
                            record.error = Some(e.to_string());
                        }
                    }
                }
            }

            if let Some(callback) = &self.progress {
                if throttle.ready(Instant::now()) {
                    callback(&ProgressUpdate {
                        files_completed: completed,
                        files_total: total,
                        currently_processing_name: current.map(|i| records[i].file_name.clone()),
                    });
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task terminated abnormally: {}", e);
            }
        }

        // A worker that died mid-file never reported it
        for record in records.iter_mut() {
            if matches!(record.state, FileState::Reading | FileState::Parsing) {
                warn!("Failed to process {}: worker terminated", record.file_name);
                record.state = FileState::Failed;
                record.error = Some("worker terminated before the file completed".to_string());
            }
        }

        if let Some(callback) = &self.progress {
            callback(&ProgressUpdate {
                files_completed: completed,
                files_total: total,
                currently_processing_name: None,
            });
        }

        let report = BatchReport {
            records,
            summaries: slots.into_iter().flatten().collect(),
            cancelled: self.cancel.is_cancelled(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Batch completed in {}ms: {} summarized, {} failed, {} not started",
            report.duration_ms,
            report.succeeded(),
            report.failed(),
            report.not_started()
        );

        if report.summaries.is_empty() && !report.cancelled {
            return Err(BatchError::NoSuccessfulFiles { failed: report.failed() });
        }
        Ok(report)
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<(usize, FileInput)>>>,
    context: Arc<WorkerContext>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    loop {
        if cancel.is_cancelled() {
            debug!("Worker {} stopping: cancellation requested", worker_id);
            break;
        }

        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        let Some((index, input)) = next else {
            break;
        };

        if tx.send(WorkerEvent::Started { index }).is_err() {
            break;
        }

        let start = Instant::now();
        let mut metrics = FileMetrics::default();
        let result = summarize_with(&input.name, input.source, &context, &mut metrics, || {
            let _ = tx.send(WorkerEvent::Parsing { index });
        })
        .await;
        metrics.duration_ms = start.elapsed().as_millis() as u64;

        if tx
            .send(WorkerEvent::Finished(FileOutcome { index, result, metrics }))
            .is_err()
        {
            break;
        }
    }
}

async fn summarize_with<F: FnMut()>(
    name: &str,
    source: ContentSource,
    context: &WorkerContext,
    metrics: &mut FileMetrics,
    mut on_parsing: F,
) -> Result<FileSummary, ParseError> {
    let mut reader = source.open().await?;
    let mut parser = RowParser::new(context.parse.clone());
    let mut accumulator = StatsAccumulator::new(context.numeric_policy);
    let mut announced = false;

    let read = read_lines(&mut reader, &context.reader, |line| {
        parser.feed(line, &mut accumulator)?;
        if !announced && parser.header_found() {
            announced = true;
            on_parsing();
        }
        Ok::<(), ParseError>(())
    })
    .await;

    metrics.rows_accepted = parser.counters().rows_accepted;
    metrics.rows_skipped = parser.counters().rows_skipped;
    metrics.invalid_values = accumulator.invalid_values();

    let stats = read?;
    metrics.bytes_read = stats.bytes_read;

    parser.finish()?;
    accumulator.finalize(name)
}

/// Summarize a single source on the current task, outside any batch
pub async fn summarize_source(
    name: &str,
    source: ContentSource,
    config: &SchedulerConfig,
) -> Result<FileSummary, ParseError> {
    let context = WorkerContext {
        parse: config.parse_options(),
        reader: config.reader_config(),
        numeric_policy: config.numeric_policy,
    };
    let mut metrics = FileMetrics::default();
    summarize_with(name, source, &context, &mut metrics, || {}).await
}
