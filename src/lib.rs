pub mod aggregate;
pub mod columns;
pub mod discovery;
pub mod export;
pub mod group_key;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod run_stats;
pub mod scheduler;
pub mod stats;

// Re-export the data model and the batch entry points
pub use aggregate::{aggregate_groups, GroupSummary};
pub use columns::{ColumnId, ColumnIndex};
pub use group_key::group_key;
pub use parser::{ParseError, ParseOptions};
pub use pipeline::{process_batch, PipelineOutput};
pub use progress::{EveryUpdate, IntervalThrottle, ProgressThrottle, ProgressUpdate};
pub use reader::ContentSource;
pub use scheduler::{
    summarize_source, BatchError, BatchReport, CancellationToken, FileInput, FileState,
    Scheduler, SchedulerConfig,
};
pub use stats::{round_to_half, ColumnStats, FileSummary, NumericPolicy, StatsAccumulator};
