use crate::aggregate::{aggregate_groups, GroupSummary};
use crate::scheduler::{BatchError, BatchReport, FileInput, Scheduler};
use crate::stats::FileSummary;
use tracing::info;

/// The two output tables plus the batch report behind them
#[derive(Debug)]
pub struct PipelineOutput {
    /// Per-file summaries in input order
    pub files: Vec<FileSummary>,
    /// Power curve sorted by wind speed ascending
    pub groups: Vec<GroupSummary>,
    /// Per-file records; its `summaries` have been moved into `files`
    pub report: BatchReport,
}

/// Run a batch through the scheduler and aggregate whatever succeeded
///
/// When the scheduler was cancelled, the groups cover only the files that finished.
pub async fn process_batch(
    scheduler: &Scheduler,
    inputs: Vec<FileInput>,
) -> Result<PipelineOutput, BatchError> {
    let mut report = scheduler.run(inputs).await?;
    let files = std::mem::take(&mut report.summaries);
    let groups = aggregate_groups(&files);

    info!(
        "Pipeline produced {} file summaries in {} groups",
        files.len(),
        groups.len()
    );

    Ok(PipelineOutput { files, groups, report })
}
