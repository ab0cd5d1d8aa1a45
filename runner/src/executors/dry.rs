use super::SchedulerOutput;
use tracing::info;

/// Executor that never submits, all artifacts are still written
#[derive(Debug, Clone, Copy, Default)]
pub struct DryExecutor;

impl DryExecutor {
    pub fn execute(&self, jdl: &str) -> SchedulerOutput {
        info!(
            lines = jdl.lines().count(),
            "Dry run, not handing the submit description to the scheduler"
        );

        SchedulerOutput::default()
    }
}
