// src/engine/sequential.rs

use tracing::{info, warn};

use crate::errors::{CozyError, Result};
use crate::exec::{RunReport, Supervised};

use super::registry::CommandRegistry;

/// Run `commands` one after another, each to completion.
///
/// Every name is resolved before the first command runs. The first failing
/// command aborts the rest and is reported as [`CozyError::StepFailed`]. No
/// retries.
pub async fn run_sequence<S, N>(
    registry: &CommandRegistry<S>,
    commands: &[N],
) -> Result<Vec<RunReport>>
where
    S: Supervised,
    N: AsRef<str>,
{
    let steps = registry.resolve(commands)?;
    let total = steps.len();
    let mut reports = Vec::with_capacity(total);

    for (idx, supervisor) in steps.iter().enumerate() {
        let step = idx + 1;
        info!(command = %supervisor.name(), step, total, "running workflow step");

        match supervisor.run_to_completion().await {
            Ok(report) => {
                info!(command = %supervisor.name(), step, total, "workflow step succeeded");
                reports.push(report);
            }
            Err(err) => {
                warn!(
                    command = %supervisor.name(),
                    step,
                    total,
                    error = %err,
                    "workflow step failed"
                );
                return Err(CozyError::StepFailed {
                    command: supervisor.name().to_string(),
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(reports)
}
