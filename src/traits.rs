use crate::model::{CommandOutput, CommandSpec};
use async_trait::async_trait;
use std::fs::File;
use tokio_util::sync::CancellationToken;

/// Seam between the batch executor and the operating system.
///
/// Implementations run one external command to completion, streaming its
/// stdout into the returned [`CommandOutput`]. The call itself never fails:
/// spawn errors, non-zero exits and cancellation are all reported through
/// [`CommandOutcome`](crate::model::CommandOutcome) so that partial output
/// survives every failure mode.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `spec` once, binding `stdin` (if present) to the child's
    /// standard input. Cancelling `cancel` must terminate the child process,
    /// not merely stop reading from it.
    async fn run(
        &self,
        spec: &CommandSpec,
        stdin: Option<File>,
        cancel: &CancellationToken,
    ) -> CommandOutput;
}
