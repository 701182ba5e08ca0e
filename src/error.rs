//! Error kinds for a single apply attempt.
//!
//! Every variant here is retryable: the applier routes all of them into
//! its bounded retry loop and only surfaces the terminal outcome as a
//! status event. Missing profiles and storage problems are handled at
//! their call sites and never become an `ApplyError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The external process could not be started or elevation was
    /// denied at the runner level.
    #[error("command invocation failed: {0}")]
    CommandInvocation(anyhow::Error),

    /// The external command ran but exited non-zero.
    #[error("command exited with status {status}: {stderr}")]
    CommandExit { status: i32, stderr: String },

    /// The interface query succeeded but its output does not contain
    /// the applied address, subnet and gateway.
    #[error("interface state does not match the applied profile")]
    VerificationMismatch,
}
