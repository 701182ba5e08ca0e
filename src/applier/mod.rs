//! Location-triggered network reconfiguration engine
//!
//! One task owns the whole attempt lifecycle: look up the profile for
//! an SSID, apply it through a single elevated invocation, verify the
//! OS-reported state, and drive the bounded retry loop. Requests are
//! serialized onto this task; a request arriving while a retry is
//! pending cancels the scheduled re-attempt and starts a fresh
//! sequence for the new target. In-flight external processes are never
//! killed, only the retry timer is.

mod state;

pub use state::{ApplyPhase, ApplyStateMachine, MAX_RETRIES};

use crate::command::netsetup::NetworkTool;
use crate::command::CommandRunner;
use crate::config::{ConfigStore, NetworkProfile};
use crate::error::ApplyError;
use crate::status::{Status, StatusPublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Delay before a failed attempt is re-run
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum ApplierRequest {
    Switch { ssid: String },
    RetryLast,
}

/// Handle to the applier task. Cheap to clone; all operations are
/// fire-and-forget sends onto the task's queue.
#[derive(Clone)]
pub struct NetworkApplier {
    request_tx: mpsc::UnboundedSender<ApplierRequest>,
}

impl NetworkApplier {
    /// Create the applier and spawn its control task.
    pub fn new(
        store: Arc<RwLock<ConfigStore>>,
        runner: Arc<dyn CommandRunner>,
        tool: NetworkTool,
        publisher: Arc<StatusPublisher>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();

        tokio::spawn(applier_loop(store, runner, tool, publisher, request_rx));

        Self { request_tx }
    }

    /// Switch to the profile stored for `ssid`. Supersedes any attempt
    /// sequence currently waiting on a retry.
    pub fn switch_to(&self, ssid: impl Into<String>) {
        let _ = self.request_tx.send(ApplierRequest::Switch { ssid: ssid.into() });
    }

    /// Re-apply the most recently targeted profile from a clean retry
    /// budget.
    pub fn retry_last(&self) {
        let _ = self.request_tx.send(ApplierRequest::RetryLast);
    }
}

async fn applier_loop(
    store: Arc<RwLock<ConfigStore>>,
    runner: Arc<dyn CommandRunner>,
    tool: NetworkTool,
    publisher: Arc<StatusPublisher>,
    mut request_rx: mpsc::UnboundedReceiver<ApplierRequest>,
) {
    let mut fsm = ApplyStateMachine::new();
    // A request that superseded the previous sequence is handled next
    let mut pending: Option<ApplierRequest> = None;

    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => match request_rx.recv().await {
                Some(request) => request,
                None => break,
            },
        };

        pending = handle_request(
            request,
            &mut fsm,
            &store,
            &runner,
            &tool,
            &publisher,
            &mut request_rx,
        )
        .await;
    }

    debug!("applier request channel closed, stopping");
}

/// Resolve a request to a target profile and run its attempt sequence.
/// Returns the request that superseded the sequence, if any.
async fn handle_request(
    request: ApplierRequest,
    fsm: &mut ApplyStateMachine,
    store: &Arc<RwLock<ConfigStore>>,
    runner: &Arc<dyn CommandRunner>,
    tool: &NetworkTool,
    publisher: &Arc<StatusPublisher>,
    request_rx: &mut mpsc::UnboundedReceiver<ApplierRequest>,
) -> Option<ApplierRequest> {
    let profile = match request {
        ApplierRequest::Switch { ssid } => {
            let profile = store.read().await.get(&ssid).cloned();
            match profile {
                Some(profile) => {
                    info!("switching to \"{}\" profile for SSID {}", profile.location, ssid);
                    publisher.publish_location(profile.location.clone()).await;
                    fsm.begin(profile.clone());
                    profile
                }
                None => {
                    warn!("no profile stored for SSID {}", ssid);
                    publisher.publish_status(Status::NoProfileFound).await;
                    fsm.mark_failed();
                    return None;
                }
            }
        }
        ApplierRequest::RetryLast => match fsm.begin_retry_last() {
            Some(profile) => {
                info!("re-applying \"{}\" profile", profile.location);
                profile
            }
            None => {
                publisher.publish_status(Status::NothingToRetry).await;
                return None;
            }
        },
    };

    run_attempts(&profile, fsm, runner, tool, publisher, request_rx).await
}

/// Drive the bounded retry loop for one target profile.
async fn run_attempts(
    profile: &NetworkProfile,
    fsm: &mut ApplyStateMachine,
    runner: &Arc<dyn CommandRunner>,
    tool: &NetworkTool,
    publisher: &Arc<StatusPublisher>,
    request_rx: &mut mpsc::UnboundedReceiver<ApplierRequest>,
) -> Option<ApplierRequest> {
    loop {
        // Newest request wins, even between attempts
        if let Ok(request) = request_rx.try_recv() {
            debug!("attempt sequence superseded");
            return Some(request);
        }

        publisher.publish_status(Status::Configuring).await;

        match run_attempt(profile, fsm, runner, tool, publisher).await {
            Ok(()) => {
                fsm.verified();
                publisher.publish_status(Status::Verified).await;
                info!("profile \"{}\" applied and verified", profile.location);
                return None;
            }
            Err(err) => {
                warn!("apply attempt failed: {}", err);
                match fsm.record_failure() {
                    Some(attempt) => {
                        publisher
                            .publish_status(Status::Retrying {
                                attempt,
                                max: MAX_RETRIES,
                            })
                            .await;

                        tokio::select! {
                            biased;
                            maybe = request_rx.recv() => {
                                match maybe {
                                    Some(request) => {
                                        debug!("scheduled retry cancelled by a new request");
                                        return Some(request);
                                    }
                                    None => {
                                        // All handles gone; still honor the delay
                                        tokio::time::sleep(RETRY_DELAY).await;
                                        fsm.resume_retry();
                                    }
                                }
                            }
                            _ = tokio::time::sleep(RETRY_DELAY) => {
                                fsm.resume_retry();
                            }
                        }
                    }
                    None => {
                        warn!("retry budget exhausted for \"{}\"", profile.location);
                        publisher.publish_status(Status::Failed).await;
                        return None;
                    }
                }
            }
        }
    }
}

/// One attempt: elevated apply, then read-only verification.
async fn run_attempt(
    profile: &NetworkProfile,
    fsm: &mut ApplyStateMachine,
    runner: &Arc<dyn CommandRunner>,
    tool: &NetworkTool,
    publisher: &Arc<StatusPublisher>,
) -> Result<(), ApplyError> {
    let (program, args) = tool.apply_invocation(profile);
    debug!("applying: {} {}", program, args.join(" "));

    let output = runner
        .run(&program, &args)
        .await
        .map_err(ApplyError::CommandInvocation)?;

    if !output.stdout.is_empty() {
        debug!("apply stdout: {}", output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        debug!("apply stderr: {}", output.stderr.trim_end());
    }

    if !output.success() {
        return Err(ApplyError::CommandExit {
            status: output.status,
            stderr: output.stderr,
        });
    }

    publisher.publish_status(Status::Succeeded).await;
    fsm.command_succeeded();

    verify(profile, runner, tool).await
}

/// Succeeds iff the interface info dump contains the applied IP,
/// subnet mask and gateway.
async fn verify(
    profile: &NetworkProfile,
    runner: &Arc<dyn CommandRunner>,
    tool: &NetworkTool,
) -> Result<(), ApplyError> {
    let (program, args) = tool.verify_invocation();

    let output = runner
        .run(&program, &args)
        .await
        .map_err(ApplyError::CommandInvocation)?;

    if !output.success() {
        return Err(ApplyError::CommandExit {
            status: output.status,
            stderr: output.stderr,
        });
    }

    debug!("current interface state:\n{}", output.stdout.trim_end());

    let matches = output.stdout.contains(&profile.ip)
        && output.stdout.contains(&profile.subnet)
        && output.stdout.contains(&profile.gateway);

    if matches {
        Ok(())
    } else {
        Err(ApplyError::VerificationMismatch)
    }
}
