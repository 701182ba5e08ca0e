//! Apply-attempt state machine
//!
//! Pure bookkeeping for one attempt sequence: which profile is being
//! targeted, which phase the attempt is in, and how much of the retry
//! budget is spent. Owned exclusively by the applier task; the async
//! driver around it lives in the parent module.

use crate::config::NetworkProfile;

/// Retries allowed after the initial attempt. The budget check happens
/// before the counter is bumped, so a full sequence is the initial
/// attempt plus up to `MAX_RETRIES` re-attempts: four in total.
pub const MAX_RETRIES: u32 = 3;

/// Phase of the current attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    Idle,
    Applying,
    Verifying,
    RetryPending,
    Succeeded,
    Failed,
}

/// Transient per-target state, reset on every new switch request
#[derive(Debug)]
pub struct ApplyStateMachine {
    phase: ApplyPhase,
    retry_count: u32,
    last_profile: Option<NetworkProfile>,
}

impl ApplyStateMachine {
    pub fn new() -> Self {
        Self {
            phase: ApplyPhase::Idle,
            retry_count: 0,
            last_profile: None,
        }
    }

    pub fn phase(&self) -> ApplyPhase {
        self.phase
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_profile(&self) -> Option<&NetworkProfile> {
        self.last_profile.as_ref()
    }

    /// Begin a fresh attempt sequence for a new target profile.
    pub fn begin(&mut self, profile: NetworkProfile) {
        self.last_profile = Some(profile);
        self.retry_count = 0;
        self.phase = ApplyPhase::Applying;
    }

    /// Re-enter Applying with the previously targeted profile, if any.
    pub fn begin_retry_last(&mut self) -> Option<NetworkProfile> {
        let profile = self.last_profile.clone()?;
        self.retry_count = 0;
        self.phase = ApplyPhase::Applying;
        Some(profile)
    }

    /// The configuration commands exited cleanly; move on to checking
    /// the OS-reported state.
    pub fn command_succeeded(&mut self) {
        self.phase = ApplyPhase::Verifying;
    }

    /// The applied state matched the profile.
    pub fn verified(&mut self) {
        self.phase = ApplyPhase::Succeeded;
    }

    /// Route a failed attempt into the retry budget. Returns the
    /// 1-based retry number to announce when another attempt is
    /// allowed, or None once the budget is exhausted.
    pub fn record_failure(&mut self) -> Option<u32> {
        if self.retry_count < MAX_RETRIES {
            self.retry_count += 1;
            self.phase = ApplyPhase::RetryPending;
            Some(self.retry_count)
        } else {
            self.phase = ApplyPhase::Failed;
            None
        }
    }

    /// The retry delay elapsed without being superseded.
    pub fn resume_retry(&mut self) {
        self.phase = ApplyPhase::Applying;
    }

    /// Terminal failure outside the retry path (unknown SSID).
    pub fn mark_failed(&mut self) {
        self.phase = ApplyPhase::Failed;
    }
}

impl Default for ApplyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> NetworkProfile {
        NetworkProfile::new(
            "公司",
            "192.168.3.112",
            "255.255.255.0",
            "192.168.3.1",
            vec!["202.96.104.15".into()],
        )
    }

    #[test]
    fn test_initial_state() {
        let fsm = ApplyStateMachine::new();
        assert_eq!(fsm.phase(), ApplyPhase::Idle);
        assert_eq!(fsm.retry_count(), 0);
        assert!(fsm.last_profile().is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut fsm = ApplyStateMachine::new();

        fsm.begin(profile());
        assert_eq!(fsm.phase(), ApplyPhase::Applying);

        fsm.command_succeeded();
        assert_eq!(fsm.phase(), ApplyPhase::Verifying);

        fsm.verified();
        assert_eq!(fsm.phase(), ApplyPhase::Succeeded);
        assert_eq!(fsm.retry_count(), 0);
    }

    #[test]
    fn test_retry_budget_allows_four_attempts() {
        let mut fsm = ApplyStateMachine::new();
        fsm.begin(profile());

        // Initial attempt fails, then three retries
        assert_eq!(fsm.record_failure(), Some(1));
        assert_eq!(fsm.phase(), ApplyPhase::RetryPending);
        fsm.resume_retry();

        assert_eq!(fsm.record_failure(), Some(2));
        fsm.resume_retry();

        assert_eq!(fsm.record_failure(), Some(3));
        fsm.resume_retry();

        // Fourth failure exhausts the budget
        assert_eq!(fsm.record_failure(), None);
        assert_eq!(fsm.phase(), ApplyPhase::Failed);
    }

    #[test]
    fn test_begin_resets_retry_count() {
        let mut fsm = ApplyStateMachine::new();
        fsm.begin(profile());
        fsm.record_failure();
        fsm.record_failure();

        fsm.begin(profile());
        assert_eq!(fsm.retry_count(), 0);
        assert_eq!(fsm.phase(), ApplyPhase::Applying);
    }

    #[test]
    fn test_retry_last_without_target() {
        let mut fsm = ApplyStateMachine::new();
        assert!(fsm.begin_retry_last().is_none());
        assert_eq!(fsm.phase(), ApplyPhase::Idle);
    }

    #[test]
    fn test_retry_last_reuses_profile_and_resets_budget() {
        let mut fsm = ApplyStateMachine::new();
        fsm.begin(profile());
        fsm.record_failure();
        fsm.record_failure();
        fsm.record_failure();
        fsm.record_failure();
        assert_eq!(fsm.phase(), ApplyPhase::Failed);

        let p = fsm.begin_retry_last().unwrap();
        assert_eq!(p, profile());
        assert_eq!(fsm.retry_count(), 0);
        assert_eq!(fsm.phase(), ApplyPhase::Applying);
    }
}
