//! Static-IP rotation state machine
//!
//! The RotationOrchestrator is responsible for:
//! - Inspecting the instance and capturing its current address
//! - Freeing any static IP bound to the instance or orphaned under the configured name
//! - Allocating and attaching a fresh static IP
//! - Waiting for the provider to report the new address
//!
//! ## States
//!
//! ```text
//!                 ┌────────────┐  has static IP  ┌────────────┐
//! Start ──► Inspect ──────────────────────────────► DetachOnly │──────────────┐
//!                 └────────────┘                  └────────────┘              │
//!                       │ no static IP                                        │
//!                       ▼                                                     ▼
//!                 ┌────────────┐   ┌─────────────┐   ┌───────────┐   ┌────────────────┐
//!                 │ EnsureFree │──►│ AllocateNew │──►│ AttachNew │──►│ WaitAndObserve │──► Done
//!                 └────────────┘   └─────────────┘   └───────────┘   └────────────────┘
//!                                         │                │
//!                                         └───────┬────────┘
//!                                                 ▼
//!                                              Failed
//! ```
//!
//! ## Error Policy
//!
//! - Inspect, AllocateNew and AttachNew failures are fatal. The caller gets
//!   a [`RotationFailure`] holding whatever addresses were known so far.
//!   Nothing is rolled back.
//! - Detach, release and the orphan probe are best-effort. Their failures
//!   are logged and collected as warnings; the rotation continues.
//! - Observation failures after a successful attach leave `new_ip` empty.
//!
//! Every provider call is attempted once. The propagation wait re-reads the
//! instance; it never repeats a mutating call.

use crate::error::Error;
use crate::locks::InstanceLocks;
use crate::traits::CloudProviderClient;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reported as `old_ip` when the instance could not be inspected
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// States of a single rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationState {
    Start,
    Inspect,
    DetachOnly,
    EnsureFree,
    AllocateNew,
    AttachNew,
    WaitAndObserve,
    Done,
    Failed,
}

impl RotationState {
    /// Prefix used when a fatal failure happens in this state
    pub fn failure_context(&self) -> &'static str {
        match self {
            RotationState::Inspect => "failed to get instance",
            RotationState::AllocateNew => "failed to allocate static ip",
            RotationState::AttachNew => "failed to attach static ip",
            _ => "rotation failed",
        }
    }
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationState::Start => "start",
            RotationState::Inspect => "inspect",
            RotationState::DetachOnly => "detach_only",
            RotationState::EnsureFree => "ensure_free",
            RotationState::AllocateNew => "allocate_new",
            RotationState::AttachNew => "attach_new",
            RotationState::WaitAndObserve => "wait_and_observe",
            RotationState::Done => "done",
            RotationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which path a successful rotation took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationBranch {
    /// The instance had a static IP; it was detached and released, nothing allocated
    DetachOnly,
    /// The instance had no static IP; a new one was allocated and attached
    EnsureFree,
}

/// How long to wait for the provider to report a changed address
///
/// Each attempt sleeps `interval` and re-reads the instance. Polling stops
/// at the first address that differs from the pre-rotation one, or after
/// `max_attempts` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPolicy {
    pub interval: Duration,
    pub max_attempts: usize,
}

impl PropagationPolicy {
    /// Create a policy; `max_attempts` is clamped to at least one read
    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// A single read after a fixed delay
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, 1)
    }

    /// Upper bound on the time spent waiting, saturating at `Duration::MAX`
    pub fn max_wait(&self) -> Duration {
        let attempts = u32::try_from(self.max_attempts).unwrap_or(u32::MAX);
        self.interval.saturating_mul(attempts)
    }
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5)
    }
}

/// Outcome of a successful rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    pub instance_name: String,
    pub old_ip: String,
    /// Empty if the instance could not be observed after the change
    pub new_ip: String,
    pub branch: RotationBranch,
    /// Best-effort failures that did not stop the rotation
    pub warnings: Vec<String>,
}

/// Outcome of a rotation that hit a fatal provider error
#[derive(Debug, thiserror::Error)]
#[error("{}: {}", .failed_at.failure_context(), .source)]
pub struct RotationFailure {
    pub instance_name: String,
    /// The state whose provider call failed
    pub failed_at: RotationState,
    pub old_ip: String,
    pub new_ip: String,
    pub warnings: Vec<String>,
    #[source]
    pub source: Error,
}

/// Mutable bookkeeping for one rotation
struct RotationRun<'a> {
    instance_name: &'a str,
    state: RotationState,
    old_ip: String,
    new_ip: String,
    warnings: Vec<String>,
}

impl<'a> RotationRun<'a> {
    fn new(instance_name: &'a str) -> Self {
        Self {
            instance_name,
            state: RotationState::Start,
            old_ip: UNKNOWN_IP.to_string(),
            new_ip: String::new(),
            warnings: Vec::new(),
        }
    }

    fn transition(&mut self, next: RotationState) {
        debug!("Rotation of {}: {} -> {}", self.instance_name, self.state, next);
        self.state = next;
    }

    fn warn(&mut self, message: String) {
        warn!("Rotation of {}: {}", self.instance_name, message);
        self.warnings.push(message);
    }

    fn fail(self, source: Error) -> RotationFailure {
        debug!("Rotation of {}: {} -> {}", self.instance_name, self.state, RotationState::Failed);
        RotationFailure {
            instance_name: self.instance_name.to_string(),
            failed_at: self.state,
            old_ip: self.old_ip,
            new_ip: self.new_ip,
            warnings: self.warnings,
            source,
        }
    }

    fn finish(mut self, branch: RotationBranch) -> Rotation {
        self.transition(RotationState::Done);
        Rotation {
            instance_name: self.instance_name.to_string(),
            old_ip: self.old_ip,
            new_ip: self.new_ip,
            branch,
            warnings: self.warnings,
        }
    }
}

/// Drives a [`CloudProviderClient`] through the rotation recipe
///
/// ## Concurrency
///
/// Rotations of the same instance are serialized through [`InstanceLocks`];
/// a second request waits until the first one finishes. Rotations of
/// different instances run in parallel.
pub struct RotationOrchestrator {
    provider: Arc<dyn CloudProviderClient>,
    policy: PropagationPolicy,
    locks: InstanceLocks,
}

impl RotationOrchestrator {
    /// Create a new orchestrator with its own lock registry
    pub fn new(provider: Arc<dyn CloudProviderClient>, policy: PropagationPolicy) -> Self {
        Self {
            provider,
            policy,
            locks: InstanceLocks::new(),
        }
    }

    /// Share a lock registry with other orchestrators
    pub fn with_locks(mut self, locks: InstanceLocks) -> Self {
        self.locks = locks;
        self
    }

    /// The propagation policy in use
    pub fn policy(&self) -> PropagationPolicy {
        self.policy
    }

    /// The lock registry in use
    pub fn locks(&self) -> &InstanceLocks {
        &self.locks
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Rotate the public IP of `instance_name` using `static_ip_name`
    ///
    /// # Returns
    ///
    /// - `Ok(Rotation)`: The rotation completed; `new_ip` is the address observed afterwards
    /// - `Err(RotationFailure)`: Inspect, allocate or attach failed
    pub async fn rotate(
        &self,
        instance_name: &str,
        static_ip_name: &str,
    ) -> Result<Rotation, RotationFailure> {
        let _guard = match self.locks.try_acquire(instance_name) {
            Some(guard) => guard,
            None => {
                info!("Rotation of {} already in progress, waiting", instance_name);
                self.locks.acquire(instance_name).await
            }
        };

        let mut run = RotationRun::new(instance_name);

        run.transition(RotationState::Inspect);
        let snapshot = match self.provider.get_instance(instance_name).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(run.fail(e)),
        };
        run.old_ip = snapshot.public_ip;

        if snapshot.has_static_ip {
            run.transition(RotationState::DetachOnly);
            self.free_static_ip(&mut run, static_ip_name).await;

            run.transition(RotationState::WaitAndObserve);
            self.observe(&mut run).await;

            info!(
                "Detached and released old static IP. Old IP: {}, New IP: {}",
                run.old_ip, run.new_ip
            );
            return Ok(run.finish(RotationBranch::DetachOnly));
        }

        run.transition(RotationState::EnsureFree);
        match self.provider.get_static_ip(static_ip_name).await {
            Ok(Some(existing)) => {
                info!(
                    "Static IP {} already exists ({}), freeing it",
                    static_ip_name,
                    existing.ip_address.as_deref().unwrap_or("no address")
                );
                self.free_static_ip(&mut run, static_ip_name).await;
            }
            Ok(None) => {
                debug!("Static IP {} does not exist, nothing to free", static_ip_name);
            }
            Err(e) => {
                run.warn(format!("get_static_ip {} failed: {}", static_ip_name, e));
            }
        }

        run.transition(RotationState::AllocateNew);
        if let Err(e) = self.provider.allocate_static_ip(static_ip_name).await {
            return Err(run.fail(e));
        }
        info!("Allocated new static IP: {}", static_ip_name);

        run.transition(RotationState::AttachNew);
        if let Err(e) = self
            .provider
            .attach_static_ip(static_ip_name, instance_name)
            .await
        {
            return Err(run.fail(e));
        }
        info!("Attached static IP {} to instance {}", static_ip_name, instance_name);

        run.transition(RotationState::WaitAndObserve);
        self.observe(&mut run).await;

        Ok(run.finish(RotationBranch::EnsureFree))
    }

    /// Best-effort detach followed by best-effort release
    async fn free_static_ip(&self, run: &mut RotationRun<'_>, static_ip_name: &str) {
        if let Err(e) = self.provider.detach_static_ip(static_ip_name).await {
            run.warn(format!("detach_static_ip {} failed: {}", static_ip_name, e));
        }
        match self.provider.release_static_ip(static_ip_name).await {
            Ok(()) => info!("Released static IP: {}", static_ip_name),
            Err(e) => run.warn(format!("release_static_ip {} failed: {}", static_ip_name, e)),
        }
    }

    /// Poll the instance until its address moves away from `old_ip`
    ///
    /// Leaves `new_ip` at the last successfully observed address, or empty
    /// if no read succeeded.
    async fn observe(&self, run: &mut RotationRun<'_>) {
        let mut observed: Option<String> = None;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;

            match self.provider.get_instance(run.instance_name).await {
                Ok(snapshot) => {
                    let changed = snapshot.public_ip != run.old_ip;
                    observed = Some(snapshot.public_ip);
                    if changed {
                        debug!(
                            "Address of {} changed after {} read(s)",
                            run.instance_name, attempt
                        );
                        break;
                    }
                }
                Err(e) => {
                    debug!(
                        "Observation {} of {} failed: {}",
                        attempt, run.instance_name, e
                    );
                    last_error = Some(e);
                }
            }
        }

        match observed {
            Some(ip) => {
                if ip == run.old_ip {
                    debug!(
                        "Address of {} unchanged after {:?}",
                        run.instance_name,
                        self.policy.max_wait()
                    );
                }
                run.new_ip = ip;
            }
            None => {
                let cause = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no observation".to_string());
                run.warn(format!("could not observe new address: {}", cause));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_names_the_step() {
        let failure = RotationFailure {
            instance_name: "vm".to_string(),
            failed_at: RotationState::AllocateNew,
            old_ip: "198.51.100.1".to_string(),
            new_ip: String::new(),
            warnings: Vec::new(),
            source: Error::provider("memory", "quota"),
        };
        assert_eq!(
            failure.to_string(),
            "failed to allocate static ip: Provider error (memory): quota"
        );
    }

    #[test]
    fn test_policy_clamps_attempts() {
        let policy = PropagationPolicy::new(Duration::from_millis(200), 0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(PropagationPolicy::default().max_wait(), Duration::from_secs(5));
        assert_eq!(PropagationPolicy::fixed(Duration::from_secs(5)).max_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_max_wait_saturates() {
        let policy = PropagationPolicy::new(Duration::from_secs(1), usize::MAX);
        assert_eq!(policy.max_wait(), Duration::from_secs(u64::from(u32::MAX)));

        let policy = PropagationPolicy::new(Duration::MAX, 2);
        assert_eq!(policy.max_wait(), Duration::MAX);
    }

    #[test]
    fn test_state_display_is_snake_case() {
        assert_eq!(RotationState::WaitAndObserve.to_string(), "wait_and_observe");
        assert_eq!(
            serde_json::to_value(RotationState::DetachOnly).unwrap(),
            serde_json::json!("detach_only")
        );
    }
}
