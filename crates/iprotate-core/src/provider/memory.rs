// # Memory Cloud Provider
//
// In-memory implementation of CloudProviderClient.
//
// ## Purpose
//
// Models instances and static IP resources closely enough to drive every
// branch of the rotation state machine without a cloud account:
//
// - Instances with a dynamic address, or with a static IP attached
// - Orphaned static IPs (allocated, attached to nothing)
// - Injected failures on any operation
// - Propagation lag: reads that still report the previous address
//
// ## Address Ranges
//
// Static IPs are drawn from 203.0.113.0/24 and dynamic addresses from
// 198.51.100.0/24 (both reserved for documentation).
//
// ## When to Use
//
// - Tests (call counters make provider interaction observable)
// - Local runs of the daemon with IPROTATE_PROVIDER=memory

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use async_trait::async_trait;

use crate::traits::cloud_provider::{CloudProviderClient, InstanceSnapshot, StaticIpInfo};
use crate::Error;

const PROVIDER_NAME: &str = "memory";

/// The six provider operations, used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetInstance,
    GetStaticIp,
    AllocateStaticIp,
    AttachStaticIp,
    DetachStaticIp,
    ReleaseStaticIp,
}

impl Operation {
    /// Every operation, in trait order
    pub const ALL: [Operation; 6] = [
        Operation::GetInstance,
        Operation::GetStaticIp,
        Operation::AllocateStaticIp,
        Operation::AttachStaticIp,
        Operation::DetachStaticIp,
        Operation::ReleaseStaticIp,
    ];

    /// Operation name as it appears in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetInstance => "get_instance",
            Operation::GetStaticIp => "get_static_ip",
            Operation::AllocateStaticIp => "allocate_static_ip",
            Operation::AttachStaticIp => "attach_static_ip",
            Operation::DetachStaticIp => "detach_static_ip",
            Operation::ReleaseStaticIp => "release_static_ip",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct InstanceState {
    public_ip: String,
    static_ip: Option<String>,
    /// Previous address and how many more reads should still see it
    stale: Option<(String, usize)>,
}

#[derive(Debug)]
struct StaticIpState {
    ip_address: String,
    attached_to: Option<String>,
}

#[derive(Debug, Default)]
struct ProviderState {
    instances: HashMap<String, InstanceState>,
    static_ips: HashMap<String, StaticIpState>,
    calls: HashMap<Operation, usize>,
    /// Operation -> number of calls that succeed before failures start
    failures: HashMap<Operation, usize>,
    next_static: u32,
    next_dynamic: u32,
    propagation_lag: usize,
}

impl ProviderState {
    /// Count the call and apply any injected failure
    fn record(&mut self, op: Operation) -> Result<(), Error> {
        let count = self.calls.entry(op).or_insert(0);
        let previous = *count;
        *count += 1;

        match self.failures.get(&op) {
            Some(&successes) if previous >= successes => Err(Error::provider(
                PROVIDER_NAME,
                format!("injected {} failure", op),
            )),
            _ => Ok(()),
        }
    }

    fn next_static_ip(&mut self) -> String {
        self.next_static += 1;
        format!("203.0.113.{}", self.next_static % 254 + 1)
    }

    fn next_dynamic_ip(&mut self) -> String {
        self.next_dynamic += 1;
        format!("198.51.100.{}", self.next_dynamic % 254 + 1)
    }

    fn instance_mut(&mut self, instance_name: &str) -> Result<&mut InstanceState, Error> {
        self.instances.get_mut(instance_name).ok_or_else(|| {
            Error::provider(
                PROVIDER_NAME,
                format!("instance {} does not exist", instance_name),
            )
        })
    }

    fn set_public_ip(&mut self, instance_name: &str, new_ip: String) -> Result<(), Error> {
        let lag = self.propagation_lag;
        let instance = self.instance_mut(instance_name)?;
        if lag > 0 && instance.public_ip != new_ip {
            let previous = std::mem::replace(&mut instance.public_ip, new_ip);
            instance.stale = Some((previous, lag));
        } else {
            instance.public_ip = new_ip;
            instance.stale = None;
        }
        Ok(())
    }
}

/// In-memory cloud provider implementation
///
/// Cloning shares the underlying state, so a test can keep a handle for
/// assertions while the orchestrator owns another.
///
/// # Example
///
/// ```rust
/// use iprotate_core::provider::{MemoryCloudProvider, Operation};
/// use iprotate_core::CloudProviderClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryCloudProvider::new().with_instance("web-1", "198.51.100.7");
///
///     provider.allocate_static_ip("web-ip").await?;
///     provider.attach_static_ip("web-ip", "web-1").await?;
///
///     let snapshot = provider.get_instance("web-1").await?;
///     assert!(snapshot.has_static_ip);
///     assert_eq!(provider.calls(Operation::AllocateStaticIp), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCloudProvider {
    inner: Arc<Mutex<ProviderState>>,
}

impl MemoryCloudProvider {
    /// Create a new provider with no instances
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an instance on a dynamic address
    pub fn with_instance(self, instance_name: impl Into<String>, public_ip: impl Into<String>) -> Self {
        self.state().instances.insert(
            instance_name.into(),
            InstanceState {
                public_ip: public_ip.into(),
                static_ip: None,
                stale: None,
            },
        );
        self
    }

    /// Add an instance that already has `static_ip_name` attached
    pub fn with_static_instance(
        self,
        instance_name: impl Into<String>,
        static_ip_name: impl Into<String>,
    ) -> Self {
        let instance_name = instance_name.into();
        let static_ip_name = static_ip_name.into();
        {
            let mut state = self.state();
            let ip_address = state.next_static_ip();
            state.static_ips.insert(
                static_ip_name.clone(),
                StaticIpState {
                    ip_address: ip_address.clone(),
                    attached_to: Some(instance_name.clone()),
                },
            );
            state.instances.insert(
                instance_name,
                InstanceState {
                    public_ip: ip_address,
                    static_ip: Some(static_ip_name),
                    stale: None,
                },
            );
        }
        self
    }

    /// Add a static IP that is allocated but attached to nothing
    pub fn with_orphaned_static_ip(self, static_ip_name: impl Into<String>) -> Self {
        {
            let mut state = self.state();
            let ip_address = state.next_static_ip();
            state.static_ips.insert(
                static_ip_name.into(),
                StaticIpState {
                    ip_address,
                    attached_to: None,
                },
            );
        }
        self
    }

    /// Make the next `reads` instance reads after an address change report the previous address
    pub fn with_propagation_lag(self, reads: usize) -> Self {
        self.state().propagation_lag = reads;
        self
    }

    /// Fail every call to `op` from now on
    pub fn fail(&self, op: Operation) {
        let mut state = self.state();
        let already = state.calls.get(&op).copied().unwrap_or(0);
        state.failures.insert(op, already);
    }

    /// Let `successes` more calls to `op` succeed, then fail the rest
    pub fn fail_after(&self, op: Operation, successes: usize) {
        let mut state = self.state();
        let already = state.calls.get(&op).copied().unwrap_or(0);
        state.failures.insert(op, already + successes);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls made across all operations
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    /// The true current state of an instance, bypassing lag and counters
    pub fn snapshot(&self, instance_name: &str) -> Option<InstanceSnapshot> {
        self.state()
            .instances
            .get(instance_name)
            .map(|instance| InstanceSnapshot::new(&instance.public_ip, instance.static_ip.is_some()))
    }

    /// The current state of a static IP, bypassing counters
    pub fn static_ip(&self, static_ip_name: &str) -> Option<StaticIpInfo> {
        self.state()
            .static_ips
            .get(static_ip_name)
            .map(|ip| StaticIpInfo {
                name: static_ip_name.to_string(),
                ip_address: Some(ip.ip_address.clone()),
                attached_to: ip.attached_to.clone(),
            })
    }

    /// Number of allocated static IPs
    pub fn static_ip_count(&self) -> usize {
        self.state().static_ips.len()
    }
}

#[async_trait]
impl CloudProviderClient for MemoryCloudProvider {
    async fn get_instance(&self, instance_name: &str) -> Result<InstanceSnapshot, Error> {
        let mut state = self.state();
        state.record(Operation::GetInstance)?;

        let instance = state.instance_mut(instance_name)?;
        let has_static_ip = instance.static_ip.is_some();

        let reported = match instance.stale.take() {
            Some((previous, remaining)) if remaining > 0 => {
                if remaining > 1 {
                    instance.stale = Some((previous.clone(), remaining - 1));
                }
                previous
            }
            _ => instance.public_ip.clone(),
        };

        Ok(InstanceSnapshot::new(reported, has_static_ip))
    }

    async fn get_static_ip(&self, name: &str) -> Result<Option<StaticIpInfo>, Error> {
        let mut state = self.state();
        state.record(Operation::GetStaticIp)?;

        Ok(state.static_ips.get(name).map(|ip| StaticIpInfo {
            name: name.to_string(),
            ip_address: Some(ip.ip_address.clone()),
            attached_to: ip.attached_to.clone(),
        }))
    }

    async fn allocate_static_ip(&self, name: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.record(Operation::AllocateStaticIp)?;

        if state.static_ips.contains_key(name) {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("static IP {} already exists", name),
            ));
        }

        let ip_address = state.next_static_ip();
        state.static_ips.insert(
            name.to_string(),
            StaticIpState {
                ip_address,
                attached_to: None,
            },
        );
        Ok(())
    }

    async fn attach_static_ip(&self, name: &str, instance_name: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.record(Operation::AttachStaticIp)?;

        let (ip_address, attached_to) = match state.static_ips.get(name) {
            Some(ip) => (ip.ip_address.clone(), ip.attached_to.clone()),
            None => {
                return Err(Error::provider(
                    PROVIDER_NAME,
                    format!("static IP {} does not exist", name),
                ));
            }
        };

        if let Some(holder) = attached_to.filter(|holder| holder != instance_name) {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("static IP {} is already attached to {}", name, holder),
            ));
        }

        let instance = state.instance_mut(instance_name)?;
        if let Some(other) = instance.static_ip.as_ref().filter(|other| *other != name) {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("instance {} already has static IP {}", instance_name, other),
            ));
        }
        instance.static_ip = Some(name.to_string());

        state.set_public_ip(instance_name, ip_address)?;
        if let Some(ip) = state.static_ips.get_mut(name) {
            ip.attached_to = Some(instance_name.to_string());
        }
        Ok(())
    }

    async fn detach_static_ip(&self, name: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.record(Operation::DetachStaticIp)?;

        let holder = match state.static_ips.get_mut(name) {
            Some(ip) => ip.attached_to.take(),
            None => {
                return Err(Error::provider(
                    PROVIDER_NAME,
                    format!("static IP {} does not exist", name),
                ));
            }
        };

        let Some(instance_name) = holder else {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("static IP {} is not attached", name),
            ));
        };

        let dynamic_ip = state.next_dynamic_ip();
        state.instance_mut(&instance_name)?.static_ip = None;
        state.set_public_ip(&instance_name, dynamic_ip)
    }

    async fn release_static_ip(&self, name: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.record(Operation::ReleaseStaticIp)?;

        match state.static_ips.get(name) {
            None => Err(Error::provider(
                PROVIDER_NAME,
                format!("static IP {} does not exist", name),
            )),
            Some(ip) if ip.attached_to.is_some() => Err(Error::provider(
                PROVIDER_NAME,
                format!("static IP {} is still attached", name),
            )),
            Some(_) => {
                state.static_ips.remove(name);
                Ok(())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
