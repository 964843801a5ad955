// # Cloud Provider Trait
//
// Defines the interface for manipulating provider-managed static IPs.
//
// ## Implementations
//
// - Lightsail: `iprotate-provider-lightsail` crate
// - In-memory: `iprotate_core::provider::MemoryCloudProvider`
//
// ## Usage
//
// ```rust,ignore
// use iprotate_core::CloudProviderClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* CloudProviderClient implementation */;
//
//     let snapshot = provider.get_instance("Ubuntu-1").await?;
//     if !snapshot.has_static_ip {
//         provider.allocate_static_ip("StaticIp-1").await?;
//         provider.attach_static_ip("StaticIp-1", "Ubuntu-1").await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Point-in-time view of an instance's addressing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// The public IP address currently reported by the provider
    pub public_ip: String,
    /// Whether a static IP is attached
    pub has_static_ip: bool,
}

impl InstanceSnapshot {
    /// Create a new snapshot
    pub fn new(public_ip: impl Into<String>, has_static_ip: bool) -> Self {
        Self {
            public_ip: public_ip.into(),
            has_static_ip,
        }
    }
}

/// A static IP resource returned by the existence probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpInfo {
    /// Resource name
    pub name: String,
    /// Allocated address, if the provider reports one
    pub ip_address: Option<String>,
    /// Instance the resource is attached to, if any
    pub attached_to: Option<String>,
}

/// Trait for cloud provider implementations
///
/// Implementations wrap a provider API and expose exactly one remote call
/// per method. They must be thread-safe and usable across async tasks.
///
/// ## Responsibilities
///
/// Providers translate calls and errors. They do NOT:
/// - retry failed calls
/// - sleep or wait for propagation
/// - decide whether a failure is fatal
///
/// All of that is owned by [`crate::RotationOrchestrator`]. In particular,
/// `detach_static_ip` and `release_static_ip` report their failures
/// faithfully; it is the orchestrator that treats them as best-effort.
#[async_trait]
pub trait CloudProviderClient: Send + Sync {
    /// Query an instance
    ///
    /// # Returns
    ///
    /// - `Ok(InstanceSnapshot)`: Current public IP and static-IP flag
    /// - `Err(Error)`: If the instance is unknown or the call failed
    async fn get_instance(&self, instance_name: &str) -> Result<InstanceSnapshot, crate::Error>;

    /// Probe for a static IP resource
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))`: The resource exists
    /// - `Ok(None)`: The resource does not exist (not an error)
    /// - `Err(Error)`: The probe itself failed
    async fn get_static_ip(&self, name: &str) -> Result<Option<StaticIpInfo>, crate::Error>;

    /// Allocate a new static IP under `name`
    ///
    /// Fails if the name is already taken or a quota is exceeded.
    async fn allocate_static_ip(&self, name: &str) -> Result<(), crate::Error>;

    /// Attach the static IP `name` to `instance_name`
    async fn attach_static_ip(&self, name: &str, instance_name: &str) -> Result<(), crate::Error>;

    /// Detach the static IP `name` from whatever instance holds it
    async fn detach_static_ip(&self, name: &str) -> Result<(), crate::Error>;

    /// Release the static IP `name` back to the provider
    async fn release_static_ip(&self, name: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "lightsail", "memory")
    fn provider_name(&self) -> &'static str;
}
