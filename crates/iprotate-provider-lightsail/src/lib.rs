// # Lightsail Static-IP Provider
//
// This crate provides the AWS Lightsail implementation of
// `iprotate_core::CloudProviderClient`.
//
// ## Behavior
//
// - One Lightsail API call per trait method
// - Errors are rendered with their full SDK context and returned as
//   `Error::Provider { provider: "lightsail", .. }`
// - `get_static_ip` maps `NotFoundException` to `Ok(None)`
// - NO retry logic, NO waiting, NO rollback (owned by RotationOrchestrator)
//
// ## Credentials
//
// Credentials and region come from the standard AWS chain
// (`AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, profiles, instance roles)
// through `aws-config`. They are never logged.
//
// ## API Reference
//
// - GetInstance, GetStaticIp, AllocateStaticIp, AttachStaticIp,
//   DetachStaticIp, ReleaseStaticIp

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_lightsail::error::{DisplayErrorContext, SdkError};
use aws_sdk_lightsail::types::{Instance, StaticIp};
use aws_sdk_lightsail::Client;
use aws_types::region::Region;
use iprotate_core::traits::{CloudProviderClient, InstanceSnapshot, StaticIpInfo};
use iprotate_core::{Error, Result};
use tracing::debug;

/// Provider name used in logs and errors
pub const PROVIDER_NAME: &str = "lightsail";

/// Lightsail static-IP provider
///
/// Cheap to clone; clones share the underlying SDK client.
#[derive(Debug, Clone)]
pub struct LightsailProvider {
    client: Client,
}

impl LightsailProvider {
    /// Wrap an existing SDK client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a provider for `region` from the default AWS credential chain
    pub async fn from_region(region: impl Into<String>) -> Self {
        let region = region.into();
        debug!("Creating Lightsail client for region: {}", region);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        Self::new(Client::new(&config))
    }
}

/// Render an SDK error into a provider error
fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    Error::provider(
        PROVIDER_NAME,
        format!("{} failed: {}", operation, DisplayErrorContext(&err)),
    )
}

/// Map a Lightsail instance into a snapshot
///
/// A missing instance or public address is an error: the rotation cannot
/// report an old IP it never saw.
fn snapshot_from(instance_name: &str, instance: Option<&Instance>) -> Result<InstanceSnapshot> {
    let instance = instance.ok_or_else(|| {
        Error::provider(
            PROVIDER_NAME,
            format!("GetInstance returned no instance for {}", instance_name),
        )
    })?;

    let public_ip = instance.public_ip_address().ok_or_else(|| {
        Error::provider(
            PROVIDER_NAME,
            format!("instance {} has no public IP address", instance_name),
        )
    })?;

    Ok(InstanceSnapshot::new(
        public_ip,
        instance.is_static_ip().unwrap_or(false),
    ))
}

/// Map a Lightsail static IP into the probe result
fn static_ip_from(name: &str, static_ip: &StaticIp) -> StaticIpInfo {
    let attached_to = match (static_ip.attached_to(), static_ip.is_attached()) {
        (Some(holder), _) => Some(holder.to_string()),
        (None, Some(true)) => Some("unknown".to_string()),
        (None, _) => None,
    };

    StaticIpInfo {
        name: static_ip.name().unwrap_or(name).to_string(),
        ip_address: static_ip.ip_address().map(str::to_string),
        attached_to,
    }
}

#[async_trait]
impl CloudProviderClient for LightsailProvider {
    async fn get_instance(&self, instance_name: &str) -> Result<InstanceSnapshot> {
        let output = self
            .client
            .get_instance()
            .instance_name(instance_name)
            .send()
            .await
            .map_err(|e| sdk_error("GetInstance", e))?;

        snapshot_from(instance_name, output.instance())
    }

    async fn get_static_ip(&self, name: &str) -> Result<Option<StaticIpInfo>> {
        match self.client.get_static_ip().static_ip_name(name).send().await {
            Ok(output) => Ok(output.static_ip().map(|ip| static_ip_from(name, ip))),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_not_found_exception()) =>
            {
                debug!("Static IP {} not found", name);
                Ok(None)
            }
            Err(e) => Err(sdk_error("GetStaticIp", e)),
        }
    }

    async fn allocate_static_ip(&self, name: &str) -> Result<()> {
        self.client
            .allocate_static_ip()
            .static_ip_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("AllocateStaticIp", e))?;
        Ok(())
    }

    async fn attach_static_ip(&self, name: &str, instance_name: &str) -> Result<()> {
        self.client
            .attach_static_ip()
            .static_ip_name(name)
            .instance_name(instance_name)
            .send()
            .await
            .map_err(|e| sdk_error("AttachStaticIp", e))?;
        Ok(())
    }

    async fn detach_static_ip(&self, name: &str) -> Result<()> {
        self.client
            .detach_static_ip()
            .static_ip_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("DetachStaticIp", e))?;
        Ok(())
    }

    async fn release_static_ip(&self, name: &str) -> Result<()> {
        self.client
            .release_static_ip()
            .static_ip_name(name)
            .send()
            .await
            .map_err(|e| sdk_error("ReleaseStaticIp", e))?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_maps_address_and_flag() {
        let instance = Instance::builder()
            .public_ip_address("3.4.5.6")
            .is_static_ip(true)
            .build();

        let snapshot = snapshot_from("vm", Some(&instance)).unwrap();
        assert_eq!(snapshot, InstanceSnapshot::new("3.4.5.6", true));
    }

    #[test]
    fn test_snapshot_defaults_static_flag_to_false() {
        let instance = Instance::builder().public_ip_address("3.4.5.6").build();
        assert!(!snapshot_from("vm", Some(&instance)).unwrap().has_static_ip);
    }

    #[test]
    fn test_snapshot_without_public_ip_is_error() {
        let instance = Instance::builder().is_static_ip(false).build();
        let err = snapshot_from("vm", Some(&instance)).unwrap_err();
        assert!(err.to_string().contains("no public IP"));
    }

    #[test]
    fn test_snapshot_without_instance_is_error() {
        assert!(snapshot_from("vm", None).unwrap_err().is_provider());
    }

    #[test]
    fn test_static_ip_attachment_mapping() {
        let attached = StaticIp::builder()
            .name("ip")
            .ip_address("7.7.7.7")
            .attached_to("vm")
            .is_attached(true)
            .build();
        let info = static_ip_from("ip", &attached);
        assert_eq!(info.attached_to.as_deref(), Some("vm"));
        assert_eq!(info.ip_address.as_deref(), Some("7.7.7.7"));

        let orphan = StaticIp::builder().ip_address("7.7.7.8").is_attached(false).build();
        let info = static_ip_from("ip", &orphan);
        assert_eq!(info.name, "ip");
        assert_eq!(info.attached_to, None);
    }
}
