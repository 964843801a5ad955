//! Request handling for the rotation service
//!
//! [`RotationRequestHandler`] sits between the transport (HTTP in
//! `iprotated`) and the orchestrator. It validates the requested name,
//! resolves it against the [`ConfigStore`], runs the rotation and shapes the
//! outcome. It knows nothing about HTTP beyond the status code each error
//! maps to.

use crate::config::{ConfigStore, InstanceConfig};
use crate::error::Error;
use crate::orchestrator::{RotationFailure, RotationOrchestrator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{error, info};

/// Response record for a successful rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationResult {
    /// Provider-side instance identifier
    pub instance_name: String,
    pub old_ip: String,
    pub new_ip: String,
    pub message: String,
    pub success: bool,
    /// Best-effort failures that did not stop the rotation
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Liveness acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub success: bool,
    pub message: String,
}

impl HealthStatus {
    fn running() -> Self {
        Self {
            success: true,
            message: "Service is running".to_string(),
        }
    }
}

/// Why a rotation request did not succeed
#[derive(Debug, ThisError)]
pub enum RequestError {
    /// No instance name was supplied
    #[error("instance parameter is required")]
    MissingInstance,

    /// The logical name is not configured
    #[error("instance '{0}' not found in config")]
    NotFound(String),

    /// The orchestrator hit a fatal provider error
    #[error("changeIP failed: {failure}")]
    Rotation {
        /// Provider-side instance identifier
        instance_name: String,
        failure: RotationFailure,
    },
}

impl RequestError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::MissingInstance | RequestError::NotFound(_) => 400,
            RequestError::Rotation { .. } => 500,
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Resolves logical names and runs rotations
pub struct RotationRequestHandler {
    config: Arc<ConfigStore>,
    orchestrator: Arc<RotationOrchestrator>,
}

impl RotationRequestHandler {
    /// Create a new handler
    pub fn new(config: Arc<ConfigStore>, orchestrator: Arc<RotationOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Rotate the IP of the instance configured under `instance`
    ///
    /// # Returns
    ///
    /// - `Ok(RotationResult)`: The rotation completed
    /// - `Err(RequestError::MissingInstance)`: `instance` was absent or empty
    /// - `Err(RequestError::NotFound)`: `instance` is not configured
    /// - `Err(RequestError::Rotation)`: A fatal provider call failed
    ///
    /// No provider call is made unless the name resolves.
    pub async fn change_ip(&self, instance: Option<&str>) -> Result<RotationResult, RequestError> {
        // Names match exactly as sent; only absent or empty counts as missing
        let name = match instance {
            Some(name) if !name.is_empty() => name,
            _ => return Err(RequestError::MissingInstance),
        };

        let target = match self.config.find(name) {
            Ok(target) => target,
            Err(Error::NotFound(_)) => return Err(RequestError::NotFound(name.to_string())),
            Err(e) => {
                // ConfigStore::find only reports NotFound
                error!("Unexpected lookup error for {}: {}", name, e);
                return Err(RequestError::NotFound(name.to_string()));
            }
        };

        info!("Changing IP for instance: {}", target.instance_name);

        match self
            .orchestrator
            .rotate(&target.instance_name, &target.static_ip_name)
            .await
        {
            Ok(rotation) => {
                info!(
                    "IP changed successfully - Instance: {}, Old IP: {}, New IP: {}",
                    rotation.instance_name, rotation.old_ip, rotation.new_ip
                );
                Ok(RotationResult {
                    instance_name: rotation.instance_name,
                    old_ip: rotation.old_ip,
                    new_ip: rotation.new_ip,
                    message: "IP changed successfully".to_string(),
                    success: true,
                    warnings: rotation.warnings,
                })
            }
            Err(failure) => {
                error!("changeIP failed: {}", failure);
                Err(RequestError::Rotation {
                    instance_name: target.instance_name.clone(),
                    failure,
                })
            }
        }
    }

    /// All configured instances, verbatim
    pub fn list_instances(&self) -> &[InstanceConfig] {
        self.config.list()
    }

    /// Static liveness acknowledgement; touches nothing
    pub fn health(&self) -> HealthStatus {
        HealthStatus::running()
    }

    /// The configuration this handler resolves against
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PropagationPolicy;
    use crate::provider::MemoryCloudProvider;
    use std::time::Duration;

    fn handler(provider: MemoryCloudProvider) -> RotationRequestHandler {
        let config = ConfigStore::new(vec![InstanceConfig::new("proxy", "vm-1", "ip-1")]);
        let orchestrator = RotationOrchestrator::new(
            Arc::new(provider),
            PropagationPolicy::new(Duration::from_millis(10), 2),
        );
        RotationRequestHandler::new(Arc::new(config), Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn test_empty_name_is_missing() {
        let provider = MemoryCloudProvider::new();
        let handler = handler(provider.clone());

        let err = handler.change_ip(Some("")).await.unwrap_err();
        assert!(matches!(err, RequestError::MissingInstance));
        assert_eq!(err.status_code(), 400);
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_name_is_looked_up_verbatim() {
        let provider = MemoryCloudProvider::new();
        let handler = handler(provider.clone());

        let err = handler.change_ip(Some("  ")).await.unwrap_err();
        assert!(matches!(err, RequestError::NotFound(ref name) if name == "  "));
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_message_carries_name() {
        let handler = handler(MemoryCloudProvider::new());
        let err = handler.change_ip(Some("ghost")).await.unwrap_err();
        assert_eq!(err.to_string(), "instance 'ghost' not found in config");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_health_is_static() {
        let provider = MemoryCloudProvider::new();
        let status = handler(provider.clone()).health();
        assert!(status.success);
        assert_eq!(status.message, "Service is running");
        assert_eq!(provider.total_calls(), 0);
    }
}
