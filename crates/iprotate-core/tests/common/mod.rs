//! Test doubles and common utilities for rotation contract tests
//!
//! The in-memory provider already counts calls and injects failures; this
//! module adds fixtures and a wrapper that records the exact call sequence.

#![allow(dead_code)]

use iprotate_core::error::Result;
use iprotate_core::traits::{CloudProviderClient, InstanceSnapshot, StaticIpInfo};
use iprotate_core::{
    ConfigStore, InstanceConfig, MemoryCloudProvider, PropagationPolicy, RotationOrchestrator,
    RotationRequestHandler,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INSTANCE: &str = "Ubuntu-1";
pub const STATIC_IP: &str = "StaticIp-1";
pub const DYNAMIC_IP: &str = "198.51.100.10";

/// Polling policy used by the contract tests (runs on a paused clock)
pub fn test_policy() -> PropagationPolicy {
    PropagationPolicy::new(Duration::from_secs(1), 5)
}

/// A provider holding one instance on a dynamic address
pub fn dynamic_instance() -> MemoryCloudProvider {
    MemoryCloudProvider::new().with_instance(INSTANCE, DYNAMIC_IP)
}

/// A provider holding one instance with the configured static IP attached
pub fn static_instance() -> MemoryCloudProvider {
    MemoryCloudProvider::new().with_static_instance(INSTANCE, STATIC_IP)
}

/// Build an orchestrator over any provider
pub fn orchestrator(provider: impl CloudProviderClient + 'static) -> RotationOrchestrator {
    RotationOrchestrator::new(Arc::new(provider), test_policy())
}

/// Build a handler with a single "proxy" entry pointing at INSTANCE/STATIC_IP
pub fn handler(provider: impl CloudProviderClient + 'static) -> RotationRequestHandler {
    let config = ConfigStore::new(vec![InstanceConfig::new("proxy", INSTANCE, STATIC_IP)]);
    RotationRequestHandler::new(Arc::new(config), Arc::new(orchestrator(provider)))
}

/// Wraps a provider and records every call in order
#[derive(Clone)]
pub struct RecordingProvider<P> {
    inner: P,
    log: Arc<Mutex<Vec<String>>>,
}

impl<P: CloudProviderClient> RecordingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Recorded calls, e.g. `["get_instance", "get_static_ip", ...]`
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, call: &str) {
        self.log.lock().unwrap().push(call.to_string());
    }
}

#[async_trait::async_trait]
impl<P: CloudProviderClient> CloudProviderClient for RecordingProvider<P> {
    async fn get_instance(&self, instance_name: &str) -> Result<InstanceSnapshot> {
        self.push("get_instance");
        self.inner.get_instance(instance_name).await
    }

    async fn get_static_ip(&self, name: &str) -> Result<Option<StaticIpInfo>> {
        self.push("get_static_ip");
        self.inner.get_static_ip(name).await
    }

    async fn allocate_static_ip(&self, name: &str) -> Result<()> {
        self.push("allocate_static_ip");
        self.inner.allocate_static_ip(name).await
    }

    async fn attach_static_ip(&self, name: &str, instance_name: &str) -> Result<()> {
        self.push("attach_static_ip");
        self.inner.attach_static_ip(name, instance_name).await
    }

    async fn detach_static_ip(&self, name: &str) -> Result<()> {
        self.push("detach_static_ip");
        self.inner.detach_static_ip(name).await
    }

    async fn release_static_ip(&self, name: &str) -> Result<()> {
        self.push("release_static_ip");
        self.inner.release_static_ip(name).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
