//! Core traits for the rotation service
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`CloudProviderClient`]: Static-IP operations against a cloud provider

pub mod cloud_provider;

pub use cloud_provider::{CloudProviderClient, InstanceSnapshot, StaticIpInfo};
