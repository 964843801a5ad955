// # iprotate-core
//
// Core library for rotating the public IP address of cloud instances
// through provider-managed static IP resources.
//
// ## Architecture Overview
//
// - **CloudProviderClient**: Trait over the six static-IP provider operations
// - **ConfigStore**: Read-only table of rotatable instances
// - **RotationOrchestrator**: The detach/release/allocate/attach/observe state machine
// - **InstanceLocks**: Per-instance mutual exclusion for overlapping rotations
// - **RotationRequestHandler**: Name lookup, orchestration and response shaping
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Rotation logic is separate from provider SDKs
// 2. **Injected State**: Provider, config and locks are explicit values, never globals
// 3. **Single-Shot Providers**: Each provider call is attempted exactly once
// 4. **Library-First**: The daemon is a thin HTTP shell over this crate

pub mod traits;
pub mod orchestrator;
pub mod locks;
pub mod config;
pub mod error;
pub mod provider;
pub mod handler;

// Re-export core types for convenience
pub use traits::{CloudProviderClient, InstanceSnapshot, StaticIpInfo};
pub use orchestrator::{
    PropagationPolicy, Rotation, RotationBranch, RotationFailure, RotationOrchestrator,
    RotationState, UNKNOWN_IP,
};
pub use locks::InstanceLocks;
pub use config::{ConfigStore, InstanceConfig};
pub use error::{Error, Result};
pub use provider::{MemoryCloudProvider, Operation};
pub use handler::{HealthStatus, RequestError, RotationRequestHandler, RotationResult};
