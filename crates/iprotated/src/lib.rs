// # iprotated
//
// HTTP shell around `iprotate-core`.
//
// This crate is a THIN integration layer: environment settings, the axum
// routes and process bootstrap. Rotation logic lives in `iprotate-core`.

pub mod http;
pub mod settings;

pub use http::{AppState, router};
pub use settings::{ProviderKind, Settings};
