//! Simbridge - normalized flight simulator telemetry.
//!
//! This library connects to whichever simulator backends are present on the
//! machine and normalizes their telemetry into one snapshot model, so
//! consuming panels and displays never deal with backend wire formats.
//!
//! # High-Level API
//!
//! Build a [`provider::ProviderRegistry`] for the backends you want, wrap it
//! in a [`host::EventHost`], and attach a [`host::TelemetryConsumer`]:
//!
//! ```ignore
//! use simbridge::host::{EventHost, TelemetryConsumer};
//! use simbridge::provider::{BackendKind, RegistryBuilder, SyntheticLinkConfig};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(
//!     RegistryBuilder::new()
//!         .with_synthetic(SyntheticLinkConfig::default())
//!         .build(),
//! );
//! registry.get(BackendKind::Synthetic).unwrap().initialize();
//!
//! let host = EventHost::new(registry);
//! let handle = host.attach("panel", Arc::new(MyPanel));
//! ```

pub mod config;
pub mod error;
pub mod facility;
pub mod host;
pub mod logging;
pub mod metadata;
pub mod provider;
pub mod runner;
pub mod snapshot;
pub mod xref;

/// Version of the simbridge library and CLI.
///
/// Synchronized across all components in the workspace; defined in
/// `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
