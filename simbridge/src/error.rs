//! Error taxonomy shared across backend adapters.
//!
//! Every error that crosses a provider boundary is one of four classified
//! kinds, tagged with the originating backend. Backend-native error types
//! (socket errors, shared-memory faults) are stringified at the loop boundary
//! and never leak to consumers.

use crate::provider::BackendKind;

/// Diagnostic key/value pairs attached to an error.
pub type ContextBag = Vec<(String, String)>;

/// Classified error raised by a backend adapter.
///
/// `Clone` because errors ride the provider's broadcast event channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Backend unreachable or connection lost.
    #[error("{backend}: connection error: {detail}")]
    Connection {
        backend: BackendKind,
        code: Option<u32>,
        detail: String,
        context: ContextBag,
    },

    /// Malformed or unexpected backend data.
    #[error("{backend}: protocol error: {detail}")]
    Protocol {
        backend: BackendKind,
        code: Option<u32>,
        detail: String,
        context: ContextBag,
    },

    /// Backend refused a command or control input.
    #[error("{backend}: command rejected: {detail}")]
    CommandRejected {
        backend: BackendKind,
        code: Option<u32>,
        detail: String,
        context: ContextBag,
    },

    /// Invalid category, threshold, or field lookup.
    #[error("{backend}: configuration error: {detail}")]
    Configuration {
        backend: BackendKind,
        code: Option<u32>,
        detail: String,
        context: ContextBag,
    },
}

impl ProviderError {
    pub fn connection(backend: BackendKind, detail: impl Into<String>) -> Self {
        Self::Connection {
            backend,
            code: None,
            detail: detail.into(),
            context: Vec::new(),
        }
    }

    pub fn protocol(backend: BackendKind, detail: impl Into<String>) -> Self {
        Self::Protocol {
            backend,
            code: None,
            detail: detail.into(),
            context: Vec::new(),
        }
    }

    pub fn command_rejected(backend: BackendKind, detail: impl Into<String>) -> Self {
        Self::CommandRejected {
            backend,
            code: None,
            detail: detail.into(),
            context: Vec::new(),
        }
    }

    pub fn configuration(backend: BackendKind, detail: impl Into<String>) -> Self {
        Self::Configuration {
            backend,
            code: None,
            detail: detail.into(),
            context: Vec::new(),
        }
    }

    /// Attach a backend-specific classification code.
    pub fn with_code(mut self, new_code: u32) -> Self {
        match &mut self {
            Self::Connection { code, .. }
            | Self::Protocol { code, .. }
            | Self::CommandRejected { code, .. }
            | Self::Configuration { code, .. } => *code = Some(new_code),
        }
        self
    }

    /// Attach a diagnostic key/value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Connection { context, .. }
            | Self::Protocol { context, .. }
            | Self::CommandRejected { context, .. }
            | Self::Configuration { context, .. } => context.push((key.into(), value.into())),
        }
        self
    }

    /// The backend kind that raised this error.
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::Connection { backend, .. }
            | Self::Protocol { backend, .. }
            | Self::CommandRejected { backend, .. }
            | Self::Configuration { backend, .. } => *backend,
        }
    }

    /// Optional backend-specific classification code.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Connection { code, .. }
            | Self::Protocol { code, .. }
            | Self::CommandRejected { code, .. }
            | Self::Configuration { code, .. } => *code,
        }
    }

    /// Diagnostic context attached to this error.
    pub fn context(&self) -> &ContextBag {
        match self {
            Self::Connection { context, .. }
            | Self::Protocol { context, .. }
            | Self::CommandRejected { context, .. }
            | Self::Configuration { context, .. } => context,
        }
    }
}
