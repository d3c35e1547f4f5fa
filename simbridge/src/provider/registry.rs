//! Per-backend provider singletons behind an explicit context object.
//!
//! The registry owns at most one [`Provider`] per backend kind, constructed
//! lazily on first access and retained for the process lifetime. It is built
//! once at startup and passed to consumers — there is no hidden global
//! state. A kind that is unavailable on this platform, or for which no link
//! factory was registered, is exposed as absent: a normal checked case, not
//! an error.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, info};

use super::{BackendKind, BackendLink, Provider, SyntheticLink, SyntheticLinkConfig};

/// Constructs the backend link for one kind, invoked at most once.
pub type LinkFactory = Box<dyn Fn() -> Arc<dyn BackendLink> + Send + Sync>;

struct Slot {
    factory: LinkFactory,
    provider: OnceLock<Arc<Provider>>,
}

/// Builder for a [`ProviderRegistry`].
pub struct RegistryBuilder {
    factories: HashMap<BackendKind, LinkFactory>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register the link factory for one backend kind.
    ///
    /// The factory must produce a link whose `kind()` matches; construction
    /// order across kinds is unspecified, so a factory must not depend on
    /// another backend's provider having been built.
    pub fn with_link(
        mut self,
        kind: BackendKind,
        factory: impl Fn() -> Arc<dyn BackendLink> + Send + Sync + 'static,
    ) -> Self {
        self.factories.insert(kind, Box::new(factory));
        self
    }

    /// Convenience: register the synthetic backend.
    pub fn with_synthetic(self, config: SyntheticLinkConfig) -> Self {
        self.with_link(BackendKind::Synthetic, move || {
            Arc::new(SyntheticLink::new(config.clone()))
        })
    }

    pub fn build(self) -> ProviderRegistry {
        let slots = self
            .factories
            .into_iter()
            .map(|(kind, factory)| {
                (
                    kind,
                    Slot {
                        factory,
                        provider: OnceLock::new(),
                    },
                )
            })
            .collect();
        ProviderRegistry { slots }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One provider instance per backend kind for the process lifetime.
pub struct ProviderRegistry {
    slots: HashMap<BackendKind, Slot>,
}

impl ProviderRegistry {
    /// The provider for a backend kind, constructing it on first access.
    ///
    /// Exactly-once even under concurrent first access. Returns `None` for
    /// kinds that are unavailable on this platform or were never registered.
    pub fn get(&self, kind: BackendKind) -> Option<Arc<Provider>> {
        if !kind.is_available() {
            debug!(backend = %kind, "Backend not available on this platform");
            return None;
        }
        let slot = self.slots.get(&kind)?;
        let provider = slot.provider.get_or_init(|| {
            info!(backend = %kind, "Constructing provider");
            let link = (slot.factory)();
            debug_assert_eq!(link.kind(), kind, "link factory kind mismatch");
            Arc::new(Provider::new(link))
        });
        Some(Arc::clone(provider))
    }

    /// Kinds this registry can construct on the current platform, in the
    /// fixed [`BackendKind::ALL`] order.
    pub fn available(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| kind.is_available() && self.slots.contains_key(kind))
            .collect()
    }

    /// Kinds whose provider has already been constructed, in fixed order.
    pub fn constructed(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| {
                self.slots
                    .get(kind)
                    .is_some_and(|slot| slot.provider.get().is_some())
            })
            .collect()
    }

    /// Tear down every constructed provider, in the fixed declaration order
    /// of [`BackendKind::ALL`] so resource release is reproducible.
    pub async fn deinitialize_all(&self, timeout: Duration) {
        for kind in BackendKind::ALL {
            if let Some(provider) = self.slots.get(&kind).and_then(|slot| slot.provider.get()) {
                provider.deinitialize(timeout).await;
            }
        }
    }
}
