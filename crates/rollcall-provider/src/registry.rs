//! Content provider registry
//!
//! Maps source kinds to the adapter instance serving them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::ContentProvider;
use crate::types::SourceKind;

/// Registry of content provider adapters, keyed by source kind.
///
/// The engine resolves the adapter for each discovered event here; an event
/// whose kind has no registered adapter fails with
/// [`ProviderError::UnsupportedKind`], which the audience phase treats like
/// any other per-event provider failure.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<SourceKind, Arc<dyn ContentProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for its source kind, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn ContentProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Resolve the adapter for a source kind.
    pub fn get(&self, kind: SourceKind) -> ProviderResult<Arc<dyn ContentProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::UnsupportedKind {
                kind: kind.to_string(),
            })
    }

    /// The source kinds with a registered adapter.
    #[must_use]
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.providers.keys().copied().collect()
    }
}
