//! Sélection du backend par type de source

use crate::backend::{RetrievalBackend, SourceMetadata};
use crate::error::{Result, SourceError};
use crate::reference::SourceRef;
use pmometadata::{MediaItem, SourceKind};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Registre des backends, un par [`SourceKind`]
///
/// Construit une fois au démarrage puis partagé en lecture seule.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    backends: HashMap<SourceKind, Arc<dyn RetrievalBackend>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un backend ; retourne celui qu'il remplace
    pub fn register(
        &mut self,
        backend: Arc<dyn RetrievalBackend>,
    ) -> Option<Arc<dyn RetrievalBackend>> {
        let kind = backend.kind();
        tracing::debug!("Registering retrieval backend for {}", kind);
        self.backends.insert(kind, backend)
    }

    /// Variante chaînable de [`SourceRegistry::register`]
    pub fn with_backend(mut self, backend: Arc<dyn RetrievalBackend>) -> Self {
        self.register(backend);
        self
    }

    /// Types de source disposant d'un backend
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.backends.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Backend associé à un type de source
    pub fn get(&self, kind: SourceKind) -> Result<Arc<dyn RetrievalBackend>> {
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| SourceError::Unrecognized(format!("no backend for {}", kind)))
    }

    /// Transforme une saisie utilisateur en référence
    ///
    /// Accepte la forme préfixée `{kind}:{id}` ou une URL reconnue par l'un
    /// des backends enregistrés.
    pub fn resolve(&self, input: &str) -> Result<SourceRef> {
        if let Ok(source) = input.parse::<SourceRef>() {
            if self.backends.contains_key(&source.kind) {
                return Ok(source);
            }
        }

        for kind in SourceKind::ALL {
            if let Some(backend) = self.backends.get(&kind) {
                if let Some(id) = backend.recognize(input) {
                    return Ok(SourceRef::new(kind, id));
                }
            }
        }

        Err(SourceError::Unrecognized(input.to_string()))
    }

    pub async fn fetch_metadata(&self, source: &SourceRef) -> Result<SourceMetadata> {
        self.get(source.kind)?.fetch_metadata(source).await
    }

    pub async fn download(
        &self,
        source: &SourceRef,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaItem> {
        self.get(source.kind)?
            .download(source, dest_dir, cancel)
            .await
    }
}
