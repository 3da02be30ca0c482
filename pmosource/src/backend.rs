//! Le trait `RetrievalBackend`

use crate::error::Result;
use crate::reference::SourceRef;
use pmometadata::{MediaItem, SourceKind};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Métadonnées d'un média distant, avant téléchargement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    pub title: String,
    pub source_id: String,
    pub duration_secs: u64,
    /// Nombre de morceaux pour une collection (album, liste)
    pub item_count: Option<u32>,
}

impl SourceMetadata {
    /// Construit le [`MediaItem`] d'un téléchargement terminé
    pub fn into_media_item(self, kind: SourceKind, path: impl Into<PathBuf>) -> MediaItem {
        MediaItem::new(self.title, kind, self.source_id, path, self.duration_secs)
    }
}

/// Service distant capable de décrire et télécharger un média
///
/// Une implémentation par [`SourceKind`]. La sélection se fait une fois, par
/// le [`crate::SourceRegistry`], à partir du type de la référence.
///
/// # Exemple d'implémentation
///
/// ```rust,ignore
/// #[async_trait::async_trait]
/// impl RetrievalBackend for MyService {
///     fn kind(&self) -> SourceKind { SourceKind::ServiceA }
///
///     fn recognize(&self, input: &str) -> Option<String> {
///         input.strip_prefix("https://my.service/t/").map(String::from)
///     }
///
///     async fn fetch_metadata(&self, source: &SourceRef) -> Result<SourceMetadata> { ... }
///
///     async fn download(
///         &self,
///         source: &SourceRef,
///         dest_dir: &Path,
///         cancel: &CancellationToken,
///     ) -> Result<MediaItem> { ... }
/// }
/// ```
#[async_trait::async_trait]
pub trait RetrievalBackend: Debug + Send + Sync {
    /// Service servi par ce backend
    fn kind(&self) -> SourceKind;

    /// Extrait l'identifiant d'une URL de ce service, s'il la reconnaît
    fn recognize(&self, input: &str) -> Option<String>;

    /// Récupère titre, durée et identifiant canonique
    async fn fetch_metadata(&self, source: &SourceRef) -> Result<SourceMetadata>;

    /// Télécharge le média dans `dest_dir`
    ///
    /// Le fichier n'apparaît sous son nom final qu'une fois le corps reçu en
    /// entier ; en cas d'erreur ou d'annulation, aucun fichier partiel ne
    /// subsiste.
    async fn download(
        &self,
        source: &SourceRef,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaItem>;
}
