//! Types d'erreurs pour pmocache

use std::path::PathBuf;

/// Erreurs du cache média
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache plein et aucun élément déverrouillé à évincer
    #[error("Media cache is full ({capacity} entries) and no entry can be evicted")]
    CapacityExceeded { capacity: usize },

    /// Fichier déjà absent au moment de la suppression (non fatal)
    #[error("Backing file already missing: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("Invalid manifest entry: {0}")]
    Metadata(#[from] pmometadata::MetadataError),

    #[error("Manifest error: {0}")]
    Store(#[from] pmoutils::StoreError),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type Result spécialisé pour pmocache
pub type Result<T> = std::result::Result<T, CacheError>;
