//! Types d'erreurs pour pmosession

use pmocache::CacheError;
use pmoplaylist::QueueError;
use pmosource::SourceError;
use pmoutils::StoreError;
use std::path::PathBuf;

/// Erreurs des sessions de groupe
///
/// Chaque variante correspond à un message distinct côté interface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cache plein et aucun élément évinçable
    #[error("Media cache is full ({capacity} entries, all in use)")]
    CapacityExceeded { capacity: usize },

    /// Indice de file invalide
    #[error("Index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// File pleine
    #[error("Queue limit of {limit} tracks reached")]
    LimitExceeded { limit: usize },

    /// Fichier absent et impossible à récupérer
    #[error("Media file missing: {}", .0.display())]
    FileMissing(PathBuf),

    /// Enregistrement persistant illisible ou incohérent
    #[error("Corrupt record '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Volume hors de `[0, 200]`
    #[error("Volume {0} out of range (0-200)")]
    VolumeOutOfRange(i64),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Cache error: {0}")]
    Cache(CacheError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Vrai si l'erreur vient d'une annulation demandée par le groupe
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Source(SourceError::Cancelled))
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::IndexOutOfRange { index, len } => Error::IndexOutOfRange { index, len },
            QueueError::LimitExceeded { limit } => Error::LimitExceeded { limit },
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Corrupt { key, source } => Error::CorruptRecord {
                key,
                reason: source.to_string(),
            },
            other => Error::Store(other),
        }
    }
}

impl From<CacheError> for Error {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::CapacityExceeded { capacity } => Error::CapacityExceeded { capacity },
            CacheError::FileMissing(path) => Error::FileMissing(path),
            CacheError::Store(e) => e.into(),
            other => Error::Cache(other),
        }
    }
}

/// Type Result spécialisé pour pmosession
pub type Result<T> = std::result::Result<T, Error>;
