//! Types d'erreurs pour pmoplaylist

/// Erreurs de manipulation d'une file d'attente
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Indice invalide : erreur de l'appelant, qui doit valider avant d'appeler
    #[error("Index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Insertion au-delà de la longueur maximale configurée
    #[error("Queue limit of {limit} tracks reached")]
    LimitExceeded { limit: usize },
}

/// Type Result spécialisé pour pmoplaylist
pub type Result<T> = std::result::Result<T, QueueError>;
