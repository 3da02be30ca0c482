//! # pmocache - Cache média borné pour PMOBot
//!
//! Cette crate fournit le cache local des fichiers audio téléchargés,
//! partagé par tous les groupes de discussion.
//!
//! ## Vue d'ensemble
//!
//! - Ordre de récence : chaque admission ou `touch` place l'élément en queue
//! - Capacité bornée : à l'admission, l'élément déverrouillé le moins
//!   récemment utilisé est évincé (et son fichier supprimé)
//! - Verrouillage : un élément en cours de lecture n'est jamais évincé
//! - Manifeste JSON : l'ordre et l'appartenance survivent à un redémarrage
//!
//! ## Architecture
//!
//! ```text
//! pmocache
//!     ├── cache.rs       - MediaCache (section critique unique)
//!     ├── error.rs       - CacheError
//!     └── config_ext.rs  - Intégration pmoconfig (feature `pmoconfig`)
//! ```
//!
//! Le cache est la seule autorité pour la suppression des fichiers : les
//! files d'attente ne font que référencer des [`pmometadata::MediaItem`].

pub mod cache;
mod error;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use cache::{MANIFEST_KEY, MediaCache};
pub use error::{CacheError, Result};

#[cfg(feature = "pmoconfig")]
pub use config_ext::MediaCacheConfigExt;
