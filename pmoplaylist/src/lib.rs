//! # pmoplaylist - Files de lecture des groupes
//!
//! Cette crate fournit [`Queue`], la file ordonnée de morceaux d'un groupe :
//! - Durée totale maintenue à chaque mutation
//! - Longueur maximale optionnelle (insertion refusée, jamais tronquée)
//! - Déplacement, échange, mélange et retrait en masse
//! - Détection des doublons (plusieurs entrées sur le même fichier)
//!
//! La file ne fait aucune entrée/sortie : les méthodes de retrait retournent
//! les éléments dont c'était la dernière référence, et l'appelant décide de
//! les confier au cache.
//!
//! # Exemple d'utilisation
//!
//! ```
//! use pmometadata::{MediaItem, SourceKind};
//! use pmoplaylist::Queue;
//! use std::sync::Arc;
//!
//! let mut queue = Queue::with_limit(Some(2));
//! let item = Arc::new(MediaItem::new(
//!     "Intro",
//!     SourceKind::ServiceA,
//!     "abc",
//!     "/tmp/abc.opus",
//!     95,
//! ));
//!
//! assert!(queue.append(item.clone()));
//! assert!(queue.append(item));
//! assert_eq!(queue.total_duration_formatted(), "03:10");
//! assert!(queue.is_duplicate(0).unwrap());
//! assert!(queue.is_full());
//! ```

mod error;
mod queue;

#[cfg(feature = "pmoconfig")]
mod config_ext;

// Réexports publics
pub use error::{QueueError, Result};
pub use queue::Queue;

#[cfg(feature = "pmoconfig")]
pub use config_ext::QueueConfigExt;
