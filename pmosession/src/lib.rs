//! # pmosession - Sessions de lecture par groupe
//!
//! Chaque groupe de discussion possède une session : une file de morceaux,
//! un morceau en cours et un volume. Toutes les sessions partagent le même
//! cache de fichiers ([`pmocache::MediaCache`]) et le même registre de
//! backends ([`pmosource::SourceRegistry`]).
//!
//! Le [`SessionManager`] garantit qu'un fichier n'est supprimé que lorsque
//! plus aucun groupe ne le référence, et qu'un fichier en cours de lecture
//! n'est jamais évincé.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pmosession::{GroupId, SessionManager, SessionSettings};
//! use pmoutils::JsonStore;
//!
//! let manager = SessionManager::new(
//!     cache,
//!     registry,
//!     JsonStore::new("sessions")?,
//!     SessionSettings::default(),
//! );
//! manager.restore_sessions().await?;
//!
//! let group = GroupId::from("team");
//! let queued = manager.enqueue(&group, "service_b:xyz", None).await?;
//! println!("{} queued at #{}", queued.item.title(), queued.position);
//! ```

mod error;
mod group;
mod index;
mod manager;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use error::{Error, Result};
pub use group::{DEFAULT_VOLUME, GroupId, GroupRecord, GroupSession, MAX_VOLUME};
pub use manager::{Enqueued, SessionManager, SessionSettings, SessionSnapshot};

#[cfg(feature = "pmoconfig")]
pub use config_ext::SessionConfigExt;
