//! # PMOSource
//!
//! Récupération des médias distants pour PMOBot.
//!
//! Cette crate fournit :
//! - [`RetrievalBackend`] : le contrat commun (métadonnées, téléchargement)
//! - Trois backends HTTP ([`ServiceABackend`], [`ServiceBBackend`],
//!   [`ServiceCBackend`]), chacun avec sa propre forme de réponse JSON
//! - [`SourceRegistry`] : sélection du backend par [`SourceKind`]
//! - Le téléchargement en deux temps (`{pk}.part` puis renommage) avec
//!   annulation par [`CancellationToken`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pmosource::{SourceRegistry, ServiceABackend};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = SourceRegistry::new()
//!     .with_backend(Arc::new(ServiceABackend::with_defaults()?));
//!
//! let source = registry.resolve("service_a:abc")?;
//! let metadata = registry.fetch_metadata(&source).await?;
//! let item = registry
//!     .download(&source, cache.cache_dir(), &CancellationToken::new())
//!     .await?;
//! ```
//!
//! [`SourceKind`]: pmometadata::SourceKind
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod backend;
pub mod client;
pub mod download;
mod error;
mod reference;
mod registry;
pub mod service_a;
pub mod service_b;
pub mod service_c;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use backend::{RetrievalBackend, SourceMetadata};
pub use client::{ClientBuilder, HttpClient};
pub use download::pk_from_source;
pub use error::{Result, SourceError};
pub use reference::SourceRef;
pub use registry::SourceRegistry;
pub use service_a::ServiceABackend;
pub use service_b::ServiceBBackend;
pub use service_c::ServiceCBackend;

#[cfg(feature = "pmoconfig")]
pub use config_ext::SourceConfigExt;
