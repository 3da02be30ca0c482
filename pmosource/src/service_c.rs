//! Backend du service C
//!
//! ```text
//! GET {base}/items/{id}
//! { "data": { "key": "...",
//!             "metadata": { "title": "...", "length_seconds": 300 },
//!             "track_count": 12,
//!             "download_url": "..." } }
//! ```
//!
//! `track_count` n'est présent que pour les collections. Une durée négative
//! est ramenée à 0 (affichée comme indéfinie). Pages publiques :
//! `{base}/items/{id}`.

use crate::backend::{RetrievalBackend, SourceMetadata};
use crate::client::HttpClient;
use crate::download::pk_from_source;
use crate::error::{Result, SourceError};
use crate::reference::SourceRef;
use pmometadata::{MediaItem, SourceKind};
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Default service C base URL
pub const DEFAULT_BASE_URL: &str = "https://service-c.example.com";

const AUDIO_EXTENSION: &str = "ogg";
const PAGE_SECTION: &str = "items";

#[derive(Debug, Clone, Deserialize)]
struct ItemEnvelope {
    data: Item,
}

#[derive(Debug, Clone, Deserialize)]
struct Item {
    key: String,
    metadata: ItemMetadata,
    #[serde(default)]
    track_count: Option<u32>,
    download_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemMetadata {
    title: String,
    length_seconds: i64,
}

impl Item {
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            title: self.metadata.title.clone(),
            source_id: self.key.clone(),
            duration_secs: u64::try_from(self.metadata.length_seconds).unwrap_or(0),
            item_count: self.track_count,
        }
    }
}

/// Backend du service C
#[derive(Debug, Clone)]
pub struct ServiceCBackend {
    http: HttpClient,
}

impl ServiceCBackend {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Backend sur l'URL publique par défaut
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(HttpClient::builder(DEFAULT_BASE_URL).build()?))
    }

    async fn item(&self, id: &str) -> Result<Item> {
        let envelope: ItemEnvelope = self.http.get_json(&format!("items/{}", id)).await?;
        Ok(envelope.data)
    }
}

#[async_trait::async_trait]
impl RetrievalBackend for ServiceCBackend {
    fn kind(&self) -> SourceKind {
        SourceKind::ServiceC
    }

    fn recognize(&self, input: &str) -> Option<String> {
        self.http.extract_id(input, PAGE_SECTION)
    }

    async fn fetch_metadata(&self, source: &SourceRef) -> Result<SourceMetadata> {
        Ok(self.item(&source.id).await?.metadata())
    }

    async fn download(
        &self,
        source: &SourceRef,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaItem> {
        let item = self.item(&source.id).await?;
        // Une collection n'a pas de fichier propre
        let url = item.download_url.clone().ok_or_else(|| {
            SourceError::invalid_metadata(format!("item {} has no download URL", item.key))
        })?;
        let metadata = item.metadata();
        let pk = pk_from_source(self.kind(), &metadata.source_id);
        let path = self
            .http
            .download(&url, dest_dir, &pk, AUDIO_EXTENSION, cancel)
            .await?;
        Ok(metadata.into_media_item(self.kind(), path))
    }
}
