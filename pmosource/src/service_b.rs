//! Backend du service B
//!
//! ```text
//! GET {base}/v1/tracks/{id}
//! { "track": { "urn": "...", "name": "...", "duration_ms": 215000,
//!              "media": { "url": "..." } } }
//! ```
//!
//! Pages publiques : `{base}/track/{id}`.

use crate::backend::{RetrievalBackend, SourceMetadata};
use crate::client::HttpClient;
use crate::download::pk_from_source;
use crate::error::Result;
use crate::reference::SourceRef;
use pmometadata::{MediaItem, SourceKind};
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Default service B base URL
pub const DEFAULT_BASE_URL: &str = "https://service-b.example.com";

const AUDIO_EXTENSION: &str = "mp3";
const PAGE_SECTION: &str = "track";

#[derive(Debug, Clone, Deserialize)]
struct TrackEnvelope {
    track: Track,
}

#[derive(Debug, Clone, Deserialize)]
struct Track {
    urn: String,
    name: String,
    duration_ms: u64,
    media: Media,
}

#[derive(Debug, Clone, Deserialize)]
struct Media {
    url: String,
}

impl Track {
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            title: self.name.clone(),
            source_id: self.urn.clone(),
            // Arrondi à la seconde la plus proche
            duration_secs: (self.duration_ms + 500) / 1000,
            item_count: None,
        }
    }
}

/// Backend du service B
#[derive(Debug, Clone)]
pub struct ServiceBBackend {
    http: HttpClient,
}

impl ServiceBBackend {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Backend sur l'URL publique par défaut
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(HttpClient::builder(DEFAULT_BASE_URL).build()?))
    }

    async fn track(&self, id: &str) -> Result<Track> {
        let envelope: TrackEnvelope = self.http.get_json(&format!("v1/tracks/{}", id)).await?;
        Ok(envelope.track)
    }
}

#[async_trait::async_trait]
impl RetrievalBackend for ServiceBBackend {
    fn kind(&self) -> SourceKind {
        SourceKind::ServiceB
    }

    fn recognize(&self, input: &str) -> Option<String> {
        self.http.extract_id(input, PAGE_SECTION)
    }

    async fn fetch_metadata(&self, source: &SourceRef) -> Result<SourceMetadata> {
        Ok(self.track(&source.id).await?.metadata())
    }

    async fn download(
        &self,
        source: &SourceRef,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaItem> {
        let track = self.track(&source.id).await?;
        let metadata = track.metadata();
        let pk = pk_from_source(self.kind(), &metadata.source_id);
        let path = self
            .http
            .download(&track.media.url, dest_dir, &pk, AUDIO_EXTENSION, cancel)
            .await?;
        Ok(metadata.into_media_item(self.kind(), path))
    }
}
