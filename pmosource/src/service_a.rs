//! Backend du service A
//!
//! ```text
//! GET {base}/api/tracks/{id}
//! { "id": "...", "title": "...", "duration": "3:25", "audio_url": "..." }
//! ```
//!
//! La durée est une chaîne d'affichage (`MM:SS` ou `H:MM:SS`, éventuellement
//! non normalisée comme `0:75`). Les pages publiques ont la forme
//! `{base}/watch/{id}`.

use crate::backend::{RetrievalBackend, SourceMetadata};
use crate::client::HttpClient;
use crate::download::pk_from_source;
use crate::error::{Result, SourceError};
use crate::reference::SourceRef;
use pmometadata::{MediaItem, SourceKind};
use pmoutils::parse_duration;
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Default service A base URL
pub const DEFAULT_BASE_URL: &str = "https://service-a.example.com";

const AUDIO_EXTENSION: &str = "opus";
const PAGE_SECTION: &str = "watch";

#[derive(Debug, Clone, Deserialize)]
struct TrackResponse {
    id: String,
    title: String,
    duration: String,
    audio_url: String,
}

impl TrackResponse {
    fn metadata(&self) -> Result<SourceMetadata> {
        let seconds = parse_duration(&self.duration).map_err(|e| {
            SourceError::invalid_metadata(format!("track {}: {}", self.id, e))
        })?;

        Ok(SourceMetadata {
            title: self.title.clone(),
            source_id: self.id.clone(),
            duration_secs: u64::try_from(seconds).unwrap_or(0),
            item_count: None,
        })
    }
}

/// Backend du service A
#[derive(Debug, Clone)]
pub struct ServiceABackend {
    http: HttpClient,
}

impl ServiceABackend {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Backend sur l'URL publique par défaut
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(HttpClient::builder(DEFAULT_BASE_URL).build()?))
    }

    async fn track(&self, id: &str) -> Result<TrackResponse> {
        self.http.get_json(&format!("api/tracks/{}", id)).await
    }
}

#[async_trait::async_trait]
impl RetrievalBackend for ServiceABackend {
    fn kind(&self) -> SourceKind {
        SourceKind::ServiceA
    }

    fn recognize(&self, input: &str) -> Option<String> {
        self.http.extract_id(input, PAGE_SECTION)
    }

    async fn fetch_metadata(&self, source: &SourceRef) -> Result<SourceMetadata> {
        self.track(&source.id).await?.metadata()
    }

    async fn download(
        &self,
        source: &SourceRef,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaItem> {
        let track = self.track(&source.id).await?;
        let metadata = track.metadata()?;
        let pk = pk_from_source(self.kind(), &metadata.source_id);
        let path = self
            .http
            .download(&track.audio_url, dest_dir, &pk, AUDIO_EXTENSION, cancel)
            .await?;
        Ok(metadata.into_media_item(self.kind(), path))
    }
}
