//! Client HTTP partagé par les backends
//!
//! Enveloppe un `reqwest::Client` avec l'URL de base du service, un timeout
//! par requête et une politique de nouvelle tentative sur les erreurs
//! transitoires.

use crate::download;
use crate::error::{Result, SourceError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default timeout for metadata requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Nouvelles tentatives après une erreur transitoire
pub const DEFAULT_RETRIES: u32 = 2;

/// Délai de base entre deux tentatives (multiplié par le numéro de tentative)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// User-Agent par défaut : `PMOBot/{version} ({os})`
pub fn default_user_agent() -> String {
    format!(
        "PMOBot/{} ({})",
        env!("CARGO_PKG_VERSION"),
        pmoutils::get_os_string()
    )
}

/// Client HTTP d'un service distant
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

impl HttpClient {
    /// Create a builder for configuring the client
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// URL absolue d'un chemin relatif à la base
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Résout une URL renvoyée par le service (absolue ou relative à la base)
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        }
    }

    /// Extrait l'identifiant d'une URL `{base}/{section}/{id}`
    ///
    /// L'identifiant s'arrête au premier `/`, `?` ou `#`.
    pub fn extract_id(&self, input: &str, section: &str) -> Option<String> {
        let prefix = self.url(section);
        let rest = input.trim().strip_prefix(&prefix)?.strip_prefix('/')?;
        let id = rest.split(['/', '?', '#']).next()?;
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    /// GET JSON avec nouvelles tentatives sur erreur transitoire
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let mut attempt = 0;

        loop {
            match self.try_get_json(&url).await {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        self.retries + 1,
                        url,
                        e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::from_status_code(status.as_u16(), url));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::invalid_metadata(format!("{}: {}", url, e)))
    }

    /// Télécharge `url` dans `dest_dir/{pk}.{extension}` via un fichier `.part`
    pub async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        pk: &str,
        extension: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let url = self.resolve_url(url);
        download::download_staged(&self.client, &url, dest_dir, pk, extension, cancel).await
    }
}

/// Builder for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: String,
    request_timeout: Duration,
    retries: u32,
    retry_delay: Duration,
    user_agent: String,
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: None,
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            user_agent: default_user_agent(),
        }
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Nombre de nouvelles tentatives et délai de base
    pub fn retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<HttpClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(&self.user_agent).build()?,
        };

        Ok(HttpClient {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.request_timeout,
            retries: self.retries,
            retry_delay: self.retry_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::builder("https://a.example/").build().unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("https://a.example");
        assert_eq!(builder.retries, DEFAULT_RETRIES);
        assert_eq!(
            builder.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert!(builder.user_agent.starts_with("PMOBot/"));
    }

    #[test]
    fn test_urls() {
        let http = client();
        assert_eq!(http.base_url(), "https://a.example");
        assert_eq!(http.url("/api/x"), "https://a.example/api/x");
        assert_eq!(http.resolve_url("media/1.opus"), "https://a.example/media/1.opus");
        assert_eq!(http.resolve_url("https://cdn.example/1"), "https://cdn.example/1");
    }

    #[test]
    fn test_extract_id() {
        let http = client();
        assert_eq!(
            http.extract_id("https://a.example/watch/abc?t=10", "watch"),
            Some("abc".to_string())
        );
        assert_eq!(http.extract_id("https://a.example/watch/", "watch"), None);
        assert_eq!(http.extract_id("https://b.example/watch/abc", "watch"), None);
        assert_eq!(http.extract_id("https://a.example/watchlist/abc", "watch"), None);
    }
}
