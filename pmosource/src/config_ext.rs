//! Extension pour configurer les backends depuis pmoconfig
//!
//! ```yaml
//! sources:
//!   timeout_secs: 30
//!   service_a:
//!     base_url: https://service-a.example.com
//! ```

use crate::client::{DEFAULT_REQUEST_TIMEOUT_SECS, HttpClient};
use crate::registry::SourceRegistry;
use crate::{ServiceABackend, ServiceBBackend, ServiceCBackend, service_a, service_b, service_c};
use anyhow::Result;
use pmoconfig::Config;
use pmometadata::SourceKind;
use serde_yaml::Value;
use std::sync::Arc;
use std::time::Duration;

fn default_base_url(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::ServiceA => service_a::DEFAULT_BASE_URL,
        SourceKind::ServiceB => service_b::DEFAULT_BASE_URL,
        SourceKind::ServiceC => service_c::DEFAULT_BASE_URL,
    }
}

/// Trait d'extension pour pmoconfig::Config
pub trait SourceConfigExt {
    /// URL de base d'un service
    fn get_source_base_url(&self, kind: SourceKind) -> Result<String>;

    /// Définit l'URL de base d'un service
    fn set_source_base_url(&self, kind: SourceKind, url: String) -> Result<()>;

    /// Timeout des requêtes de métadonnées (`sources.timeout_secs`)
    fn get_source_timeout(&self) -> Result<Duration>;

    /// Construit le registre avec les trois backends configurés
    fn create_source_registry(&self) -> Result<SourceRegistry>;
}

impl SourceConfigExt for Config {
    fn get_source_base_url(&self, kind: SourceKind) -> Result<String> {
        match self.get_value(&["sources", kind.as_str(), "base_url"]) {
            Ok(Value::String(url)) if !url.trim().is_empty() => Ok(url),
            _ => Ok(default_base_url(kind).to_string()),
        }
    }

    fn set_source_base_url(&self, kind: SourceKind, url: String) -> Result<()> {
        self.set_value(&["sources", kind.as_str(), "base_url"], Value::String(url))
    }

    fn get_source_timeout(&self) -> Result<Duration> {
        match self.get_source_timeout_secs()? {
            0 => {
                tracing::warn!(
                    "Invalid source timeout 0, using default {}s",
                    DEFAULT_REQUEST_TIMEOUT_SECS
                );
                Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            }
            secs => Ok(Duration::from_secs(secs as u64)),
        }
    }

    fn create_source_registry(&self) -> Result<SourceRegistry>;
}

impl SourceConfigExt for Config {
    fn get_source_base_url(&self, kind: SourceKind) -> Result<String> {
        match self.get_value(&["sources", kind.as_str(), "base_url"]) {
            Ok(Value::String(url)) if !url.trim().is_empty() => Ok(url),
            _ => Ok(default_base_url(kind).to_string()),
        }
    }

    fn set_source_base_url(&self, kind: SourceKind, url: String) -> Result<()> {
        self.set_value(&["sources", kind.as_str(), "base_url"], Value::String(url))
    }

    fn get_source_timeout(&self) -> Result<Duration> {
        match self.get_value(&["sources", "timeout_secs"]) {
            Ok(Value::Number(n)) => match n.as_u64() {
                Some(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!(
                        "Invalid source timeout {}, using default {}s",
                        n,
                        DEFAULT_REQUEST_TIMEOUT_SECS
                    );
                    Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
                }
            },
            _ => Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        }
    }

    fn set_source_timeout(&self, secs: u64) -> Result<()> {
        let n = Number::from(secs);
        self.set_value(&["sources", "timeout_secs"], Value::Number(n))
    }

    fn create_source_registry(&self) -> Result<SourceRegistry> {
        let timeout = self.get_source_timeout()?;
        let client = |kind: SourceKind| -> Result<HttpClient> {
            Ok(HttpClient::builder(self.get_source_base_url(kind)?)
                .timeout(timeout)
                .build()?)
        };

        Ok(SourceRegistry::new()
            .with_backend(Arc::new(ServiceABackend::new(client(SourceKind::ServiceA)?)))
            .with_backend(Arc::new(ServiceBBackend::new(client(SourceKind::ServiceB)?)))
            .with_backend(Arc::new(ServiceCBackend::new(client(SourceKind::ServiceC)?))))
    }
}
