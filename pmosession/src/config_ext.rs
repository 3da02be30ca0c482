//! Extension de pmoconfig pour les sessions de groupe
//!
//! ```yaml
//! sessions:
//!   directory: sessions
//!   queue_limit: 0
//!   default_volume: 100
//! ```

use crate::group::{DEFAULT_VOLUME, MAX_VOLUME};
use crate::manager::{SessionManager, SessionSettings};
use anyhow::{Result, anyhow};
use pmocache::MediaCache;
use pmoconfig::Config;
use pmoplaylist::QueueConfigExt;
use pmosource::SourceRegistry;
use pmoutils::JsonStore;
use serde_yaml::{Number, Value};
use std::sync::Arc;

/// Répertoire par défaut des enregistrements de groupe
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

/// Trait d'extension pour pmoconfig::Config
pub trait SessionConfigExt {
    /// Répertoire des enregistrements (absolu, créé si besoin)
    fn get_sessions_dir(&self) -> Result<String>;

    fn set_sessions_dir(&self, directory: String) -> Result<()>;

    /// Volume d'une nouvelle session
    fn get_default_volume(&self) -> Result<u16>;

    /// Définit le volume d'une nouvelle session (`[0, 200]`)
    fn set_default_volume(&self, volume: u16) -> Result<()>;

    /// Paramètres des sessions (limite de file, volume initial)
    fn get_session_settings(&self) -> Result<SessionSettings>;

    /// Construit le gestionnaire de sessions
    ///
    /// Les sessions enregistrées ne sont pas chargées : appeler
    /// [`SessionManager::restore_sessions`] avant toute lecture.
    fn create_session_manager(
        &self,
        cache: Arc<MediaCache>,
        registry: Arc<SourceRegistry>,
    ) -> Result<SessionManager>;
}

impl SessionConfigExt for Config {
    fn get_sessions_dir(&self) -> Result<String> {
        self.get_managed_dir(&["sessions", "directory"], DEFAULT_SESSIONS_DIR)
    }

    fn set_sessions_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["sessions", "directory"], directory)
    }

    fn get_default_volume(&self) -> Result<u16> {
        match self.get_value(&["sessions", "default_volume"]) {
            Ok(Value::Number(n)) => match n.as_u64() {
                Some(volume) if volume <= u64::from(MAX_VOLUME) => Ok(volume as u16),
                _ => {
                    tracing::warn!(
                        "Invalid default volume {}, using {}",
                        n,
                        DEFAULT_VOLUME
                    );
                    Ok(DEFAULT_VOLUME)
                }
            },
            _ => Ok(DEFAULT_VOLUME),
        }
    }

    fn set_default_volume(&self, volume: u16) -> Result<()> {
        if volume > MAX_VOLUME {
            return Err(anyhow!("Volume {} out of range (0-{})", volume, MAX_VOLUME));
        }
        self.set_value(
            &["sessions", "default_volume"],
            Value::Number(Number::from(volume)),
        )
    }

    fn get_session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            queue_limit: self.get_queue_limit()?,
            default_volume: self.get_default_volume()?,
        })
    }

    fn create_session_manager(
        &self,
        cache: Arc<MediaCache>,
        registry: Arc<SourceRegistry>,
    ) -> Result<SessionManager> {
        let store = JsonStore::new(self.get_sessions_dir()?)?;
        let settings = self.get_session_settings()?;
        tracing::info!(
            "Session records in {} (queue limit: {:?}, default volume: {})",
            store.dir().display(),
            settings.queue_limit,
            settings.default_volume
        );
        Ok(SessionManager::new(cache, registry, store, settings))
    }
}
