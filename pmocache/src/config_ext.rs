//! Extension pour intégrer le cache média dans pmoconfig
//!
//! Ce module fournit le trait `MediaCacheConfigExt` qui ajoute à
//! `pmoconfig::Config` la lecture des paramètres du cache et une méthode
//! factory.
//!
//! ```yaml
//! media_cache:
//!   directory: cache_media
//!   size: 64
//! ```

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use std::sync::Arc;

use crate::MediaCache;

/// Répertoire par défaut (relatif au répertoire de configuration)
pub const DEFAULT_MEDIA_CACHE_DIR: &str = "cache_media";

/// Nombre d'éléments par défaut
pub const DEFAULT_MEDIA_CACHE_SIZE: usize = 64;

/// Trait d'extension pour ajouter la gestion du cache média à pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmocache::MediaCacheConfigExt;
///
/// let config = pmoconfig::Config::load_config("")?;
/// let cache = config.create_media_cache()?;
/// ```
pub trait MediaCacheConfigExt {
    /// Récupère le répertoire du cache (absolu, créé si besoin)
    fn get_media_cache_dir(&self) -> Result<String>;

    /// Définit le répertoire du cache (absolu ou relatif au config_dir)
    fn set_media_cache_dir(&self, directory: String) -> Result<()>;

    /// Récupère la capacité du cache (nombre d'éléments)
    fn get_media_cache_size(&self) -> Result<usize>;

    /// Définit la capacité du cache
    fn set_media_cache_size(&self, size: usize) -> Result<()>;

    /// Ouvre le cache configuré (relecture du manifeste et consolidation)
    fn create_media_cache(&self) -> Result<Arc<MediaCache>>;
}

impl MediaCacheConfigExt for Config {
    fn get_media_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["media_cache", "directory"], DEFAULT_MEDIA_CACHE_DIR)
    }

    fn set_media_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["media_cache", "directory"], directory)
    }

    fn get_media_cache_size(&self) -> Result<usize> {
        match self.get_value(&["media_cache", "size"]) {
            Ok(Value::Number(n)) => match n.as_u64() {
                Some(size) if size > 0 => Ok(size as usize),
                _ => {
                    tracing::warn!(
                        "Invalid media cache size {}, using default {}",
                        n,
                        DEFAULT_MEDIA_CACHE_SIZE
                    );
                    Ok(DEFAULT_MEDIA_CACHE_SIZE)
                }
            },
            _ => Ok(DEFAULT_MEDIA_CACHE_SIZE),
        }
    }

    fn set_media_cache_size(&self, size: usize) -> Result<()> {
        let n = Number::from(size);
        self.set_value(&["media_cache", "size"], Value::Number(n))
    }

    fn create_media_cache(&self) -> Result<Arc<MediaCache>> {
        let dir = self.get_media_cache_dir()?;
        let size = self.get_media_cache_size()?;
        Ok(Arc::new(MediaCache::open(&dir, size)?))
    }
}
