//! Stockage clé/valeur JSON sur disque
//!
//! Chaque clé correspond à un fichier `{key}.json` dans le répertoire du
//! store. Les caractères hors `[A-Za-z0-9._-]` sont encodés en `%XX` : deux
//! clés distinctes ne partagent jamais un fichier, et une clé ne sort jamais
//! du répertoire. L'écriture passe par un fichier temporaire renommé ensuite, de
//! sorte qu'un arrêt brutal ne laisse jamais un enregistrement à moitié écrit.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Erreurs du store JSON
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Aucun enregistrement pour cette clé (à traiter comme « état initial »)
    #[error("Record not found: {0}")]
    Missing(String),

    /// L'enregistrement existe mais ne peut pas être décodé
    #[error("Corrupt record '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode record '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Vrai si l'enregistrement est simplement absent
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreError::Missing(_))
    }
}

/// Store JSON adossé à un répertoire
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Ouvre (et crée si besoin) un store dans `dir`
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Répertoire du store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Chemin du fichier associé à une clé
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    /// Enregistre une valeur JSON sous une clé
    pub fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;

        tracing::trace!("Saved record '{}' to {}", key, path.display());
        Ok(())
    }

    /// Charge la valeur JSON d'une clé
    pub fn load(&self, key: &str) -> Result<Value, StoreError> {
        let data = self.read(key)?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    /// Enregistre une valeur sérialisable
    pub fn save_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.save(key, &value)
    }

    /// Charge et décode une valeur typée
    ///
    /// Un fichier JSON valide mais de forme inattendue est aussi `Corrupt`.
    pub fn load_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let data = self.read(key)?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    /// Supprime l'enregistrement d'une clé. Retourne `false` s'il n'existait pas.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Liste les clés présentes (noms de fichiers sans `.json`)
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(".json").and_then(decode_key) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match std::fs::read(self.path_for(key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::Missing(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Inverse de `encode_key` ; `None` pour un nom qu'elle n'a pas pu produire
fn decode_key(name: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(name.len());
    let mut iter = name.bytes();
    while let Some(byte) = iter.next() {
        if byte == b'%' {
            let hex = [iter.next()?, iter.next()?];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding_is_reversible() {
        for key in ["group_a_b", "group_a/b", "group_a%2Fb", "../x", "chat é", ""] {
            assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        }
        assert_ne!(encode_key("a/b"), encode_key("a_b"));
        assert_ne!(encode_key("a/b"), encode_key("a%2Fb"));
        assert_eq!(encode_key("group_-1001"), "group_-1001");
        assert_eq!(decode_key("bad%2"), None);
    }
}
