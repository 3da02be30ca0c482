//! Types de métadonnées partagés entre les crates PMOBot.
//!
//! Cette crate définit :
//! - [`SourceKind`] : le service distant d'où provient un média
//! - [`MediaItem`] : un fichier audio téléchargé (immuable après construction)
//! - [`MediaRecord`] : la forme persistée d'un [`MediaItem`]
//!
//! Le passage d'un [`MediaItem`] à sa forme persistée est explicite
//! ([`MediaItem::to_record`] / [`MediaItem::from_record`]) et vérifié à la
//! relecture.
//!
//! # Examples
//!
//! ```rust
//! use pmometadata::{MediaItem, SourceKind};
//!
//! let item = MediaItem::new("Intro", SourceKind::ServiceA, "abc", "/tmp/abc.opus", 61);
//! assert_eq!(item.duration_formatted(), "01:01");
//!
//! let record = item.to_record();
//! assert_eq!(MediaItem::from_record(record).unwrap(), item);
//! ```

use pmoutils::format_duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Erreurs de décodage des métadonnées
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Unknown source kind: {0}")]
    UnknownSourceKind(String),

    #[error("Media record '{0}' has an empty path")]
    EmptyPath(String),
}

/// Service distant d'où provient un média
///
/// L'ensemble est fermé : la sélection du backend se fait une fois pour
/// toutes à partir de cette valeur, jamais à partir d'une chaîne libre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ServiceA,
    ServiceB,
    ServiceC,
}

impl SourceKind {
    /// Tous les services connus
    pub const ALL: [SourceKind; 3] = [SourceKind::ServiceA, SourceKind::ServiceB, SourceKind::ServiceC];

    /// Identifiant stable (clés de configuration, préfixes de références)
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ServiceA => "service_a",
            SourceKind::ServiceB => "service_b",
            SourceKind::ServiceC => "service_c",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MetadataError::UnknownSourceKind(s.to_string()))
    }
}

/// Un média audio téléchargé
///
/// Créé par un backend à la fin d'un téléchargement complet, puis partagé
/// (`Arc<MediaItem>`) entre le cache et les files d'attente. Le chemin est
/// unique par fichier téléchargé et sert d'identité.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaItem {
    title: String,
    source_kind: SourceKind,
    source_id: String,
    path: PathBuf,
    duration_secs: u64,
}

impl MediaItem {
    pub fn new(
        title: impl Into<String>,
        source_kind: SourceKind,
        source_id: impl Into<String>,
        path: impl Into<PathBuf>,
        duration_secs: u64,
    ) -> Self {
        Self {
            title: title.into(),
            source_kind,
            source_id: source_id.into(),
            path: path.into(),
            duration_secs,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Chemin du fichier audio (identité de l'élément)
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Durée affichable (`MM:SS`, `H:MM:SS` ou `undefined`)
    pub fn duration_formatted(&self) -> String {
        format_duration(i64::try_from(self.duration_secs).unwrap_or(i64::MAX))
    }

    /// Vrai si l'élément provient de la même source que `(kind, id)`
    pub fn is_from(&self, kind: SourceKind, source_id: &str) -> bool {
        self.source_kind == kind && self.source_id == source_id
    }

    /// Forme persistée de l'élément
    pub fn to_record(&self) -> MediaRecord {
        MediaRecord {
            title: self.title.clone(),
            source_kind: self.source_kind,
            source_id: self.source_id.clone(),
            path: self.path.to_string_lossy().into_owned(),
            duration_seconds: self.duration_secs,
        }
    }

    /// Reconstruit un élément depuis sa forme persistée
    pub fn from_record(record: MediaRecord) -> Result<Self, MetadataError> {
        if record.path.trim().is_empty() {
            return Err(MetadataError::EmptyPath(record.title));
        }
        Ok(Self {
            title: record.title,
            source_kind: record.source_kind,
            source_id: record.source_id,
            path: PathBuf::from(record.path),
            duration_secs: record.duration_seconds,
        })
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.duration_formatted())
    }
}

/// Forme persistée d'un [`MediaItem`]
///
/// `{title, sourceKind, sourceId, path, durationSeconds}`, partagée par le
/// manifeste du cache et les enregistrements de groupe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub title: String,
    pub source_kind: SourceKind,
    pub source_id: String,
    pub path: String,
    pub duration_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_strings() {
        assert_eq!(SourceKind::ServiceB.to_string(), "service_b");
        assert_eq!("SERVICE_C".parse::<SourceKind>(), Ok(SourceKind::ServiceC));
        assert!("radio".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_record_layout() {
        let item = MediaItem::new("Titre", SourceKind::ServiceA, "x1", "/cache/x1.opus", 200);
        let json = serde_json::to_value(item.to_record()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Titre",
                "sourceKind": "service_a",
                "sourceId": "x1",
                "path": "/cache/x1.opus",
                "durationSeconds": 200
            })
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut record =
            MediaItem::new("Titre", SourceKind::ServiceA, "x1", "/cache/x1.opus", 200).to_record();
        record.path = String::new();
        assert_eq!(
            MediaItem::from_record(record),
            Err(MetadataError::EmptyPath("Titre".to_string()))
        );
    }

    #[test]
    fn test_zero_duration_placeholder() {
        let item = MediaItem::new("Live", SourceKind::ServiceC, "l", "/cache/l.ogg", 0);
        assert_eq!(item.duration_formatted(), pmoutils::UNDEFINED_DURATION);
    }
}
