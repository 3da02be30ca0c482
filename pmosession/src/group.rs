//! GroupSession : état de lecture d'un groupe de discussion

use crate::error::{Error, Result};
use pmometadata::{MediaItem, MediaRecord};
use pmoplaylist::Queue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Volume maximal (en pourcentage)
pub const MAX_VOLUME: u16 = 200;

/// Volume d'une nouvelle session
pub const DEFAULT_VOLUME: u16 = 100;

/// Identifiant d'un groupe de discussion
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Clé de l'enregistrement persistant
    pub fn record_key(&self) -> String {
        format!("group_{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for GroupId {
    fn from(id: i64) -> Self {
        Self::new(id.to_string())
    }
}

/// Forme persistée d'une session
///
/// `{id, name, volume, queue: [MediaRecord...], totalDuration}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub volume: u16,
    pub queue: Vec<MediaRecord>,
    pub total_duration: u64,
}

/// État de lecture d'un groupe
///
/// Une file, un curseur de lecture (le morceau en cours, retiré de la file)
/// et un volume. Possédée exclusivement par son groupe.
#[derive(Debug, Clone)]
pub struct GroupSession {
    id: GroupId,
    name: String,
    queue: Queue,
    volume: u16,
    now_playing: Option<Arc<MediaItem>>,
}

impl GroupSession {
    /// Crée une session vide au volume par défaut
    pub fn new(id: GroupId, name: impl Into<String>, queue_limit: Option<usize>) -> Self {
        let queue = Queue::with_limit(queue_limit).with_owner(id.as_str());
        Self {
            id,
            name: name.into(),
            queue,
            volume: DEFAULT_VOLUME,
            now_playing: None,
        }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Queue {
        &mut self.queue
    }

    pub fn volume(&self) -> u16 {
        self.volume
    }

    /// Définit le volume
    ///
    /// # Errors
    ///
    /// [`Error::VolumeOutOfRange`] hors de `[0, 200]` ; le volume est inchangé.
    pub fn set_volume(&mut self, volume: i64) -> Result<()> {
        match u16::try_from(volume) {
            Ok(v) if v <= MAX_VOLUME => {
                self.volume = v;
                Ok(())
            }
            _ => Err(Error::VolumeOutOfRange(volume)),
        }
    }

    /// Morceau en cours de lecture
    pub fn now_playing(&self) -> Option<&Arc<MediaItem>> {
        self.now_playing.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.now_playing.is_some()
    }

    pub(crate) fn set_now_playing(&mut self, item: Arc<MediaItem>) {
        self.now_playing = Some(item);
    }

    pub(crate) fn take_now_playing(&mut self) -> Option<Arc<MediaItem>> {
        self.now_playing.take()
    }

    /// Fichiers référencés par la session (file et morceau en cours)
    pub fn referenced_paths(&self) -> HashSet<PathBuf> {
        self.queue
            .iter()
            .chain(self.now_playing.iter())
            .map(|item| item.path().to_path_buf())
            .collect()
    }

    /// Forme persistée (le morceau en cours n'est pas enregistré)
    pub fn to_record(&self) -> GroupRecord {
        GroupRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            volume: self.volume,
            queue: self.queue.iter().map(|item| item.to_record()).collect(),
            total_duration: self.queue.total_duration(),
        }
    }

    /// Reconstruit une session depuis sa forme persistée
    ///
    /// La file est reconstruite par le même chemin qu'à l'usage (`append`),
    /// jamais partiellement : toute incohérence rejette l'enregistrement
    /// entier avec [`Error::CorruptRecord`].
    pub fn from_record(record: GroupRecord, queue_limit: Option<usize>) -> Result<Self> {
        let key = record.id.record_key();
        let corrupt = |reason: String| Error::CorruptRecord {
            key: key.clone(),
            reason,
        };

        if record.volume > MAX_VOLUME {
            return Err(corrupt(format!("volume {} out of range", record.volume)));
        }

        let mut session = Self::new(record.id, record.name, queue_limit);
        session.volume = record.volume;

        for media in record.queue {
            let item = MediaItem::from_record(media).map_err(|e| corrupt(e.to_string()))?;
            if !session.queue.append(Arc::new(item)) {
                return Err(corrupt(format!(
                    "queue holds more than {} tracks",
                    queue_limit.unwrap_or_default()
                )));
            }
        }

        if session.queue.total_duration() != record.total_duration {
            return Err(corrupt(format!(
                "totalDuration {} does not match tracks ({})",
                record.total_duration,
                session.queue.total_duration()
            )));
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmometadata::SourceKind;

    fn item(title: &str, path: &str, duration: u64) -> Arc<MediaItem> {
        Arc::new(MediaItem::new(title, SourceKind::ServiceA, title, path, duration))
    }

    fn session() -> GroupSession {
        let mut session = GroupSession::new(GroupId::from(-1001), "Salon", Some(3));
        session.queue_mut().append(item("A", "/c/a.opus", 100));
        session.queue_mut().append(item("B", "/c/b.opus", 200));
        session
    }

    #[test]
    fn test_default_volume() {
        let session = GroupSession::new("g".into(), "G", None);
        assert_eq!(session.volume(), DEFAULT_VOLUME);
        assert!(!session.is_playing());
        assert_eq!(session.queue().owner(), Some("g"));
    }

    #[test]
    fn test_volume_range() {
        let mut session = session();
        session.set_volume(0).unwrap();
        session.set_volume(200).unwrap();
        assert_eq!(session.volume(), 200);

        assert!(matches!(session.set_volume(201), Err(Error::VolumeOutOfRange(201))));
        assert!(matches!(session.set_volume(-1), Err(Error::VolumeOutOfRange(-1))));
        assert_eq!(session.volume(), 200);
    }

    #[test]
    fn test_record_round_trip() {
        let mut session = session();
        session.set_volume(150).unwrap();
        session.set_now_playing(item("P", "/c/p.opus", 10));

        let record = session.to_record();
        assert_eq!(record.total_duration, 300);
        assert_eq!(record.queue.len(), 2);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "-1001");
        assert_eq!(json["totalDuration"], 300);
        assert_eq!(json["queue"][1]["durationSeconds"], 200);

        let restored = GroupSession::from_record(record, Some(3)).unwrap();
        assert_eq!(restored.name(), "Salon");
        assert_eq!(restored.volume(), 150);
        assert_eq!(restored.queue().total_duration(), 300);
        // Le curseur n'est pas persisté
        assert!(!restored.is_playing());
    }

    #[test]
    fn test_record_over_limit_is_corrupt() {
        let record = session().to_record();
        assert!(matches!(
            GroupSession::from_record(record, Some(1)),
            Err(Error::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_record_total_mismatch_is_corrupt() {
        let mut record = session().to_record();
        record.total_duration += 1;
        assert!(matches!(
            GroupSession::from_record(record, None),
            Err(Error::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_record_empty_path_is_corrupt() {
        let mut record = session().to_record();
        record.queue[0].path.clear();
        assert!(matches!(
            GroupSession::from_record(record, None),
            Err(Error::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_referenced_paths() {
        let mut session = session();
        session.queue_mut().append(item("A2", "/c/a.opus", 100));
        session.set_now_playing(item("P", "/c/p.opus", 10));

        let paths = session.referenced_paths();
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&PathBuf::from("/c/p.opus")));
    }
}
