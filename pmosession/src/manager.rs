//! SessionManager : sessions de groupe, cache partagé et backends
//!
//! Le manager est le seul à relier les files des groupes au cache. Il
//! applique le cycle de vie d'un morceau :
//!
//! ```text
//! En file → En lecture → Terminé | Passé → fichier supprimé si plus référencé
//! ```
//!
//! Ordre d'acquisition des verrous : table des sessions, session d'un
//! groupe, index des références, cache.

use crate::error::{Error, Result};
use crate::group::{DEFAULT_VOLUME, GroupId, GroupRecord, GroupSession};
use crate::index::ReferenceIndex;
use pmocache::MediaCache;
use pmometadata::MediaItem;
use pmoplaylist::QueueError;
use pmosource::{SourceError, SourceRef, SourceRegistry};
use pmoutils::{JsonStore, format_duration};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Préfixe des clés d'enregistrement de groupe
const RECORD_PREFIX: &str = "group_";

/// Paramètres communs à toutes les sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Longueur maximale des files (`None` : illimitée)
    pub queue_limit: Option<usize>,
    /// Volume d'une nouvelle session
    pub default_volume: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_limit: None,
            default_volume: DEFAULT_VOLUME,
        }
    }
}

/// Résultat d'une demande de lecture
#[derive(Debug, Clone)]
pub struct Enqueued {
    pub item: Arc<MediaItem>,
    /// Position dans la file
    pub position: usize,
    /// Vrai si le fichier était déjà dans le cache (pas de téléchargement)
    pub reused: bool,
    /// Durée totale de la file après insertion
    pub total_duration: u64,
}

/// Vue figée d'une session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: GroupId,
    pub name: String,
    pub volume: u16,
    pub now_playing: Option<Arc<MediaItem>>,
    pub queue: Vec<Arc<MediaItem>>,
    pub total_duration: u64,
    pub limit: Option<usize>,
}

impl SessionSnapshot {
    pub fn total_duration_formatted(&self) -> String {
        format_duration(i64::try_from(self.total_duration).unwrap_or(i64::MAX))
    }
}

/// Téléchargements en cours d'un groupe
#[derive(Debug)]
struct DownloadSlot {
    token: CancellationToken,
    active: usize,
}

type DownloadTable = StdMutex<HashMap<GroupId, DownloadSlot>>;

/// Inscrit un téléchargement ; le retire de la table en fin de portée
struct DownloadGuard<'a> {
    table: &'a DownloadTable,
    group: GroupId,
    token: CancellationToken,
}

impl<'a> DownloadGuard<'a> {
    fn register(table: &'a DownloadTable, group: &GroupId) -> Self {
        let mut downloads = table.lock().unwrap();
        let slot = downloads
            .entry(group.clone())
            .or_insert_with(|| DownloadSlot {
                token: CancellationToken::new(),
                active: 0,
            });
        slot.active += 1;
        Self {
            table,
            group: group.clone(),
            token: slot.token.clone(),
        }
    }
}

impl Drop for DownloadGuard<'_> {
    fn drop(&mut self) {
        // Un jeton annulé a déjà été retiré par cancel_download
        if self.token.is_cancelled() {
            return;
        }
        if let Ok(mut downloads) = self.table.lock() {
            if let Some(slot) = downloads.get_mut(&self.group) {
                slot.active = slot.active.saturating_sub(1);
                if slot.active == 0 {
                    downloads.remove(&self.group);
                }
            }
        }
    }
}

struct ManagerInner {
    cache: Arc<MediaCache>,
    registry: Arc<SourceRegistry>,
    store: JsonStore,
    settings: SessionSettings,
    sessions: Mutex<HashMap<GroupId, Arc<Mutex<GroupSession>>>>,
    index: Mutex<ReferenceIndex>,
    downloads: DownloadTable,
}

/// Gestionnaire des sessions de groupe
///
/// Clonable à faible coût : les clones partagent le même état.
///
/// # Exemple
///
/// ```rust,ignore
/// let manager = SessionManager::new(cache, registry, store, SessionSettings::default());
/// manager.restore_sessions().await?;
///
/// let group = GroupId::from(-1001);
/// manager.enqueue(&group, "service_a:abc", None).await?;
/// if let Some(track) = manager.advance(&group).await? {
///     println!("Now playing {}", track);
/// }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(
        cache: Arc<MediaCache>,
        registry: Arc<SourceRegistry>,
        store: JsonStore,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                cache,
                registry,
                store,
                settings,
                sessions: Mutex::new(HashMap::new()),
                index: Mutex::new(ReferenceIndex::default()),
                downloads: StdMutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<MediaCache> {
        &self.inner.cache
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.inner.registry
    }

    pub fn settings(&self) -> SessionSettings {
        self.inner.settings
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Charge toutes les sessions enregistrées
    ///
    /// Nécessaire au démarrage pour que l'index des références couvre tous
    /// les groupes avant la première suppression de fichier. Un
    /// enregistrement corrompu est signalé et laissé en place : l'accès au
    /// groupe retournera [`Error::CorruptRecord`] jusqu'à un `teardown`.
    pub async fn restore_sessions(&self) -> Result<Vec<GroupId>> {
        let keys = self.inner.store.keys()?;
        let mut restored = Vec::new();

        for key in keys.iter().filter(|key| key.starts_with(RECORD_PREFIX)) {
            match self.load_record(key) {
                Ok(session) => {
                    let id = session.id().clone();
                    self.inner.index.lock().await.rebuild_group(&session);
                    self.inner
                        .sessions
                        .lock()
                        .await
                        .insert(id.clone(), Arc::new(Mutex::new(session)));
                    restored.push(id);
                }
                Err(e) => tracing::error!("Skipping group record '{}': {}", key, e),
            }
        }

        tracing::info!("Restored {} group sessions", restored.len());
        Ok(restored)
    }

    /// Ouvre (ou crée) la session d'un groupe et met à jour son nom
    pub async fn open_session(&self, group: &GroupId, name: &str) -> Result<()> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        if session.name() != name {
            session.set_name(name);
            self.persist(&session);
        }
        Ok(())
    }

    /// Groupes dont la session est chargée
    pub async fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<_> = self.inner.sessions.lock().await.keys().cloned().collect();
        groups.sort();
        groups
    }

    /// Vue figée de la session d'un groupe
    pub async fn snapshot(&self, group: &GroupId) -> Result<SessionSnapshot> {
        let handle = self.session(group).await?;
        let session = handle.lock().await;
        Ok(SessionSnapshot {
            id: session.id().clone(),
            name: session.name().to_string(),
            volume: session.volume(),
            now_playing: session.now_playing().cloned(),
            queue: session.queue().snapshot(),
            total_duration: session.queue().total_duration(),
            limit: session.queue().limit(),
        })
    }

    /// Groupes dont la file ou le curseur référence ce fichier
    pub async fn groups_referencing(&self, item: &MediaItem) -> Vec<GroupId> {
        self.inner.index.lock().await.groups_for(item.path())
    }

    // ========================================================================
    // Demande de lecture
    // ========================================================================

    /// Ajoute une source à la file d'un groupe
    ///
    /// Enchaîne : résolution de la saisie, métadonnées, réutilisation d'un
    /// fichier déjà en cache pour la même source, sinon libération d'une
    /// place, téléchargement et admission. L'élément est ajouté en fin de
    /// file, ou inséré à `position`.
    ///
    /// # Errors
    ///
    /// - [`Error::LimitExceeded`] si la file est pleine (vérifié avant tout
    ///   téléchargement, puis à l'insertion)
    /// - [`Error::CapacityExceeded`] si le cache ne peut libérer de place ;
    ///   le fichier téléchargé est alors supprimé
    /// - [`Error::Source`] pour les erreurs du backend, dont l'annulation
    pub async fn enqueue(
        &self,
        group: &GroupId,
        input: &str,
        position: Option<usize>,
    ) -> Result<Enqueued> {
        let source = self.inner.registry.resolve(input)?;
        let handle = self.session(group).await?;

        {
            let session = handle.lock().await;
            let queue = session.queue();
            if let Some(limit) = queue.limit().filter(|_| queue.is_full()) {
                return Err(Error::LimitExceeded { limit });
            }
            if let Some(index) = position.filter(|index| *index > queue.len()) {
                return Err(Error::IndexOutOfRange {
                    index,
                    len: queue.len(),
                });
            }
        }

        let metadata = self.inner.registry.fetch_metadata(&source).await?;
        let cache = &self.inner.cache;

        let (item, reused) = match cache.find_by_source(source.kind, &metadata.source_id).await {
            Some(item) => {
                tracing::debug!("Reusing cached '{}' for group {}", item.title(), group);
                cache.touch(&item).await;
                (item, true)
            }
            None => {
                let canonical = SourceRef::new(source.kind, metadata.source_id.clone());
                (self.fetch_into_cache(group, &canonical).await?, false)
            }
        };

        let mut session = handle.lock().await;
        let inserted = match position {
            Some(index) => match session.queue_mut().insert(item.clone(), index) {
                Ok(true) => Ok(index),
                Ok(false) => Err(limit_exceeded(&session)),
                Err(e) => Err(e.into()),
            },
            None => session
                .queue_mut()
                .try_append(item.clone())
                .map(|_| session.queue().len() - 1)
                .map_err(Error::from),
        };

        // La file a pu changer pendant le téléchargement
        let position = match inserted {
            Ok(position) => position,
            Err(e) => {
                if !reused {
                    self.release(&item).await;
                }
                return Err(e);
            }
        };

        self.index_session(&session).await;
        self.persist(&session);

        tracing::info!(
            "Group {}: queued '{}' at position {}",
            group,
            item.title(),
            position
        );

        Ok(Enqueued {
            item,
            position,
            reused,
            total_duration: session.queue().total_duration(),
        })
    }

    /// Annule les téléchargements en cours d'un groupe
    ///
    /// Retourne `false` si aucun téléchargement n'était en cours.
    pub fn cancel_download(&self, group: &GroupId) -> bool {
        let slot = self.inner.downloads.lock().unwrap().remove(group);
        match slot {
            Some(slot) => {
                tracing::info!("Group {}: cancelling {} download(s)", group, slot.active);
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Vrai si un téléchargement est en cours pour ce groupe
    pub fn is_downloading(&self, group: &GroupId) -> bool {
        self.inner.downloads.lock().unwrap().contains_key(group)
    }

    // ========================================================================
    // Lecture
    // ========================================================================

    /// Termine le morceau en cours et passe au suivant
    ///
    /// Le morceau suivant est retiré de la file, verrouillé dans le cache et
    /// devient le morceau en cours. S'il a été évincé entre-temps, il est
    /// téléchargé à nouveau. Retourne `None` quand la file est vide.
    ///
    /// # Errors
    ///
    /// - [`Error::FileMissing`] si le fichier ne peut être récupéré ; le
    ///   morceau est alors retiré de la file
    /// - [`Error::CapacityExceeded`] si le cache refuse le fichier récupéré ;
    ///   le morceau reste en tête de file pour un nouvel essai
    pub async fn advance(&self, group: &GroupId) -> Result<Option<Arc<MediaItem>>> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        self.finish_current(&mut session).await;

        let Some(next) = session.queue_mut().pop_front() else {
            self.index_session(&session).await;
            self.persist(&session);
            tracing::info!("Group {}: queue empty, playback stopped", group);
            return Ok(None);
        };

        // Curseur posé avant la vérification : un autre groupe ne peut pas
        // déverrouiller ce fichier pendant un éventuel re-téléchargement
        session.set_now_playing(next.clone());
        self.index_session(&session).await;
        self.inner.cache.lock(&next).await;

        match self.ensure_playable(group, &next).await {
            Ok(playing) => {
                session.set_now_playing(playing.clone());
                self.index_session(&session).await;
                if playing.path() != next.path() {
                    self.unlock_if_idle(&next).await;
                }
                self.persist(&session);
                tracing::info!("Group {}: now playing {}", group, playing);
                Ok(Some(playing))
            }
            Err(e) => {
                session.take_now_playing();
                // Cache saturé : le morceau reprend sa place en tête de file
                let restored = matches!(e, Error::CapacityExceeded { .. })
                    && matches!(session.queue_mut().insert(next.clone(), 0), Ok(true));
                self.index_session(&session).await;
                self.unlock_if_idle(&next).await;
                if restored {
                    tracing::warn!(
                        "Group {}: no room to fetch '{}' again, kept at the head of the queue",
                        group,
                        next.title()
                    );
                } else {
                    self.release(&next).await;
                }
                self.persist(&session);
                Err(e)
            }
        }
    }

    /// Passe le morceau en cours, en annulant un téléchargement en cours
    pub async fn skip(&self, group: &GroupId) -> Result<Option<Arc<MediaItem>>> {
        self.cancel_download(group);
        self.advance(group).await
    }

    /// Arrête la lecture ; la file est conservée
    ///
    /// Retourne le morceau qui était en cours.
    pub async fn stop(&self, group: &GroupId) -> Result<Option<Arc<MediaItem>>> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        let stopped = self.finish_current(&mut session).await;
        if let Some(item) = &stopped {
            tracing::info!("Group {}: stopped '{}'", group, item.title());
        }
        Ok(stopped)
    }

    // ========================================================================
    // Mutations de la file
    // ========================================================================

    /// Retire le morceau à `index`
    ///
    /// Le fichier n'est supprimé que s'il s'agissait de sa dernière
    /// référence, dans ce groupe comme dans les autres.
    pub async fn remove(&self, group: &GroupId, index: usize) -> Result<Arc<MediaItem>> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;

        let duplicated = session.queue().is_duplicate(index)?;
        let item = session.queue_mut().remove_at(index)?;
        self.index_session(&session).await;
        if !duplicated {
            self.release(&item).await;
        }
        self.persist(&session);
        Ok(item)
    }

    /// Déplace un morceau (retrait à `from`, insertion à `to`)
    pub async fn move_item(&self, group: &GroupId, from: usize, to: usize) -> Result<()> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        session.queue_mut().move_item(from, to)?;
        self.persist(&session);
        Ok(())
    }

    /// Échange deux morceaux
    pub async fn swap(&self, group: &GroupId, a: usize, b: usize) -> Result<()> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        session.queue_mut().swap(a, b)?;
        self.persist(&session);
        Ok(())
    }

    /// Mélange la file
    pub async fn shuffle(&self, group: &GroupId) -> Result<()> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        session.queue_mut().shuffle();
        self.persist(&session);
        Ok(())
    }

    /// Vide la file ; retourne le nombre de morceaux retirés
    pub async fn clear(&self, group: &GroupId) -> Result<usize> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;

        let before = session.queue().len();
        let released = session.queue_mut().clear();
        self.index_session(&session).await;
        for item in &released {
            self.release(item).await;
        }
        self.persist(&session);
        Ok(before)
    }

    /// Retire tous les morceaux dont le titre diffère de `title`
    pub async fn remove_all_except(&self, group: &GroupId, title: &str) -> Result<usize> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;

        let before = session.queue().len();
        let released = session.queue_mut().remove_all_except(title);
        self.index_session(&session).await;
        for item in &released {
            self.release(item).await;
        }
        self.persist(&session);
        Ok(before - session.queue().len())
    }

    /// Définit le volume d'un groupe (`[0, 200]`)
    pub async fn set_volume(&self, group: &GroupId, volume: i64) -> Result<()> {
        let handle = self.session(group).await?;
        let mut session = handle.lock().await;
        session.set_volume(volume)?;
        self.persist(&session);
        Ok(())
    }

    // ========================================================================
    // Cycle de vie
    // ========================================================================

    /// Supprime la session d'un groupe
    ///
    /// Annule les téléchargements, arrête la lecture, vide la file (en
    /// libérant les fichiers qui ne sont plus référencés) et supprime
    /// l'enregistrement persistant, même corrompu.
    pub async fn teardown(&self, group: &GroupId) -> Result<()> {
        self.cancel_download(group);

        let handle = self.inner.sessions.lock().await.remove(group);
        if let Some(handle) = handle {
            let mut session = handle.lock().await;
            self.finish_current(&mut session).await;
            let released = session.queue_mut().clear();
            self.inner.index.lock().await.remove_group(group);
            for item in &released {
                self.release(item).await;
            }
        }

        self.inner.store.delete(&group.record_key())?;
        tracing::info!("Group {}: session torn down", group);
        Ok(())
    }

    /// Enregistre toutes les sessions chargées
    pub async fn save_all(&self) -> Result<()> {
        let handles: Vec<_> = self.inner.sessions.lock().await.values().cloned().collect();
        for handle in handles {
            let session = handle.lock().await;
            self.inner
                .store
                .save_as(&session.id().record_key(), &session.to_record())?;
        }
        Ok(())
    }

    // ========================================================================
    // Interne
    // ========================================================================

    /// Session d'un groupe, chargée depuis le store ou créée au besoin
    async fn session(&self, group: &GroupId) -> Result<Arc<Mutex<GroupSession>>> {
        let mut sessions = self.inner.sessions.lock().await;
        if let Some(handle) = sessions.get(group) {
            return Ok(handle.clone());
        }

        let session = match self.load_record(&group.record_key()) {
            Ok(session) => session,
            Err(Error::Store(e)) if e.is_missing() => {
                let mut session = GroupSession::new(
                    group.clone(),
                    group.as_str(),
                    self.inner.settings.queue_limit,
                );
                session.set_volume(i64::from(self.inner.settings.default_volume))?;
                tracing::info!("Group {}: new session", group);
                session
            }
            Err(e) => return Err(e),
        };

        self.inner.index.lock().await.rebuild_group(&session);
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(group.clone(), handle.clone());
        Ok(handle)
    }

    fn load_record(&self, key: &str) -> Result<GroupSession> {
        let record: GroupRecord = self.inner.store.load_as(key)?;
        GroupSession::from_record(record, self.inner.settings.queue_limit)
    }

    /// Enregistre la session ; un échec d'écriture est seulement signalé
    fn persist(&self, session: &GroupSession) {
        let key = session.id().record_key();
        if let Err(e) = self.inner.store.save_as(&key, &session.to_record()) {
            tracing::warn!("Failed to save group record '{}': {}", key, e);
        }
    }

    async fn index_session(&self, session: &GroupSession) {
        self.inner.index.lock().await.rebuild_group(session);
    }

    /// Télécharge une source et l'admet dans le cache
    async fn fetch_into_cache(&self, group: &GroupId, source: &SourceRef) -> Result<Arc<MediaItem>> {
        let cache = &self.inner.cache;
        if !cache.ensure_room().await {
            return Err(Error::CapacityExceeded {
                capacity: cache.capacity(),
            });
        }

        let guard = DownloadGuard::register(&self.inner.downloads, group);
        let item = self
            .inner
            .registry
            .download(source, cache.cache_dir(), &guard.token)
            .await?;
        let item = Arc::new(item);

        if guard.token.is_cancelled() {
            cache.discard(item.path()).await;
            return Err(SourceError::Cancelled.into());
        }

        if !cache.admit(item.clone()).await {
            cache.discard(item.path()).await;
            return Err(Error::CapacityExceeded {
                capacity: cache.capacity(),
            });
        }

        Ok(item)
    }

    /// Garantit que le fichier d'un morceau est présent dans le cache
    ///
    /// Le chemin doit déjà être verrouillé par l'appelant.
    async fn ensure_playable(
        &self,
        group: &GroupId,
        item: &Arc<MediaItem>,
    ) -> Result<Arc<MediaItem>> {
        let cache = &self.inner.cache;
        if let Some(cached) = cache.get(item.path()).await {
            if cached.path().exists() {
                cache.touch(&cached).await;
                return Ok(cached);
            }
        }

        tracing::info!(
            "Group {}: '{}' is no longer cached, fetching it again",
            group,
            item.title()
        );

        let source = SourceRef::new(item.source_kind(), item.source_id());
        let guard = DownloadGuard::register(&self.inner.downloads, group);
        let fresh = match self
            .inner
            .registry
            .download(&source, cache.cache_dir(), &guard.token)
            .await
        {
            Ok(fresh) => Arc::new(fresh),
            Err(SourceError::Cancelled) => return Err(SourceError::Cancelled.into()),
            Err(e) => {
                tracing::warn!("Re-fetching '{}' failed: {}", item.title(), e);
                return Err(Error::FileMissing(item.path().to_path_buf()));
            }
        };

        cache.lock(&fresh).await;
        if !cache.admit(fresh.clone()).await {
            cache.unlock(&fresh).await;
            cache.discard(fresh.path()).await;
            return Err(Error::CapacityExceeded {
                capacity: cache.capacity(),
            });
        }
        Ok(fresh)
    }

    /// Sort le morceau en cours de l'état « en lecture »
    async fn finish_current(&self, session: &mut GroupSession) -> Option<Arc<MediaItem>> {
        let item = session.take_now_playing()?;
        self.index_session(session).await;
        self.unlock_if_idle(&item).await;
        self.release(&item).await;
        Some(item)
    }

    /// Déverrouille un fichier qu'aucun groupe ne lit plus
    async fn unlock_if_idle(&self, item: &MediaItem) {
        let index = self.inner.index.lock().await;
        if !index.is_playing(item.path()) {
            self.inner.cache.unlock(item).await;
        }
    }

    /// Supprime le fichier d'un morceau si plus aucun groupe ne le référence
    ///
    /// Le cache refuse de toute façon de supprimer un élément verrouillé.
    async fn release(&self, item: &MediaItem) -> bool {
        let index = self.inner.index.lock().await;
        if index.is_referenced(item.path()) {
            tracing::debug!("'{}' still referenced, keeping its file", item.title());
            return false;
        }
        let removed = self.inner.cache.remove(item).await;
        if removed {
            tracing::info!("Released '{}'", item.title());
        }
        removed
    }
}

fn limit_exceeded(session: &GroupSession) -> Error {
    QueueError::LimitExceeded {
        limit: session.queue().limit().unwrap_or_else(|| session.queue().len()),
    }
    .into()
}
