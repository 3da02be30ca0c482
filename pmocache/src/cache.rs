//! Cache média borné avec éviction LRU et verrouillage des éléments en lecture

use crate::error::{CacheError, Result};
use pmometadata::{MediaItem, MediaRecord, SourceKind};
use pmoutils::{JsonStore, StoreError};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Clé du manifeste dans le répertoire du cache
pub const MANIFEST_KEY: &str = "manifest";

/// État protégé par le mutex du cache
#[derive(Debug, Default)]
struct CacheState {
    /// Ordre de récence : tête = moins récemment utilisé, queue = plus récent
    entries: VecDeque<Arc<MediaItem>>,
    /// Chemins verrouillés (en cours de lecture ou de téléchargement)
    locked: HashSet<PathBuf>,
}

impl CacheState {
    fn position(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|item| item.path() == path)
    }
}

/// Cache média partagé entre tous les groupes
///
/// Toutes les mutations passent par une seule section critique (un mutex) :
/// admission, éviction, verrouillage et `touch` sont atomiques vis-à-vis des
/// admissions concurrentes venant d'autres groupes.
///
/// La borne `capacity` est appliquée au moment de l'admission, par éviction
/// de l'élément déverrouillé le moins récemment utilisé. Un élément verrouillé
/// n'est jamais évincé ; s'il se trouve en tête, l'éviction passe au suivant.
///
/// # Exemple
///
/// ```rust,no_run
/// use pmocache::MediaCache;
/// use pmometadata::{MediaItem, SourceKind};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> pmocache::Result<()> {
/// let cache = MediaCache::open("./cache_media", 64)?;
/// let item = Arc::new(MediaItem::new("Intro", SourceKind::ServiceA, "abc", "./cache_media/abc.opus", 61));
///
/// if cache.admit(item.clone()).await {
///     cache.lock(&item).await;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MediaCache {
    dir: PathBuf,
    capacity: usize,
    state: Mutex<CacheState>,
    manifest: Option<JsonStore>,
}

impl MediaCache {
    /// Crée un cache vide, sans manifeste persistant
    ///
    /// # Arguments
    ///
    /// * `dir` - Répertoire où les backends déposent les fichiers
    /// * `capacity` - Nombre maximal d'éléments
    pub fn new(dir: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            capacity,
            state: Mutex::new(CacheState::default()),
            manifest: None,
        })
    }

    /// Ouvre un cache persistant et le consolide
    ///
    /// Cette méthode :
    /// 1. Relit le manifeste (ordre de récence et appartenance)
    /// 2. Ignore les entrées dont le fichier a disparu
    /// 3. Évince les plus anciennes si la capacité a diminué
    /// 4. Supprime les fichiers orphelins (y compris les `.part`)
    /// 5. Réécrit le manifeste
    ///
    /// Un manifeste absent donne un cache vide ; un manifeste illisible est
    /// une erreur.
    pub fn open(dir: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let store = JsonStore::new(&dir)?;

        let records: Vec<MediaRecord> = match store.load_as(MANIFEST_KEY) {
            Ok(records) => records,
            Err(StoreError::Missing(_)) => {
                tracing::info!("No cache manifest in {}, starting empty", dir.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut state = CacheState::default();
        for record in records {
            let item = MediaItem::from_record(record)?;
            if !item.path().exists() {
                tracing::warn!(
                    "Dropping cache entry '{}': file {} is missing",
                    item.title(),
                    item.path().display()
                );
                continue;
            }
            if state.position(item.path()).is_some() {
                tracing::warn!("Duplicate cache entry for {}", item.path().display());
                continue;
            }
            state.entries.push_back(Arc::new(item));
        }

        while state.entries.len() > capacity {
            if let Some(oldest) = state.entries.pop_front() {
                tracing::info!(
                    "Capacity reduced to {}: evicting '{}'",
                    capacity,
                    oldest.title()
                );
                remove_backing_file(oldest.path());
            }
        }

        // Supprimer les fichiers sans entrée correspondante
        let manifest_path = store.path_for(MANIFEST_KEY);
        let kept: HashSet<&Path> = state.entries.iter().map(|item| item.path()).collect();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() || path == manifest_path {
                continue;
            }
            if !kept.contains(path.as_path()) {
                tracing::info!("Removing orphan cache file {}", path.display());
                remove_backing_file(&path);
            }
        }
        drop(kept);

        tracing::info!(
            "Media cache opened with {}/{} entries",
            state.entries.len(),
            capacity
        );
        write_manifest(&store, &state);

        let cache = Self {
            dir,
            capacity,
            state: Mutex::new(state),
            manifest: Some(store),
        };

        Ok(cache)
    }

    /// Capacité configurée
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Répertoire du cache
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Nombre d'éléments présents
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// `size >= capacity`
    pub async fn is_full(&self) -> bool {
        self.state.lock().await.entries.len() >= self.capacity
    }

    /// Vrai si un élément de ce chemin est présent
    pub async fn contains(&self, path: &Path) -> bool {
        self.state.lock().await.position(path).is_some()
    }

    /// Récupère l'élément d'un chemin
    pub async fn get(&self, path: &Path) -> Option<Arc<MediaItem>> {
        let state = self.state.lock().await;
        state.position(path).map(|i| state.entries[i].clone())
    }

    /// Cherche un élément déjà téléchargé depuis la même source
    pub async fn find_by_source(&self, kind: SourceKind, source_id: &str) -> Option<Arc<MediaItem>> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .find(|item| item.is_from(kind, source_id))
            .cloned()
    }

    /// Copie des éléments dans l'ordre de récence (plus ancien d'abord)
    pub async fn snapshot(&self) -> Vec<Arc<MediaItem>> {
        self.state.lock().await.entries.iter().cloned().collect()
    }

    /// Verrouille un élément (idempotent)
    ///
    /// Le verrou porte sur le chemin : il peut être posé avant l'admission,
    /// pendant un téléchargement.
    pub async fn lock(&self, item: &MediaItem) {
        let mut state = self.state.lock().await;
        if state.locked.insert(item.path().to_path_buf()) {
            tracing::debug!("Locked cache entry {}", item.path().display());
        }
    }

    /// Déverrouille un élément (sans effet s'il ne l'était pas)
    pub async fn unlock(&self, item: &MediaItem) {
        let mut state = self.state.lock().await;
        if state.locked.remove(item.path()) {
            tracing::debug!("Unlocked cache entry {}", item.path().display());
        }
    }

    pub async fn is_locked(&self, item: &MediaItem) -> bool {
        self.state.lock().await.locked.contains(item.path())
    }

    /// Admet un élément dans le cache
    ///
    /// Si le cache est plein, tente d'évincer l'élément déverrouillé le moins
    /// récemment utilisé. Retourne `false` si aucune place n'a pu être
    /// libérée : l'appelant doit alors annuler ce qu'il a préparé (fichier
    /// téléchargé, voir [`MediaCache::discard`]).
    ///
    /// Un élément dont le chemin est déjà présent est simplement « touché ».
    pub async fn admit(&self, item: Arc<MediaItem>) -> bool {
        let mut state = self.state.lock().await;

        if let Some(index) = state.position(item.path()) {
            tracing::debug!("'{}' already cached, touching", item.title());
            move_to_tail(&mut state, index);
            self.save_manifest(&state);
            return true;
        }

        if state.entries.len() >= self.capacity && !self.evict_locked(&mut state).await {
            tracing::warn!(
                "Cannot admit '{}': cache full ({} entries) and nothing evictable",
                item.title(),
                self.capacity
            );
            return false;
        }

        tracing::info!(
            "Admitted '{}' ({}) into media cache",
            item.title(),
            item.path().display()
        );
        state.entries.push_back(item);
        self.save_manifest(&state);
        true
    }

    /// Comme [`MediaCache::admit`], mais en erreur typée
    pub async fn try_admit(&self, item: Arc<MediaItem>) -> Result<()> {
        if self.admit(item).await {
            Ok(())
        } else {
            Err(CacheError::CapacityExceeded {
                capacity: self.capacity,
            })
        }
    }

    /// Évince l'élément déverrouillé le moins récemment utilisé
    ///
    /// Retourne `false` si le cache est vide ou si tous les éléments sont
    /// verrouillés.
    pub async fn evict_oldest(&self) -> bool {
        let mut state = self.state.lock().await;
        let evicted = self.evict_locked(&mut state).await;
        if evicted {
            self.save_manifest(&state);
        }
        evicted
    }

    /// Libère une place si le cache est plein
    ///
    /// Appelée avant un téléchargement pour échouer tôt ; l'admission reste
    /// vérifiée après coup.
    pub async fn ensure_room(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.entries.len() < self.capacity {
            return true;
        }
        let evicted = self.evict_locked(&mut state).await;
        if evicted {
            self.save_manifest(&state);
        }
        evicted
    }

    /// Marque un élément comme le plus récemment utilisé
    pub async fn touch(&self, item: &MediaItem) {
        let mut state = self.state.lock().await;
        if let Some(index) = state.position(item.path()) {
            if index + 1 != state.entries.len() {
                move_to_tail(&mut state, index);
                self.save_manifest(&state);
            }
        }
    }

    /// Retire explicitement un élément et supprime son fichier
    ///
    /// Refusé (retourne `false`) si l'élément est verrouillé ou absent.
    pub async fn remove(&self, item: &MediaItem) -> bool {
        let mut state = self.state.lock().await;

        if state.locked.contains(item.path()) {
            tracing::debug!("Not removing locked entry {}", item.path().display());
            return false;
        }

        let Some(index) = state.position(item.path()) else {
            return false;
        };

        if let Some(removed) = state.entries.remove(index) {
            tracing::info!("Removed '{}' from media cache", removed.title());
            delete_file(removed.path()).await;
        }
        self.save_manifest(&state);
        true
    }

    /// Supprime un fichier préparé mais jamais admis
    ///
    /// Sans effet sur un chemin présent dans le cache.
    pub async fn discard(&self, path: &Path) {
        let state = self.state.lock().await;
        if state.position(path).is_some() {
            tracing::warn!("Refusing to discard cached file {}", path.display());
            return;
        }
        delete_file(path).await;
    }

    /// Éviction sous le verrou : première entrée déverrouillée depuis la tête
    async fn evict_locked(&self, state: &mut CacheState) -> bool {
        let Some(index) = state
            .entries
            .iter()
            .position(|item| !state.locked.contains(item.path()))
        else {
            return false;
        };

        if index > 0 {
            tracing::debug!("Skipping {} locked entries during eviction", index);
        }

        match state.entries.remove(index) {
            Some(evicted) => {
                tracing::info!(
                    "LRU eviction: removed '{}' ({})",
                    evicted.title(),
                    evicted.path().display()
                );
                delete_file(evicted.path()).await;
                true
            }
            None => false,
        }
    }

    fn save_manifest(&self, state: &CacheState) {
        if let Some(store) = &self.manifest {
            write_manifest(store, state);
        }
    }
}

fn write_manifest(store: &JsonStore, state: &CacheState) {
    let records: Vec<MediaRecord> = state.entries.iter().map(|item| item.to_record()).collect();
    if let Err(e) = store.save_as(MANIFEST_KEY, &records) {
        tracing::warn!("Failed to write cache manifest: {}", e);
    }
}

fn move_to_tail(state: &mut CacheState, index: usize) {
    if let Some(item) = state.entries.remove(index) {
        state.entries.push_back(item);
    }
}

/// Suppression d'un fichier, absence tolérée
async fn delete_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("{}", CacheError::FileMissing(path.to_path_buf()));
        }
        Err(e) => {
            tracing::warn!("Failed to delete {}: {}", path.display(), e);
        }
    }
}

fn remove_backing_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() == std::io::ErrorKind::NotFound {
            tracing::warn!("{}", CacheError::FileMissing(path.to_path_buf()));
        } else {
            tracing::warn!("Failed to delete {}: {}", path.display(), e);
        }
    }
}
