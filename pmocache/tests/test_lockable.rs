use pmocache::MediaCache;
use pmometadata::{MediaItem, SourceKind};
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_cache(capacity: usize) -> (TempDir, MediaCache) {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache = MediaCache::new(temp_dir.path(), capacity).unwrap();
    (temp_dir, cache)
}

fn make_item(cache: &MediaCache, name: &str) -> Arc<MediaItem> {
    let path = cache.cache_dir().join(format!("{}.mp3", name));
    std::fs::write(&path, name.as_bytes()).unwrap();
    Arc::new(MediaItem::new(name, SourceKind::ServiceB, name, path, 120))
}

#[tokio::test]
async fn test_lock_unlock() {
    let (_temp_dir, cache) = create_test_cache(10);
    let a = make_item(&cache, "a");
    cache.admit(a.clone()).await;

    // Non verrouillé par défaut
    assert!(!cache.is_locked(&a).await);

    cache.lock(&a).await;
    cache.lock(&a).await;
    assert!(cache.is_locked(&a).await);

    // Un seul unlock suffit : pas de comptage des détenteurs
    cache.unlock(&a).await;
    assert!(!cache.is_locked(&a).await);

    // Sans effet si non verrouillé
    cache.unlock(&a).await;
    assert!(!cache.is_locked(&a).await);
}

#[tokio::test]
async fn test_locked_head_is_skipped() {
    let (_temp_dir, cache) = create_test_cache(2);

    let a = make_item(&cache, "a");
    let b = make_item(&cache, "b");
    cache.admit(a.clone()).await;
    cache.admit(b.clone()).await;
    cache.lock(&a).await;

    // A est le plus ancien mais verrouillé : B est évincé à sa place
    let c = make_item(&cache, "c");
    assert!(cache.admit(c.clone()).await);

    assert!(cache.contains(a.path()).await);
    assert!(a.path().exists());
    assert!(!cache.contains(b.path()).await);
    assert!(!b.path().exists());
    assert!(cache.contains(c.path()).await);
}

#[tokio::test]
async fn test_all_locked_rejects_admission() {
    let (_temp_dir, cache) = create_test_cache(2);

    let a = make_item(&cache, "a");
    let b = make_item(&cache, "b");
    cache.admit(a.clone()).await;
    cache.admit(b.clone()).await;
    cache.lock(&a).await;
    cache.lock(&b).await;

    let c = make_item(&cache, "c");
    assert!(!cache.admit(c.clone()).await);
    assert!(!cache.evict_oldest().await);
    assert!(!cache.ensure_room().await);
    assert_eq!(cache.len().await, 2);

    // Le cache ne touche pas au fichier refusé : c'est à l'appelant d'annuler
    assert!(c.path().exists());

    cache.unlock(&b).await;
    assert!(cache.admit(c.clone()).await);
    assert!(!b.path().exists());
    assert!(a.path().exists());
}

#[tokio::test]
async fn test_locked_item_cannot_be_removed() {
    let (_temp_dir, cache) = create_test_cache(2);

    let a = make_item(&cache, "a");
    cache.admit(a.clone()).await;
    cache.lock(&a).await;

    assert!(!cache.remove(&a).await);
    assert!(a.path().exists());

    cache.unlock(&a).await;
    assert!(cache.remove(&a).await);
    assert!(!a.path().exists());
}

#[tokio::test]
async fn test_lock_before_admission_protects_download() {
    let (_temp_dir, cache) = create_test_cache(1);

    // Verrou posé pendant le téléchargement, avant l'admission
    let a = make_item(&cache, "a");
    cache.lock(&a).await;
    assert!(cache.admit(a.clone()).await);

    let b = make_item(&cache, "b");
    assert!(!cache.admit(b).await);
    assert!(cache.contains(a.path()).await);
}

#[tokio::test]
async fn test_locked_never_evicted_for_any_state() {
    // Pour chaque position du verrou, l'éviction ne retire jamais l'élément verrouillé
    for locked_index in 0..4 {
        let (_temp_dir, cache) = create_test_cache(4);
        let items: Vec<_> = (0..4)
            .map(|i| make_item(&cache, &format!("i{}", i)))
            .collect();
        for item in &items {
            cache.admit(item.clone()).await;
        }
        cache.lock(&items[locked_index]).await;

        while cache.evict_oldest().await {}

        assert_eq!(cache.len().await, 1);
        assert!(cache.contains(items[locked_index].path()).await);
    }
}

#[tokio::test]
async fn test_concurrent_admissions_respect_capacity() {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(MediaCache::new(temp_dir.path(), 5).unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let cache = cache.clone();
        let item = make_item(&cache, &format!("c{}", i));
        handles.push(tokio::spawn(async move { cache.admit(item).await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(cache.len().await, 5);
    let files = std::fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(files, 5);
}
