use pmocache::{CacheError, MediaCache};
use pmometadata::{MediaItem, SourceKind};
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_cache(capacity: usize) -> (TempDir, MediaCache) {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache = MediaCache::new(temp_dir.path(), capacity).unwrap();
    (temp_dir, cache)
}

/// Crée un fichier dans le cache et l'élément correspondant
fn make_item(cache: &MediaCache, name: &str, duration: u64) -> Arc<MediaItem> {
    let path = cache.cache_dir().join(format!("{}.opus", name));
    std::fs::write(&path, name.as_bytes()).unwrap();
    Arc::new(MediaItem::new(
        name.to_uppercase(),
        SourceKind::ServiceA,
        name,
        path,
        duration,
    ))
}

fn titles(items: &[Arc<MediaItem>]) -> Vec<String> {
    items.iter().map(|item| item.title().to_string()).collect()
}

#[tokio::test]
async fn test_cache_creation() {
    let (temp_dir, cache) = create_test_cache(10);
    assert_eq!(cache.cache_dir(), temp_dir.path());
    assert_eq!(cache.capacity(), 10);
    assert!(cache.is_empty().await);
    assert!(!cache.is_full().await);
}

#[tokio::test]
async fn test_admit_until_full_then_evict_oldest() {
    let (_temp_dir, cache) = create_test_cache(2);

    let a = make_item(&cache, "a", 100);
    let b = make_item(&cache, "b", 200);
    assert!(cache.admit(a.clone()).await);
    assert!(cache.admit(b.clone()).await);
    assert!(cache.is_full().await);
    assert_eq!(titles(&cache.snapshot().await), vec!["A", "B"]);

    // C force l'éviction de A (le moins récent)
    let c = make_item(&cache, "c", 50);
    assert!(cache.admit(c.clone()).await);
    assert_eq!(titles(&cache.snapshot().await), vec!["B", "C"]);
    assert!(!a.path().exists());
    assert!(b.path().exists());
    assert!(c.path().exists());
}

#[tokio::test]
async fn test_size_never_exceeds_capacity() {
    let (_temp_dir, cache) = create_test_cache(3);

    for i in 0..10 {
        let item = make_item(&cache, &format!("t{}", i), 10);
        assert!(cache.admit(item).await);
        assert!(cache.len().await <= cache.capacity());
    }

    // Exactement une éviction par admission au-delà de la capacité
    let remaining: Vec<String> = titles(&cache.snapshot().await);
    assert_eq!(remaining, vec!["T7", "T8", "T9"]);
    let files = std::fs::read_dir(cache.cache_dir()).unwrap().count();
    assert_eq!(files, 3);
}

#[tokio::test]
async fn test_touch_changes_recency() {
    let (_temp_dir, cache) = create_test_cache(2);

    let a = make_item(&cache, "a", 100);
    let b = make_item(&cache, "b", 200);
    cache.admit(a.clone()).await;
    cache.admit(b.clone()).await;

    cache.touch(&a).await;
    assert_eq!(titles(&cache.snapshot().await), vec!["B", "A"]);

    let c = make_item(&cache, "c", 50);
    assert!(cache.admit(c).await);
    assert_eq!(titles(&cache.snapshot().await), vec!["A", "C"]);
    assert!(!b.path().exists());
}

#[tokio::test]
async fn test_admit_same_path_touches() {
    let (_temp_dir, cache) = create_test_cache(3);

    let a = make_item(&cache, "a", 100);
    let b = make_item(&cache, "b", 200);
    cache.admit(a.clone()).await;
    cache.admit(b).await;
    assert!(cache.admit(a.clone()).await);

    assert_eq!(cache.len().await, 2);
    assert_eq!(titles(&cache.snapshot().await), vec!["B", "A"]);
}

#[tokio::test]
async fn test_find_by_source() {
    let (_temp_dir, cache) = create_test_cache(3);

    let a = make_item(&cache, "a", 100);
    cache.admit(a.clone()).await;

    let found = cache.find_by_source(SourceKind::ServiceA, "a").await.unwrap();
    assert_eq!(found.path(), a.path());
    assert!(cache.find_by_source(SourceKind::ServiceB, "a").await.is_none());
    assert!(cache.get(a.path()).await.is_some());
}

#[tokio::test]
async fn test_remove_deletes_file() {
    let (_temp_dir, cache) = create_test_cache(3);

    let a = make_item(&cache, "a", 100);
    cache.admit(a.clone()).await;

    assert!(cache.remove(&a).await);
    assert!(!a.path().exists());
    assert!(!cache.contains(a.path()).await);

    // Déjà retiré
    assert!(!cache.remove(&a).await);
}

#[tokio::test]
async fn test_eviction_tolerates_missing_file() {
    let (_temp_dir, cache) = create_test_cache(1);

    let a = make_item(&cache, "a", 100);
    cache.admit(a.clone()).await;
    std::fs::remove_file(a.path()).unwrap();

    // Le fichier a disparu : l'éviction se fait quand même
    let b = make_item(&cache, "b", 100);
    assert!(cache.admit(b).await);
    assert_eq!(titles(&cache.snapshot().await), vec!["B"]);
}

#[tokio::test]
async fn test_evict_empty_cache() {
    let (_temp_dir, cache) = create_test_cache(1);
    assert!(!cache.evict_oldest().await);
}

#[tokio::test]
async fn test_discard_staged_file() {
    let (_temp_dir, cache) = create_test_cache(1);

    let a = make_item(&cache, "a", 100);
    cache.admit(a.clone()).await;
    cache.lock(&a).await;

    let b = make_item(&cache, "b", 100);
    assert!(matches!(
        cache.try_admit(b.clone()).await,
        Err(CacheError::CapacityExceeded { capacity: 1 })
    ));

    // Rollback du fichier préparé
    cache.discard(b.path()).await;
    assert!(!b.path().exists());

    // Un fichier du cache n'est jamais supprimé par discard
    cache.discard(a.path()).await;
    assert!(a.path().exists());
}
