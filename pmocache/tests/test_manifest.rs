use pmocache::{CacheError, MANIFEST_KEY, MediaCache};
use pmometadata::{MediaItem, SourceKind};
use std::path::Path;
use std::sync::Arc;

fn make_item(dir: &Path, name: &str) -> Arc<MediaItem> {
    let path = dir.join(format!("{}.ogg", name));
    std::fs::write(&path, name.as_bytes()).unwrap();
    Arc::new(MediaItem::new(name, SourceKind::ServiceC, name, path, 30))
}

fn titles(items: &[Arc<MediaItem>]) -> Vec<String> {
    items.iter().map(|item| item.title().to_string()).collect()
}

#[tokio::test]
async fn test_manifest_restores_recency_order() {
    let temp_dir = tempfile::tempdir().unwrap();

    {
        let cache = MediaCache::open(temp_dir.path(), 3).unwrap();
        let a = make_item(temp_dir.path(), "a");
        let b = make_item(temp_dir.path(), "b");
        let c = make_item(temp_dir.path(), "c");
        cache.admit(a.clone()).await;
        cache.admit(b).await;
        cache.admit(c).await;
        cache.touch(&a).await;
    }

    let manifest = temp_dir.path().join(format!("{}.json", MANIFEST_KEY));
    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&manifest).unwrap()).unwrap();
    assert_eq!(json[0]["title"], "b");
    assert_eq!(json[0]["sourceKind"], "service_c");

    let cache = MediaCache::open(temp_dir.path(), 3).unwrap();
    assert_eq!(titles(&cache.snapshot().await), vec!["b", "c", "a"]);
}

#[tokio::test]
async fn test_open_consolidates() {
    let temp_dir = tempfile::tempdir().unwrap();

    {
        let cache = MediaCache::open(temp_dir.path(), 3).unwrap();
        cache.admit(make_item(temp_dir.path(), "a")).await;
        cache.admit(make_item(temp_dir.path(), "b")).await;
    }

    // Fichier disparu, fichier orphelin et téléchargement interrompu
    std::fs::remove_file(temp_dir.path().join("a.ogg")).unwrap();
    std::fs::write(temp_dir.path().join("stray.ogg"), b"x").unwrap();
    std::fs::write(temp_dir.path().join("0123.part"), b"partial").unwrap();

    let cache = MediaCache::open(temp_dir.path(), 3).unwrap();
    assert_eq!(titles(&cache.snapshot().await), vec!["b"]);
    assert!(!temp_dir.path().join("stray.ogg").exists());
    assert!(!temp_dir.path().join("0123.part").exists());
    assert!(temp_dir.path().join("b.ogg").exists());
}

#[tokio::test]
async fn test_open_with_smaller_capacity_evicts_oldest() {
    let temp_dir = tempfile::tempdir().unwrap();

    {
        let cache = MediaCache::open(temp_dir.path(), 3).unwrap();
        for name in ["a", "b", "c"] {
            cache.admit(make_item(temp_dir.path(), name)).await;
        }
    }

    let cache = MediaCache::open(temp_dir.path(), 2).unwrap();
    assert_eq!(titles(&cache.snapshot().await), vec!["b", "c"]);
    assert!(!temp_dir.path().join("a.ogg").exists());
}

#[tokio::test]
async fn test_corrupt_manifest_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        temp_dir.path().join(format!("{}.json", MANIFEST_KEY)),
        b"[{\"title\": 12}]",
    )
    .unwrap();

    assert!(matches!(
        MediaCache::open(temp_dir.path(), 3),
        Err(CacheError::Store(_))
    ));
}
