use pmoutils::{JsonStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sample {
    id: u64,
    name: String,
}

fn create_store() -> (tempfile::TempDir, JsonStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = JsonStore::new(temp_dir.path().join("records")).unwrap();
    (temp_dir, store)
}

#[test]
fn test_save_and_load_value() {
    let (_temp_dir, store) = create_store();

    let value = json!({"id": 7, "queue": [1, 2, 3]});
    store.save("group_7", &value).unwrap();

    assert_eq!(store.load("group_7").unwrap(), value);
    assert_eq!(store.keys().unwrap(), vec!["group_7".to_string()]);
}

#[test]
fn test_missing_record() {
    let (_temp_dir, store) = create_store();

    let err = store.load("nothing").unwrap_err();
    assert!(err.is_missing());
    assert!(!store.delete("nothing").unwrap());
}

#[test]
fn test_corrupt_record_is_surfaced() {
    let (_temp_dir, store) = create_store();

    std::fs::write(store.path_for("broken"), b"{ not json").unwrap();
    assert!(matches!(
        store.load("broken"),
        Err(StoreError::Corrupt { .. })
    ));

    // JSON valide mais de mauvaise forme
    std::fs::write(store.path_for("shape"), br#"{"id": "seven"}"#).unwrap();
    assert!(matches!(
        store.load_as::<Sample>("shape"),
        Err(StoreError::Corrupt { .. })
    ));
}

#[test]
fn test_typed_round_trip_and_delete() {
    let (_temp_dir, store) = create_store();

    let sample = Sample {
        id: 42,
        name: "Salon".to_string(),
    };
    store.save_as("sample", &sample).unwrap();
    assert_eq!(store.load_as::<Sample>("sample").unwrap(), sample);

    assert!(store.delete("sample").unwrap());
    assert!(store.load_as::<Sample>("sample").unwrap_err().is_missing());
}

#[test]
fn test_keys_stay_in_store_dir() {
    let (_temp_dir, store) = create_store();

    store.save("../escape/attempt", &json!({})).unwrap();
    let path = store.path_for("../escape/attempt");
    assert_eq!(path.parent().unwrap(), store.dir());
    assert!(path.exists());
    assert_eq!(store.keys().unwrap(), vec!["../escape/attempt"]);
}

#[test]
fn test_similar_keys_do_not_collide() {
    let (_temp_dir, store) = create_store();

    store.save("group_a/b", &json!({"id": "a/b"})).unwrap();
    store.save("group_a_b", &json!({"id": "a_b"})).unwrap();

    assert_ne!(store.path_for("group_a/b"), store.path_for("group_a_b"));
    assert_eq!(store.load("group_a/b").unwrap(), json!({"id": "a/b"}));
    assert_eq!(store.load("group_a_b").unwrap(), json!({"id": "a_b"}));
    assert_eq!(store.keys().unwrap(), vec!["group_a/b", "group_a_b"]);
}
