use pmoconfig::Config;
use serde_yaml::Value;
use std::path::Path;

fn load(dir: &Path) -> Config {
    Config::load_config(dir.to_str().unwrap()).unwrap()
}

#[test]
fn test_load_writes_merged_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = load(temp_dir.path());

    assert_eq!(config.dir(), temp_dir.path().to_str().unwrap());
    assert!(temp_dir.path().join("config.yaml").exists());
    assert_eq!(config.get_log_min_level().unwrap(), "INFO");
    assert!(config.get_log_enable_console().unwrap());
    assert_eq!(config.get_source_timeout_secs().unwrap(), 30);
}

#[test]
fn test_external_file_overrides_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        temp_dir.path().join("config.yaml"),
        "Host:\n  Logger:\n    Min_Level: DEBUG\n",
    )
    .unwrap();

    let config = load(temp_dir.path());
    assert_eq!(config.get_log_min_level().unwrap(), "DEBUG");
    // Les autres clés viennent de la configuration intégrée
    assert!(config.get_log_enable_console().unwrap());
}

#[test]
fn test_set_value_persists() {
    let temp_dir = tempfile::tempdir().unwrap();
    {
        let config = load(temp_dir.path());
        config.set_source_timeout_secs(5).unwrap();
        config.set_log_enable_console(false).unwrap();
    }

    let config = load(temp_dir.path());
    assert_eq!(config.get_source_timeout_secs().unwrap(), 5);
    assert!(!config.get_log_enable_console().unwrap());
}

#[test]
fn test_missing_path_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = load(temp_dir.path());
    assert!(config.get_value(&["no", "such", "key"]).is_err());
}

#[test]
fn test_managed_dir_is_relative_to_config_dir() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = load(temp_dir.path());

    let dir = config
        .get_managed_dir(&["sessions", "directory"], "sessions")
        .unwrap();
    assert_eq!(Path::new(&dir), temp_dir.path().join("sessions"));
    assert!(Path::new(&dir).is_dir());

    // Clé absente : la valeur par défaut est enregistrée
    let other = config
        .get_managed_dir(&["scratch", "directory"], "scratch")
        .unwrap();
    assert_eq!(Path::new(&other), temp_dir.path().join("scratch"));
    assert_eq!(
        config.get_value(&["scratch", "directory"]).unwrap(),
        Value::String("scratch".to_string())
    );
}

#[test]
fn test_env_override() {
    let temp_dir = tempfile::tempdir().unwrap();
    // Clé propre à ce test : les autres tests ne la lisent pas
    std::env::set_var("PMOBOT_CONFIG__ENVTEST__LIMIT", "7");

    let config = load(temp_dir.path());
    assert_eq!(
        config.get_value(&["envtest", "limit"]).unwrap(),
        Value::Number(7.into())
    );
}
