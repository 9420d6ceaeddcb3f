use deductive_store::{ConfigError, DataStore, EqualityMode, StoreConfig, StoreError};
use std::collections::HashMap;
use std::io::Write;

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "equality: UNA").unwrap();
    writeln!(file, "threads: 2").unwrap();
    writeln!(file, "default-window-size: 64").unwrap();

    let config = StoreConfig::from_file(file.path()).unwrap();
    assert_eq!(config.equality, EqualityMode::Una);
    assert_eq!(config.threads, 2);
    assert_eq!(config.default_window_size, 64);

    let store = DataStore::new(config.clone()).unwrap();
    assert_eq!(store.config(), &config);
}

#[test]
fn test_missing_or_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        StoreConfig::from_file(dir.path().join("missing.yaml")),
        Err(ConfigError::Io(_))
    ));
    assert!(matches!(
        StoreConfig::from_yaml_str("equality: sometimes\n"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        StoreConfig::from_yaml_str("threads: [1, 2]\n"),
        Err(ConfigError::Yaml(_))
    ));
}

#[test]
fn test_yaml_round_trip_uses_kebab_case() {
    let config = StoreConfig::default().with_equality(EqualityMode::NoUna).with_threads(3);
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(yaml.contains("default-window-size"));
    assert!(yaml.contains("noUNA"));
    assert_eq!(StoreConfig::from_yaml_str(&yaml).unwrap(), config);
}

#[test]
fn test_parameters() {
    let parameters: HashMap<String, String> = [("equality", "noUNA"), ("threads", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = StoreConfig::from_parameters(&parameters).unwrap();
    assert_eq!(config.equality, EqualityMode::NoUna);
    assert_eq!(config.threads, 1);

    for (key, value) in [("equality", "maybe"), ("threads", "many"), ("window-size", "0"), ("colour", "red")] {
        let mut parameters = HashMap::new();
        parameters.insert(key.to_string(), value.to_string());
        assert!(
            matches!(
                StoreConfig::from_parameters(&parameters),
                Err(ConfigError::InvalidParameter { .. })
            ),
            "{}={}",
            key,
            value
        );
    }
}

#[test]
fn test_config_errors_convert_into_store_errors() {
    let error: StoreError = StoreConfig::from_yaml_str("default-window-size: 0")
        .unwrap_err()
        .into();
    assert!(matches!(error, StoreError::Config(ConfigError::InvalidParameter { .. })));
}
