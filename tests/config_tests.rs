use photo_display::config::Configuration;
use std::net::SocketAddr;
use std::path::PathBuf;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
bind-address: "127.0.0.1:9000"
public-url: "https://frame.example"
catalog-path: "/srv/photos/catalog.yaml"
settings-path: "/var/lib/photo-display/settings.yaml"
watch-catalog: false
shuffle-seed: 42
preload-limit: 8
"#;
    let cfg = Configuration::from_yaml_str(yaml).unwrap().validated().unwrap();
    assert_eq!(cfg.bind_address, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    assert_eq!(cfg.public_url.as_deref(), Some("https://frame.example"));
    assert_eq!(cfg.catalog_path, PathBuf::from("/srv/photos/catalog.yaml"));
    assert_eq!(
        cfg.settings_path,
        Some(PathBuf::from("/var/lib/photo-display/settings.yaml"))
    );
    assert!(!cfg.watch_catalog);
    assert_eq!(cfg.shuffle_seed, Some(42));
    assert_eq!(cfg.preload_limit, 8);
}

#[test]
fn empty_document_uses_defaults() {
    let cfg = Configuration::from_yaml_str("{}").unwrap().validated().unwrap();
    assert_eq!(cfg.bind_address, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    assert_eq!(cfg.catalog_path, PathBuf::from("catalog.yaml"));
    assert!(cfg.public_url.is_none());
    assert!(cfg.settings_path.is_none());
    assert!(cfg.watch_catalog);
    assert!(cfg.shuffle_seed.is_none());
    assert_eq!(cfg.preload_limit, 16);
}

#[test]
fn unknown_keys_are_rejected() {
    let err = Configuration::from_yaml_str("photo-library-path: /photos\n").unwrap_err();
    assert!(err.to_string().contains("unknown field"));
}

#[test]
fn zero_preload_limit_fails_validation() {
    let err = Configuration::from_yaml_str("preload-limit: 0\n")
        .unwrap()
        .validated()
        .unwrap_err();
    assert!(err.to_string().contains("preload-limit"));
}

#[test]
fn public_url_must_be_http() {
    let err = Configuration::from_yaml_str("public-url: frame.local\n")
        .unwrap()
        .validated()
        .unwrap_err();
    assert!(err.to_string().contains("public-url"));
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "catalog-path: photos.yaml\nshuffle-seed: 7\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.catalog_path, PathBuf::from("photos.yaml"));
    assert_eq!(cfg.shuffle_seed, Some(7));

    let missing = Configuration::from_yaml_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(missing.to_string().contains("failed to read"));
}
