use super::*;

#[test]
fn test_defaults_match_pipeline_contract() {
    let config = Config::default();
    assert_eq!(config.ingestion.max_retries, 3);
    assert_eq!(config.ingestion.retry_delay_ms, 1000);
    assert_eq!(config.database.figure_policy, FigurePolicy::MergeByLabel);
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = Config::from_toml_str(
        r#"
        [database]
        url = "sqlite::memory:"
        figure_policy = "replace_all"

        [ingestion]
        max_retries = 5
        "#,
    )
    .unwrap();
    assert_eq!(config.database.url, "sqlite::memory:");
    assert_eq!(config.database.figure_policy, FigurePolicy::ReplaceAll);
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.ingestion.max_retries, 5);
    assert_eq!(config.ingestion.retry_delay_ms, 1000);
    assert!(config.api.bioc_base_url.ends_with("pmcoa.cgi"));
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.ingestion.watch_folder, "data/watch");
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("figura.toml");
    std::fs::write(&path, "[api]\nemail = \"lab@example.org\"\n").unwrap();
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.api.email.as_deref(), Some("lab@example.org"));
}

#[test]
fn test_env_override_ncbi_key() {
    let mut config = Config::default();
    config.apply_env_overrides(|key| {
        (key == "NCBI_API_KEY").then(|| "secret-key".to_string())
    });
    assert_eq!(config.api.ncbi_api_key.as_deref(), Some("secret-key"));

    let mut untouched = Config::default();
    untouched.apply_env_overrides(|_| Some(String::new()));
    assert!(untouched.api.ncbi_api_key.is_none());
}

#[test]
fn test_invalid_toml_is_error() {
    assert!(Config::from_toml_str("[database\nurl = 1").is_err());
}

#[test]
fn test_example_config_parses() {
    let config = Config::from_toml_str(include_str!("../../../../figura.example.toml")).unwrap();
    let defaults = Config::default();
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.api.idconv_url, defaults.api.idconv_url);
    assert_eq!(config.ingestion.watch_interval_secs, defaults.ingestion.watch_interval_secs);
    assert_eq!(config.api.ncbi_api_key, None);
}
