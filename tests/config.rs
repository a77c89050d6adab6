use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use osdr_explorer::config::{
    Config, ConfigLoader, DEFAULT_INSIGHT_MODEL, DEFAULT_PAGE_SIZE, SearchTransport,
};
use osdr_explorer::error::OsdrError;

use assert_matches::assert_matches;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn explicit_file_overrides_defaults() {
    let file = write_config(
        r#"{
            "schema_version": 1,
            "osdr": {"origin": "http://localhost:8080/", "transport": "get", "timeout_secs": 30},
            "insight": {"api_key": "test-key"},
            "search": {"page_size": 25}
        }"#,
    );
    let resolved = ConfigLoader::resolve(file.path().to_str()).unwrap();

    assert_eq!(resolved.source.as_deref().map(|p| p.as_std_path()), Some(file.path()));
    assert_eq!(resolved.osdr.transport, SearchTransport::Get);
    assert!(resolved.osdr.search_url.starts_with("http://localhost:8080/"));
    assert_eq!(resolved.osdr.timeout, Some(Duration::from_secs(30)));
    assert_eq!(resolved.insight.api_key.as_deref(), Some("test-key"));
    assert_eq!(resolved.insight.model, DEFAULT_INSIGHT_MODEL);
    assert_eq!(resolved.search.page_size, 25);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(OsdrError::ConfigRead(ref p)) if p == &path
    );
}

#[test]
fn malformed_file_is_a_parse_error() {
    let file = write_config("{not json");
    assert_matches!(
        ConfigLoader::resolve(file.path().to_str()),
        Err(OsdrError::ConfigParse(_))
    );
}

#[test]
fn unknown_transport_is_rejected() {
    let file = write_config(r#"{"osdr": {"transport": "websocket"}}"#);
    assert_matches!(
        ConfigLoader::resolve(file.path().to_str()),
        Err(OsdrError::InvalidTransport(ref t)) if t == "websocket"
    );
}

#[test]
fn api_key_falls_back_to_environment() {
    let resolved = ConfigLoader::resolve_with_env(Config::default(), |name| {
        (name == "GOOGLE_API_KEY").then(|| "from-env".to_string())
    })
    .unwrap();
    assert_eq!(resolved.insight.api_key.as_deref(), Some("from-env"));
    assert_eq!(resolved.search.page_size, DEFAULT_PAGE_SIZE);
}
