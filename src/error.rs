use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OsdrError {
    #[error("invalid OSDR accession: {0}")]
    InvalidAccession(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid search transport: {0} (expected `post` or `get`)")]
    InvalidTransport(String),

    #[error("search request failed: {0}")]
    SearchHttp(String),

    #[error("Failed to search studies. Status: {status}")]
    SearchStatus { status: u16, message: String },

    #[error("unexpected search response: {0}")]
    InvalidSearchResponse(String),

    #[error("metadata request failed: {0}")]
    MetadataHttp(String),

    #[error("metadata endpoint returned status {status}: {message}")]
    MetadataStatus { status: u16, message: String },

    #[error("files request failed: {0}")]
    FilesHttp(String),

    #[error("files endpoint returned status {status}: {message}")]
    FilesStatus { status: u16, message: String },

    #[error("invalid data structure received from NASA OSDR for {0}")]
    InvalidDataStructure(String),

    #[error("insight request failed: {0}")]
    InsightHttp(String),

    #[error("insight model returned status {status}: {message}")]
    InsightStatus { status: u16, message: String },

    #[error("insight model returned an unusable response: {0}")]
    InsightResponse(String),

    #[error("no API key for the insight model (set GEMINI_API_KEY or insight.api_key)")]
    MissingApiKey,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("concurrent request aborted: {0}")]
    Join(String),
}

impl OsdrError {
    /// True for failures that originate in an upstream service rather than in
    /// caller input or local configuration.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            OsdrError::SearchHttp(_)
                | OsdrError::SearchStatus { .. }
                | OsdrError::InvalidSearchResponse(_)
                | OsdrError::MetadataHttp(_)
                | OsdrError::MetadataStatus { .. }
                | OsdrError::FilesHttp(_)
                | OsdrError::FilesStatus { .. }
                | OsdrError::InvalidDataStructure(_)
                | OsdrError::InsightHttp(_)
                | OsdrError::InsightStatus { .. }
                | OsdrError::InsightResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_status_message_includes_code() {
        let err = OsdrError::SearchStatus {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to search studies. Status: 503");
        assert!(err.is_upstream());
    }

    #[test]
    fn input_errors_are_not_upstream() {
        assert!(!OsdrError::InvalidAccession("x".to_string()).is_upstream());
        assert!(!OsdrError::MissingApiKey.is_upstream());
    }
}
