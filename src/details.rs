use serde_json::Value;

use crate::domain::{Accession, FullStudyDetails, StudyFile, StudyMetadata};
use crate::error::OsdrError;

/// Builds the detail view from the three raw payloads. Both payloads must be
/// keyed by the requested accession; otherwise nothing is returned.
pub fn assemble(
    accession: &Accession,
    metadata: Value,
    files: Value,
    summary: String,
    origin: &str,
) -> Result<FullStudyDetails, OsdrError> {
    let invalid = || OsdrError::InvalidDataStructure(accession.to_string());

    if reports_failure(&metadata) || reports_failure(&files) {
        return Err(invalid());
    }

    let metadata_entry = metadata
        .get("study")
        .and_then(|studies| studies.get(accession.as_str()))
        .filter(|entry| entry.is_object())
        .cloned()
        .ok_or_else(invalid)?;
    let files_entry = files
        .get("studies")
        .and_then(|studies| studies.get(accession.as_str()))
        .filter(|entry| entry.is_object())
        .ok_or_else(invalid)?;

    let metadata: StudyMetadata = serde_json::from_value(metadata_entry).map_err(|err| {
        tracing::warn!(%accession, error = %err, "unreadable study metadata");
        invalid()
    })?;

    let files = match files_entry.get("study_files") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value::<Vec<StudyFile>>(raw.clone()).map_err(|err| {
            tracing::warn!(%accession, error = %err, "unreadable study file list");
            invalid()
        })?,
    };
    let files = files
        .into_iter()
        .map(|mut file| {
            file.remote_url = absolutize_url(origin, &file.remote_url);
            file
        })
        .collect();

    Ok(FullStudyDetails {
        accession: accession.clone(),
        metadata,
        files,
        summary,
    })
}

fn reports_failure(payload: &Value) -> bool {
    payload.get("success").and_then(Value::as_bool) == Some(false)
}

/// Prefixes a relative download path with the API origin. Absolute URLs and
/// empty values pass through unchanged.
pub fn absolutize_url(origin: &str, url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() || trimmed.contains("://") {
        return trimmed.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if trimmed.starts_with('/') {
        format!("{origin}{trimmed}")
    } else {
        format!("{origin}/{trimmed}")
    }
}
