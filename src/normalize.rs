use serde::Deserialize;
use serde_json::Value;

use crate::domain::{SearchPage, Study};
use crate::error::OsdrError;

/// Raw body of the search endpoint. A body without `hits` is not a search
/// result.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub hits: HitsEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub total: Option<HitsTotal>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HitsTotal {
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_source")]
    pub source: Value,
}

impl SearchResponse {
    pub fn from_json(raw: Value) -> Result<Self, OsdrError> {
        serde_json::from_value(raw).map_err(|err| OsdrError::InvalidSearchResponse(err.to_string()))
    }
}

/// Maps hits to studies in response order. Hits whose source cannot be read
/// as a study, or that carry no accession, are dropped.
pub fn normalize(response: SearchResponse) -> SearchPage {
    let total = response.hits.total.map(|total| total.value).unwrap_or(0);
    let studies = response
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| match serde_json::from_value::<Study>(hit.source) {
            Ok(study) if !study.accession.trim().is_empty() => Some(study),
            Ok(_) => {
                tracing::warn!("dropping search hit without accession");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "dropping unreadable search hit");
                None
            }
        })
        .collect();

    SearchPage { studies, total }
}
