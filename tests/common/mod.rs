#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::Value;

use osdr_explorer::app::{App, ProgressEvent, ProgressSink};
use osdr_explorer::error::OsdrError;
use osdr_explorer::insight::InsightEngine;
use osdr_explorer::normalize::SearchResponse;
use osdr_explorer::osdr::OsdrClient;
use osdr_explorer::query::SearchQuery;

pub const ORIGIN: &str = "https://osdr.nasa.gov";

pub fn fixture(name: &str) -> Value {
    let raw = std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

pub type Calls = Arc<Mutex<Vec<String>>>;

/// OSDR double. `Err(status)` answers with that HTTP status; setting
/// `search_outage` makes later searches fail the same way.
pub struct MockOsdr {
    pub search: Result<Value, u16>,
    pub search_outage: Arc<Mutex<Option<u16>>>,
    pub metadata: Result<Value, u16>,
    pub files: Result<Value, u16>,
    pub calls: Calls,
    pub queries: Arc<Mutex<Vec<Value>>>,
}

impl Default for MockOsdr {
    fn default() -> Self {
        Self {
            search: Ok(fixture("search_microgravity.json")),
            search_outage: Arc::default(),
            metadata: Ok(fixture("metadata_osd87.json")),
            files: Ok(fixture("files_osd87.json")),
            calls: Calls::default(),
            queries: Arc::default(),
        }
    }
}

impl OsdrClient for MockOsdr {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse, OsdrError> {
        self.calls.lock().unwrap().push("search".to_string());
        self.queries
            .lock()
            .unwrap()
            .push(serde_json::to_value(query).unwrap());
        let outage = *self.search_outage.lock().unwrap();
        match (outage, &self.search) {
            (None, Ok(raw)) => SearchResponse::from_json(raw.clone()),
            (Some(status), _) | (None, &Err(status)) => Err(OsdrError::SearchStatus {
                status,
                message: "search unavailable".to_string(),
            }),
        }
    }

    fn fetch_metadata(&self, study_id: &str) -> Result<Value, OsdrError> {
        self.calls.lock().unwrap().push(format!("metadata:{study_id}"));
        match &self.metadata {
            Ok(raw) => Ok(raw.clone()),
            Err(status) => Err(OsdrError::MetadataStatus {
                status: *status,
                message: "metadata unavailable".to_string(),
            }),
        }
    }

    fn fetch_files(&self, study_id: &str) -> Result<Value, OsdrError> {
        self.calls.lock().unwrap().push(format!("files:{study_id}"));
        match &self.files {
            Ok(raw) => Ok(raw.clone()),
            Err(status) => Err(OsdrError::FilesStatus {
                status: *status,
                message: "files unavailable".to_string(),
            }),
        }
    }

    fn origin(&self) -> &str {
        ORIGIN
    }
}

/// Insight double. `Err(message)` fails with an upstream response error.
pub struct MockInsight {
    pub insight: Result<String, String>,
    pub summary: Result<String, String>,
    pub calls: Calls,
}

impl Default for MockInsight {
    fn default() -> Self {
        Self {
            insight: Ok("Microgravity alters lipid metabolism in mouse liver.".to_string()),
            summary: Ok("Arabidopsis seedlings grown on the ISS.".to_string()),
            calls: Calls::default(),
        }
    }
}

impl InsightEngine for MockInsight {
    fn generate_insight(&self, question: &str) -> Result<String, OsdrError> {
        self.calls.lock().unwrap().push(format!("insight:{question}"));
        self.insight.clone().map_err(OsdrError::InsightResponse)
    }

    fn summarize_study(&self, study_id: &str) -> Result<String, OsdrError> {
        self.calls.lock().unwrap().push(format!("summary:{study_id}"));
        self.summary.clone().map_err(OsdrError::InsightResponse)
    }

    fn answer_with_context(
        &self,
        question: &str,
        relevant_data: &str,
    ) -> Result<String, OsdrError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("answer:{question}"));
        Ok(format!("{question} -> {relevant_data}"))
    }
}

pub fn app(osdr: MockOsdr, insight: MockInsight) -> App<MockOsdr, MockInsight> {
    App::new(osdr, insight)
}
