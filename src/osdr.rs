use std::time::Instant;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::config::{OsdrSettings, SearchTransport};
use crate::error::OsdrError;
use crate::normalize::SearchResponse;
use crate::query::SearchQuery;

pub trait OsdrClient: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse, OsdrError>;
    fn fetch_metadata(&self, study_id: &str) -> Result<Value, OsdrError>;
    fn fetch_files(&self, study_id: &str) -> Result<Value, OsdrError>;
    /// Origin that relative file URLs are resolved against.
    fn origin(&self) -> &str;
}

#[derive(Clone)]
pub struct OsdrHttpClient {
    client: Client,
    settings: OsdrSettings,
}

impl OsdrHttpClient {
    pub fn new(settings: OsdrSettings) -> Result<Self, OsdrError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("osdr-explorer/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| OsdrError::SearchHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| OsdrError::SearchHttp(err.to_string()))?;

        Ok(Self { client, settings })
    }

    fn search_request(&self, query: &SearchQuery) -> Result<RequestBuilder, OsdrError> {
        let url = &self.settings.search_url;
        let mut params = Vec::new();
        if !self.settings.data_sources.is_empty() {
            params.push(("type", self.settings.data_sources.join(",")));
        }
        let request = match self.settings.transport {
            SearchTransport::Post => self.client.post(url).query(&params).json(query),
            SearchTransport::Get => {
                params.push(("source", query.to_query_param()?));
                params.push(("source_content_type", "application/json".to_string()));
                self.client.get(url).query(&params)
            }
        };
        Ok(request)
    }

    fn get_json<E, S>(&self, url: &str, http_err: E, status_err: S) -> Result<Value, OsdrError>
    where
        E: Fn(String) -> OsdrError,
        S: Fn(u16, String) -> OsdrError,
    {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| http_err(err.to_string()))?;
        tracing::debug!(
            url,
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "osdr.response"
        );
        let response = handle_status(response, &status_err)?;
        response.json().map_err(|err| http_err(err.to_string()))
    }
}

impl OsdrClient for OsdrHttpClient {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse, OsdrError> {
        let start = Instant::now();
        let response = self
            .search_request(query)?
            .send()
            .map_err(|err| OsdrError::SearchHttp(err.to_string()))?;
        tracing::debug!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "osdr.search"
        );
        let response = handle_status(response, &|status, message| OsdrError::SearchStatus {
            status,
            message,
        })?;
        let raw: Value = response
            .json()
            .map_err(|err| OsdrError::SearchHttp(err.to_string()))?;
        SearchResponse::from_json(raw)
    }

    fn fetch_metadata(&self, study_id: &str) -> Result<Value, OsdrError> {
        let url = endpoint_url(&self.settings.metadata_url, study_id);
        self.get_json(&url, OsdrError::MetadataHttp, |status, message| {
            OsdrError::MetadataStatus { status, message }
        })
    }

    fn fetch_files(&self, study_id: &str) -> Result<Value, OsdrError> {
        let url = endpoint_url(&self.settings.files_url, study_id);
        self.get_json(&url, OsdrError::FilesHttp, |status, message| {
            OsdrError::FilesStatus { status, message }
        })
    }

    fn origin(&self) -> &str {
        &self.settings.origin
    }
}

fn handle_status<S>(response: Response, status_err: &S) -> Result<Response, OsdrError>
where
    S: Fn(u16, String) -> OsdrError,
{
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "NASA OSDR request failed".to_string());
    tracing::error!(status, body = %message, "NASA OSDR API error");
    Err(status_err(status, message))
}

pub fn endpoint_url(base: &str, study_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), study_id)
}
