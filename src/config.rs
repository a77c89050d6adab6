use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::OsdrError;

pub const CONFIG_FILE_NAME: &str = "osdr-explorer.json";
pub const DEFAULT_ORIGIN: &str = "https://osdr.nasa.gov";
pub const DEFAULT_SEARCH_PATH: &str = "/osdr/data/search";
pub const DEFAULT_METADATA_PATH: &str = "/osdr/data/osd/meta";
pub const DEFAULT_FILES_PATH: &str = "/osdr/data/osd/files";
pub const DEFAULT_INSIGHT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_INSIGHT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub osdr: OsdrSection,
    #[serde(default)]
    pub insight: InsightSection,
    #[serde(default)]
    pub search: SearchSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OsdrSection {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub files_url: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub data_sources: Option<Vec<String>>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InsightSection {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SearchSection {
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// How the query document reaches the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTransport {
    Post,
    Get,
}

impl fmt::Display for SearchTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTransport::Post => write!(f, "post"),
            SearchTransport::Get => write!(f, "get"),
        }
    }
}

impl FromStr for SearchTransport {
    type Err = OsdrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(SearchTransport::Post),
            "get" => Ok(SearchTransport::Get),
            _ => Err(OsdrError::InvalidTransport(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsdrSettings {
    pub origin: String,
    pub search_url: String,
    pub metadata_url: String,
    pub files_url: String,
    pub transport: SearchTransport,
    pub data_sources: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Default for OsdrSettings {
    fn default() -> Self {
        Self::for_origin(DEFAULT_ORIGIN)
    }
}

impl OsdrSettings {
    /// Settings with every endpoint rooted at `origin`.
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        Self {
            search_url: format!("{origin}{DEFAULT_SEARCH_PATH}"),
            metadata_url: format!("{origin}{DEFAULT_METADATA_PATH}"),
            files_url: format!("{origin}{DEFAULT_FILES_PATH}"),
            origin,
            transport: SearchTransport::Post,
            data_sources: default_data_sources(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_INSIGHT_ENDPOINT.to_string(),
            model: DEFAULT_INSIGHT_MODEL.to_string(),
            api_key: None,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub page_size: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub source: Option<Utf8PathBuf>,
    pub osdr: OsdrSettings,
    pub insight: InsightSettings,
    pub search: SearchSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, OsdrError> {
        let config_path = match path {
            Some(path) => Some(Utf8PathBuf::from(path)),
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.as_std_path().exists()),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| OsdrError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| OsdrError::ConfigParse(err.to_string()))?;

        tracing::debug!(path = %config_path, "loaded config");
        let mut resolved = Self::resolve_config(config)?;
        resolved.source = Some(config_path);
        Ok(resolved)
    }

    /// Candidate config files in lookup order: the working directory, then the
    /// user's config directory.
    pub fn default_locations() -> Vec<Utf8PathBuf> {
        let mut locations = vec![Utf8PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(path) = BaseDirs::new().and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.config_dir().join("osdr-explorer").join("config.json"))
                .ok()
        }) {
            locations.push(path);
        }
        locations
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, OsdrError> {
        Self::resolve_with_env(config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with_env<F>(config: Config, env: F) -> Result<ResolvedConfig, OsdrError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let schema_version = config.schema_version.unwrap_or(1);

        let osdr_section = config.osdr;
        let mut osdr = OsdrSettings::for_origin(
            osdr_section.origin.as_deref().unwrap_or(DEFAULT_ORIGIN),
        );
        if let Some(url) = osdr_section.search_url {
            osdr.search_url = url;
        }
        if let Some(url) = osdr_section.metadata_url {
            osdr.metadata_url = url;
        }
        if let Some(url) = osdr_section.files_url {
            osdr.files_url = url;
        }
        if let Some(transport) = osdr_section.transport {
            osdr.transport = transport.parse()?;
        }
        if let Some(sources) = osdr_section.data_sources {
            osdr.data_sources = sources
                .into_iter()
                .map(|source| source.trim().to_string())
                .filter(|source| !source.is_empty())
                .collect();
        }
        osdr.timeout = osdr_section.timeout_secs.map(Duration::from_secs);

        let insight_section = config.insight;
        let api_key = insight_section
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .copied()
                    .filter_map(|name| env(name))
                    .find(|key| !key.trim().is_empty())
            })
            .map(|key| key.trim().to_string());
        let insight = InsightSettings {
            endpoint: insight_section
                .endpoint
                .unwrap_or_else(|| DEFAULT_INSIGHT_ENDPOINT.to_string()),
            model: insight_section
                .model
                .unwrap_or_else(|| DEFAULT_INSIGHT_MODEL.to_string()),
            api_key,
            timeout: insight_section.timeout_secs.map(Duration::from_secs),
        };

        let search = SearchSettings {
            page_size: config
                .search
                .page_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
        };

        Ok(ResolvedConfig {
            schema_version,
            source: None,
            osdr,
            insight,
            search,
        })
    }
}

pub fn default_data_sources() -> Vec<String> {
    vec!["cgene".to_string()]
}
