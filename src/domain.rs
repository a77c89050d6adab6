use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::OsdrError;

pub const ACCESSION_PREFIX: &str = "OSD-";
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Category keywords offered by the search filters.
pub const FILTER_CATEGORIES: [&str; 6] = [
    "Genomics",
    "Proteomics",
    "Metabolomics",
    "Transcriptomics",
    "Microbiology",
    "Immunology",
];

fn accession_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:OSD-)?(\d+)$").expect("valid accession regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare numeric study id used by the metadata and files endpoints.
    pub fn study_id(&self) -> &str {
        self.0.strip_prefix(ACCESSION_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = OsdrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = accession_regex()
            .captures(value.trim())
            .ok_or_else(|| OsdrError::InvalidAccession(value.to_string()))?;
        Ok(Self(format!("{ACCESSION_PREFIX}{}", &captures[1])))
    }
}

impl<'de> Deserialize<'de> for Accession {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One search hit. Fields the UI relies on are typed; everything else the
/// search index returns is kept in `extra` under its original key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    #[serde(rename = "Accession", default, deserialize_with = "string_or_default")]
    pub accession: String,
    #[serde(rename = "Study Title", default, deserialize_with = "string_or_default")]
    pub title: String,
    #[serde(
        rename = "Study Description",
        default,
        deserialize_with = "string_or_default"
    )]
    pub description: String,
    #[serde(
        rename = "Last Modified",
        default,
        deserialize_with = "optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Study {
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified.as_deref().and_then(parse_timestamp)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    if let Ok(value) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(value.and_utc());
    }
    if let Ok(value) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(value.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|value| value.and_utc())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyFile {
    #[serde(default = "uncategorized", deserialize_with = "category_or_default")]
    pub category: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub file_name: String,
    #[serde(default, deserialize_with = "size_or_zero")]
    pub file_size: u64,
    #[serde(default, deserialize_with = "string_or_default")]
    pub remote_url: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub studies: Vec<StudySection>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StudyMetadata {
    pub fn primary(&self) -> Option<&StudySection> {
        self.studies.first()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_release_date: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub publications: Vec<Publication>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub people: Vec<Person>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    #[serde(default, deserialize_with = "string_or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub author_list: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub doi: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default, deserialize_with = "string_or_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<Role>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A person's role, either a bare label or an ontology annotation. Anything
/// else is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Role {
    Label(String),
    Term {
        #[serde(rename = "annotationValue")]
        annotation_value: String,
        #[serde(flatten)]
        extra: BTreeMap<String, Value>,
    },
    Other(Value),
}

impl Role {
    pub fn label(&self) -> &str {
        match self {
            Role::Label(value) => value,
            Role::Term {
                annotation_value, ..
            } => annotation_value,
            Role::Other(value) => value
                .get("termAccession")
                .and_then(Value::as_str)
                .unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullStudyDetails {
    pub accession: Accession,
    pub metadata: StudyMetadata,
    pub files: Vec<StudyFile>,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default, rename = "yearFrom", skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(default, rename = "yearTo", skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.year_from.is_none() && self.year_to.is_none()
    }

    pub fn has_year_bound(&self) -> bool {
        self.year_from.is_some() || self.year_to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub term: String,
    /// 1-indexed page number.
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(default)]
    pub filters: FilterState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub studies: Vec<Study>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub insight: String,
    pub studies: Vec<Study>,
}

fn string_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

fn optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = string_or_default(deserializer)?;
    Ok((!value.trim().is_empty()).then_some(value))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn uncategorized() -> String {
    UNCATEGORIZED.to_string()
}

fn category_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = string_or_default(deserializer)?;
    if value.trim().is_empty() {
        Ok(UNCATEGORIZED.to_string())
    } else {
        Ok(value)
    }
}

fn size_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0 && *v < u64::MAX as f64)
                    .map(|v| v as u64)
            })
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

impl Default for StudyFile {
    fn default() -> Self {
        Self {
            category: uncategorized(),
            file_name: String::new(),
            file_size: 0,
            remote_url: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_accession_forms() {
        let full: Accession = "OSD-87".parse().unwrap();
        let lower: Accession = " osd-87 ".parse().unwrap();
        let bare: Accession = "87".parse().unwrap();
        assert_eq!(full.as_str(), "OSD-87");
        assert_eq!(lower, full);
        assert_eq!(bare, full);
        assert_eq!(full.study_id(), "87");
    }

    #[test]
    fn parse_accession_invalid() {
        let err = "GLDS-87".parse::<Accession>().unwrap_err();
        assert_matches!(err, OsdrError::InvalidAccession(_));
        assert!("OSD-".parse::<Accession>().is_err());
    }

    #[test]
    fn study_keeps_extra_fields() {
        let raw = serde_json::json!({
            "Accession": "OSD-48",
            "Study Title": "Rodent Research-1",
            "Study Description": "Mice on the ISS",
            "Last Modified": "2023-05-01T10:00:00",
            "organism": "Mus musculus"
        });
        let study: Study = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(study.accession, "OSD-48");
        assert_eq!(study.extra["organism"], "Mus musculus");
        assert_eq!(serde_json::to_value(&study).unwrap(), raw);
        assert!(study.last_modified_at().is_some());
    }

    #[test]
    fn file_category_defaults() {
        let file: StudyFile = serde_json::from_value(serde_json::json!({
            "category": null,
            "file_name": "a.txt",
            "file_size": 12,
            "remote_url": "/geode-py/ws/a.txt"
        }))
        .unwrap();
        assert_eq!(file.category, UNCATEGORIZED);

        let file: StudyFile =
            serde_json::from_value(serde_json::json!({ "file_name": "b.txt" })).unwrap();
        assert_eq!(file.category, UNCATEGORIZED);
        assert_eq!(file.file_size, 0);
    }

    #[test]
    fn role_labels() {
        let person: Person = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "roles": ["Principal Investigator", {"annotationValue": "Co-Investigator"}]
        }))
        .unwrap();
        let labels: Vec<&str> = person.roles.iter().map(Role::label).collect();
        assert_eq!(labels, vec!["Principal Investigator", "Co-Investigator"]);
        assert_eq!(person.full_name(), "Ada Lovelace");
    }

    #[test]
    fn unusual_roles_and_null_lists_are_tolerated() {
        let person: Person = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "roles": [{"termAccession": "OBI_0000103", "termSource": ""}, 7]
        }))
        .unwrap();
        let labels: Vec<&str> = person.roles.iter().map(Role::label).collect();
        assert_eq!(labels, vec!["OBI_0000103", ""]);

        let section: StudySection = serde_json::from_value(serde_json::json!({
            "title": "t",
            "people": null,
            "publications": null
        }))
        .unwrap();
        assert!(section.people.is_empty());
        assert!(section.publications.is_empty());
    }

    #[test]
    fn oversized_file_size_is_zero() {
        let files: Vec<StudyFile> = serde_json::from_value(serde_json::json!([
            {"file_size": 1e30},
            {"file_size": 2048.0},
            {"file_size": -5}
        ]))
        .unwrap();
        let sizes: Vec<u64> = files.iter().map(|f| f.file_size).collect();
        assert_eq!(sizes, vec![0, 2048, 0]);
    }
}
