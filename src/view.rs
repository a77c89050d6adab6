use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{FullStudyDetails, Person, Study, StudyFile, UNCATEGORIZED};

const LABEL_LIMIT: usize = 25;
const LABEL_KEEP: usize = 22;
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    pub name: String,
    pub full_name: String,
    pub size: u64,
    pub count: usize,
}

/// Total size and file count per category, largest first.
pub fn file_category_breakdown(files: &[StudyFile]) -> Vec<CategoryUsage> {
    let mut totals: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for file in files {
        let category = if file.category.trim().is_empty() {
            UNCATEGORIZED
        } else {
            file.category.as_str()
        };
        let entry = totals.entry(category).or_default();
        entry.0 = entry.0.saturating_add(file.file_size);
        entry.1 += 1;
    }

    let mut usage: Vec<CategoryUsage> = totals
        .into_iter()
        .map(|(name, (size, count))| CategoryUsage {
            name: shorten_label(name),
            full_name: name.to_string(),
            size,
            count,
        })
        .collect();
    usage.sort_by(|a, b| b.size.cmp(&a.size));
    usage
}

fn shorten_label(name: &str) -> String {
    if name.chars().count() > LABEL_LIMIT {
        let kept: String = name.chars().take(LABEL_KEEP).collect();
        format!("{kept}...")
    } else {
        name.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCount {
    pub name: String,
    pub count: usize,
}

/// Most frequent roles across the study personnel, ties broken by name.
pub fn top_roles(people: &[Person], limit: usize) -> Vec<RoleCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in people
        .iter()
        .flat_map(|person| person.roles.iter())
        .map(|role| role.label())
        .filter(|label| !label.is_empty())
    {
        *counts.entry(label).or_default() += 1;
    }
    let mut roles: Vec<RoleCount> = counts
        .into_iter()
        .map(|(name, count)| RoleCount {
            name: name.to_string(),
            count,
        })
        .collect();
    roles.sort_by(|a, b| b.count.cmp(&a.count));
    roles.truncate(limit);
    roles
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["Bytes", "KB", "MB", "GB", "TB", "PB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// 1-based index of the first and last result shown on `page`.
pub fn result_window(page: u32, page_size: u32, total: u64) -> Option<(u64, u64)> {
    if total == 0 || page_size == 0 {
        return None;
    }
    let first = u64::from(page.max(1) - 1) * u64::from(page_size) + 1;
    if first > total {
        return None;
    }
    let last = (first + u64::from(page_size) - 1).min(total);
    Some((first, last))
}

impl Study {
    /// Minimal list entry for a study that was opened without a search.
    pub fn from_details(details: &FullStudyDetails) -> Self {
        let section = details.metadata.primary();
        let title = section
            .and_then(|s| s.title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let description = section
            .and_then(|s| s.description.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let last_modified = section
            .and_then(|s| s.public_release_date.as_ref())
            .and_then(release_date_text)
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        Study {
            accession: details
                .metadata
                .identifier
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| details.accession.to_string()),
            title,
            description,
            last_modified: Some(last_modified),
            extra: BTreeMap::new(),
        }
    }
}

fn release_date_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => number.as_i64().and_then(|secs| {
            chrono::DateTime::from_timestamp(secs, 0)
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        }),
        _ => None,
    }
}
