//! Translation of a search request into the bool/must/filter/sort document
//! understood by the OSDR search endpoint.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{FilterState, SearchRequest};
use crate::error::OsdrError;

pub const MATCH_ALL: &str = "*";
pub const LAST_MODIFIED_FIELD: &str = "Last Modified";
pub const TITLE_FIELD: &str = "Study Title";
pub const DESCRIPTION_FIELD: &str = "Study Description";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub from: u64,
    pub size: u32,
    pub query: QueryBody,
    pub sort: Vec<BTreeMap<String, SortOrder>>,
}

impl SearchQuery {
    /// Compact JSON form, used as the `source` parameter of a GET search.
    pub fn to_query_param(&self) -> Result<String, OsdrError> {
        serde_json::to_string(self).map_err(|err| OsdrError::Serialization(err.to_string()))
    }

    /// The free-text term as it was placed in the `must` clause.
    pub fn term(&self) -> Option<&str> {
        self.query.bool.must.iter().find_map(|clause| match clause {
            Clause::QueryString { query } => Some(query.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryBody {
    pub bool: BoolQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    QueryString { query: String },
    Match(BTreeMap<String, String>),
    Bool(BoolQuery),
    Range(BTreeMap<String, RangeBounds>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortOrder {
    pub order: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

pub fn build_query(request: &SearchRequest) -> SearchQuery {
    let from = u64::from(request.page.saturating_sub(1)) * u64::from(request.page_size);

    SearchQuery {
        from,
        size: request.page_size,
        query: QueryBody {
            bool: BoolQuery {
                must: vec![Clause::QueryString {
                    query: full_text_term(&request.term),
                }],
                filter: filter_clauses(&request.filters),
                ..BoolQuery::default()
            },
        },
        sort: vec![BTreeMap::from([(
            LAST_MODIFIED_FIELD.to_string(),
            SortOrder {
                order: Direction::Desc,
            },
        )])],
    }
}

fn full_text_term(term: &str) -> String {
    if term.trim().is_empty() {
        MATCH_ALL.to_string()
    } else {
        term.to_string()
    }
}

pub fn filter_clauses(filters: &FilterState) -> Vec<Clause> {
    let mut clauses: Vec<Clause> = filters
        .categories
        .iter()
        .filter(|category| !category.trim().is_empty())
        .map(|category| category_clause(category))
        .collect();

    if let Some(range) = year_range_clause(filters) {
        clauses.push(range);
    }
    clauses
}

fn category_clause(category: &str) -> Clause {
    let original = category.trim().to_string();
    let lowered = original.to_lowercase();
    let mut forms = vec![original];
    if lowered != forms[0] {
        forms.push(lowered);
    }

    let should = forms
        .into_iter()
        .flat_map(|form| {
            [
                Clause::Match(BTreeMap::from([(TITLE_FIELD.to_string(), form.clone())])),
                Clause::Match(BTreeMap::from([(
                    DESCRIPTION_FIELD.to_string(),
                    form.clone(),
                )])),
                Clause::QueryString { query: form },
            ]
        })
        .collect();

    Clause::Bool(BoolQuery {
        should,
        minimum_should_match: Some(1),
        ..BoolQuery::default()
    })
}

fn year_range_clause(filters: &FilterState) -> Option<Clause> {
    if !filters.has_year_bound() {
        return None;
    }
    let bounds = RangeBounds {
        gte: filters.year_from.map(|year| format!("{year:04}-01-01")),
        lte: filters.year_to.map(|year| format!("{year:04}-12-31")),
    };
    Some(Clause::Range(BTreeMap::from([(
        LAST_MODIFIED_FIELD.to_string(),
        bounds,
    )])))
}
