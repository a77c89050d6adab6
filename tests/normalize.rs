mod common;

use serde_json::json;

use osdr_explorer::error::OsdrError;
use osdr_explorer::normalize::{SearchResponse, normalize};

use assert_matches::assert_matches;

#[test]
fn fixture_keeps_order_and_drops_hits_without_accession() {
    let response = SearchResponse::from_json(common::fixture("search_microgravity.json")).unwrap();
    let page = normalize(response);

    assert_eq!(page.total, 3);
    let accessions: Vec<&str> = page.studies.iter().map(|s| s.accession.as_str()).collect();
    assert_eq!(accessions, ["OSD-48", "OSD-245"]);

    let first = &page.studies[0];
    assert!(first.title.starts_with("Rodent Research-1"));
    assert_eq!(first.extra["organism"], "Mus musculus");
    assert_eq!(first.extra["Project Type"], "Spaceflight Study");
    assert_eq!(
        first.last_modified_at().unwrap().format("%Y-%m-%d").to_string(),
        "2023-08-17"
    );
}

#[test]
fn empty_result_is_stable() {
    let raw = json!({"hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}});
    let first = normalize(SearchResponse::from_json(raw.clone()).unwrap());
    let second = normalize(SearchResponse::from_json(raw).unwrap());
    assert!(first.studies.is_empty());
    assert_eq!(first.total, 0);
    assert_eq!(first, second);
}

#[test]
fn missing_total_counts_as_zero() {
    let raw = json!({"hits": {"hits": [{"_source": {"Accession": "OSD-1"}}]}});
    let page = normalize(SearchResponse::from_json(raw).unwrap());
    assert_eq!(page.total, 0);
    assert_eq!(page.studies.len(), 1);
}

#[test]
fn body_without_hits_is_rejected() {
    let err = SearchResponse::from_json(json!({"error": "index missing"})).unwrap_err();
    assert_matches!(err, OsdrError::InvalidSearchResponse(_));
}
