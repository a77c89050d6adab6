mod common;

use osdr_explorer::domain::Accession;
use osdr_explorer::session::{ChatRole, ChatSession, Selection, WELCOME_MESSAGE};

use assert_matches::assert_matches;
use common::{MockInsight, MockOsdr, NoopSink};

fn osd87() -> Accession {
    "OSD-87".parse().unwrap()
}

#[test]
fn starts_with_welcome() {
    let session = ChatSession::new(common::app(MockOsdr::default(), MockInsight::default()));
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].id, "init");
    assert_eq!(session.messages()[0].content, WELCOME_MESSAGE);
    assert!(session.studies().is_empty());
}

#[test]
fn answered_question_replaces_studies() {
    let mut session = ChatSession::new(common::app(MockOsdr::default(), MockInsight::default()));
    let response = session.send("mouse liver", &NoopSink);
    assert!(response.success);

    let messages = session.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, ChatRole::User);
    assert_eq!(messages[1].content, "mouse liver");
    assert_eq!(messages[2].role, ChatRole::Assistant);
    assert_ne!(messages[1].id, messages[2].id);
    assert_eq!(session.studies().len(), 2);
}

#[test]
fn failed_question_keeps_previous_studies() {
    let osdr = MockOsdr::default();
    let outage = osdr.search_outage.clone();
    let mut session = ChatSession::new(common::app(osdr, MockInsight::default()));
    session.send("mouse liver", &NoopSink);
    assert_eq!(session.studies().len(), 2);

    *outage.lock().unwrap() = Some(502);
    let response = session.send("bone", &NoopSink);
    assert!(!response.success);
    assert_eq!(session.messages().len(), 5);
    assert_eq!(
        session.messages().last().unwrap().content,
        "Sorry, I encountered an error: Failed to search studies. Status: 502"
    );
    assert_eq!(session.studies().len(), 2);
}

#[test]
fn selecting_open_study_closes_it() {
    let mut session = ChatSession::new(common::app(MockOsdr::default(), MockInsight::default()));
    assert_matches!(session.select_study(&osd87(), &NoopSink), Selection::Loaded(_));
    assert_eq!(session.selected(), Some(&osd87()));
    assert!(session.details().is_some());

    assert_matches!(session.select_study(&osd87(), &NoopSink), Selection::Cleared);
    assert!(session.selected().is_none());
    assert!(session.details().is_none());
}

#[test]
fn empty_list_is_seeded_from_details() {
    let mut session = ChatSession::new(common::app(MockOsdr::default(), MockInsight::default()));
    session.select_study(&osd87(), &NoopSink);

    let studies = session.studies();
    assert_eq!(studies.len(), 1);
    assert_eq!(studies[0].accession, "OSD-87");
    assert_eq!(
        studies[0].title,
        "Transcriptome analysis of Arabidopsis grown in microgravity"
    );
    assert_eq!(studies[0].last_modified.as_deref(), Some("2016-06-23T00:00:00Z"));
}

#[test]
fn failed_selection_keeps_list() {
    let osdr = MockOsdr {
        metadata: Err(404),
        ..MockOsdr::default()
    };
    let mut session = ChatSession::new(common::app(osdr, MockInsight::default()));
    session.send("mouse liver", &NoopSink);
    assert_eq!(session.studies().len(), 2);

    assert_matches!(session.select_study(&osd87(), &NoopSink), Selection::Failed(_));
    assert!(session.selected().is_none());
    assert!(session.details().is_none());
    assert_eq!(session.studies().len(), 2);
}
