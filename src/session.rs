use serde::Serialize;
use uuid::Uuid;

use crate::app::{ActionResponse, App, ProgressSink};
use crate::domain::{Accession, FullStudyDetails, Insight, Study};
use crate::insight::InsightEngine;
use crate::osdr::OsdrClient;

pub const WELCOME_MESSAGE: &str = "Welcome! Ask me anything about NASA's Open Science Data \
Repository, for example: \"What are the effects of spaceflight on the mouse liver?\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }
}

/// Outcome of selecting a study in the list.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Loaded(Box<FullStudyDetails>),
    Cleared,
    Failed(String),
}

/// Conversation state: message log, the studies backing the last answer, and
/// the study currently opened in detail.
pub struct ChatSession<O: OsdrClient, I: InsightEngine> {
    app: App<O, I>,
    messages: Vec<ChatMessage>,
    studies: Vec<Study>,
    selected: Option<Accession>,
    details: Option<FullStudyDetails>,
}

impl<O: OsdrClient + 'static, I: InsightEngine + 'static> ChatSession<O, I> {
    pub fn new(app: App<O, I>) -> Self {
        Self {
            app,
            messages: vec![ChatMessage {
                id: "init".to_string(),
                role: ChatRole::Assistant,
                content: WELCOME_MESSAGE.to_string(),
            }],
            studies: Vec::new(),
            selected: None,
            details: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    pub fn selected(&self) -> Option<&Accession> {
        self.selected.as_ref()
    }

    pub fn details(&self) -> Option<&FullStudyDetails> {
        self.details.as_ref()
    }

    pub fn send(&mut self, question: &str, sink: &dyn ProgressSink) -> ActionResponse<Insight> {
        self.messages
            .push(ChatMessage::new(ChatRole::User, question));

        let response =
            ActionResponse::from_result("ask_question", self.app.ask_question(question, sink));
        match (&response.data, &response.error) {
            (Some(insight), _) => {
                self.messages
                    .push(ChatMessage::new(ChatRole::Assistant, insight.insight.clone()));
                self.studies = insight.studies.clone();
                self.selected = None;
                self.details = None;
            }
            (None, error) => {
                let message = error
                    .clone()
                    .unwrap_or_else(|| "Failed to get an answer.".to_string());
                self.messages.push(ChatMessage::new(
                    ChatRole::Assistant,
                    format!("Sorry, I encountered an error: {message}"),
                ));
            }
        }
        response
    }

    /// Opens a study. Selecting the study that is already open closes it. A
    /// failed load clears the selection and leaves the study list untouched.
    pub fn select_study(&mut self, accession: &Accession, sink: &dyn ProgressSink) -> Selection {
        if self.selected.as_ref() == Some(accession) && self.details.is_some() {
            self.selected = None;
            self.details = None;
            return Selection::Cleared;
        }

        self.selected = Some(accession.clone());
        self.details = None;
        match self.app.study_details(accession, sink) {
            Ok(details) => {
                if self.studies.is_empty() {
                    self.studies.push(Study::from_details(&details));
                }
                self.details = Some(details.clone());
                Selection::Loaded(Box::new(details))
            }
            Err(err) => {
                tracing::error!(%accession, error = %err, "study details failed");
                self.selected = None;
                Selection::Failed(err.to_string())
            }
        }
    }
}
