use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::details;
use crate::domain::{Accession, FilterState, FullStudyDetails, Insight, SearchPage, SearchRequest};
use crate::error::OsdrError;
use crate::fanout;
use crate::insight::InsightEngine;
use crate::normalize::normalize;
use crate::osdr::OsdrClient;
use crate::query::build_query;

/// Number of studies paired with every answer to a question.
pub const ASK_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Uniform result of a user-facing operation: either `data` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn from_result(action: &str, result: Result<T, OsdrError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => {
                tracing::error!(action, error = %err, "action failed");
                Self {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

pub struct App<O: OsdrClient, I: InsightEngine> {
    osdr: Arc<O>,
    insight: Arc<I>,
}

impl<O: OsdrClient, I: InsightEngine> Clone for App<O, I> {
    fn clone(&self) -> Self {
        Self {
            osdr: Arc::clone(&self.osdr),
            insight: Arc::clone(&self.insight),
        }
    }
}

impl<O: OsdrClient + 'static, I: InsightEngine + 'static> App<O, I> {
    pub fn new(osdr: O, insight: I) -> Self {
        Self {
            osdr: Arc::new(osdr),
            insight: Arc::new(insight),
        }
    }

    pub fn search_studies(
        &self,
        request: &SearchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<SearchPage, OsdrError> {
        sink.event(ProgressEvent {
            message: format!(
                "phase=Search; term={:?} page={} size={}",
                request.term, request.page, request.page_size
            ),
            elapsed: None,
        });
        let start = Instant::now();
        let page = run_search(self.osdr.as_ref(), request)?;
        sink.event(ProgressEvent {
            message: format!("osdr.search hits={} total={}", page.studies.len(), page.total),
            elapsed: Some(start.elapsed()),
        });
        Ok(page)
    }

    /// Answers a question and pairs the answer with matching studies. Both
    /// halves must succeed.
    pub fn ask_question(
        &self,
        question: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Insight, OsdrError> {
        sink.event(ProgressEvent {
            message: "phase=Ask; generating insight and searching studies".to_string(),
            elapsed: None,
        });
        let start = Instant::now();

        let request = SearchRequest {
            term: question.to_string(),
            page: 1,
            page_size: ASK_PAGE_SIZE,
            filters: FilterState::default(),
        };
        let engine = Arc::clone(&self.insight);
        let osdr = Arc::clone(&self.osdr);
        let question = question.to_string();

        let (insight, mut page) = fanout::join2(
            move || engine.generate_insight(&question),
            move || run_search(osdr.as_ref(), &request),
        )?;
        page.studies.truncate(ASK_PAGE_SIZE as usize);

        sink.event(ProgressEvent {
            message: format!("phase=Ask; {} studies", page.studies.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(Insight {
            insight,
            studies: page.studies,
        })
    }

    /// Loads metadata, files and an AI summary for one study. The summary is
    /// requested with the full accession, the OSDR endpoints with the bare id.
    pub fn study_details(
        &self,
        accession: &Accession,
        sink: &dyn ProgressSink,
    ) -> Result<FullStudyDetails, OsdrError> {
        sink.event(ProgressEvent {
            message: format!("phase=Details; {accession}"),
            elapsed: None,
        });
        let start = Instant::now();

        let study_id = accession.study_id().to_string();
        let (meta_client, files_client) = (Arc::clone(&self.osdr), Arc::clone(&self.osdr));
        let meta_id = study_id.clone();
        let engine = Arc::clone(&self.insight);
        let summary_key = accession.to_string();

        let (metadata, files, summary) = fanout::join3(
            move || meta_client.fetch_metadata(&meta_id),
            move || files_client.fetch_files(&study_id),
            move || engine.summarize_study(&summary_key),
        )?;

        let result = details::assemble(accession, metadata, files, summary, self.osdr.origin())?;
        sink.event(ProgressEvent {
            message: format!("phase=Details; {} files", result.files.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(result)
    }

    pub fn answer_with_context(
        &self,
        question: &str,
        relevant_data: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, OsdrError> {
        sink.event(ProgressEvent {
            message: "phase=Answer; asking with supplied context".to_string(),
            elapsed: None,
        });
        self.insight.answer_with_context(question, relevant_data)
    }
}

fn run_search<O: OsdrClient + ?Sized>(
    osdr: &O,
    request: &SearchRequest,
) -> Result<SearchPage, OsdrError> {
    let query = build_query(request);
    let response = osdr.search(&query)?;
    Ok(normalize(response))
}
