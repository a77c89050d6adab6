use std::sync::OnceLock;
use std::time::Instant;

use regex::{Captures, Regex};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};

use crate::config::InsightSettings;
use crate::error::OsdrError;

/// Text generation used by the explorer. Each call takes structured input and
/// yields a single text field.
pub trait InsightEngine: Send + Sync {
    fn generate_insight(&self, question: &str) -> Result<String, OsdrError>;
    fn summarize_study(&self, study_id: &str) -> Result<String, OsdrError>;
    fn answer_with_context(&self, question: &str, relevant_data: &str)
    -> Result<String, OsdrError>;
}

#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    pub name: &'static str,
    pub output_field: &'static str,
    pub output_description: &'static str,
    pub template: &'static str,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid placeholder regex"))
}

impl Prompt {
    /// Fills `{{key}}` placeholders in one pass over the template. Values are
    /// inserted verbatim; unknown placeholders are left in place.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        placeholder_regex()
            .replace_all(self.template, |caps: &Captures<'_>| {
                vars.iter()
                    .find(|(key, _)| *key == &caps[1])
                    .map(|(_, value)| (*value).to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

pub const INSIGHT_PROMPT: Prompt = Prompt {
    name: "insight",
    output_field: "insight",
    output_description: "Answer to the question grounded in NASA OSDR data.",
    template: "You are a space biology expert answering questions with data from NASA's \
Open Science Data Repository (OSDR).\n\n\
Question: {{question}}\n\n\
Give a thorough answer. Connect related experiments, payloads, vehicles, people and missions \
when OSDR has them. Stay accurate. If OSDR data cannot answer the question, say so.",
};

pub const SUMMARY_PROMPT: Prompt = Prompt {
    name: "study-summary",
    output_field: "summary",
    output_description: "Concise summary of the study.",
    template: "You summarize scientific study metadata from NASA's Open Science Data \
Repository (OSDR).\n\n\
Study ID: {{studyId}}\n\n\
Write a concise summary of this study covering its objectives, methodology and key findings.",
};

pub const CONTEXT_PROMPT: Prompt = Prompt {
    name: "answer-with-context",
    output_field: "answer",
    output_description: "Answer with an explanation of how the data supports it.",
    template: "You are a space biology knowledge engine. Answer the question using the NASA \
OSDR data below, and explain how the answer follows from that data.\n\n\
Question: {{question}}\n\n\
Data: {{relevantData}}\n\n\
Answer:",
};

#[derive(Clone)]
pub struct GeminiInsightEngine {
    client: Client,
    settings: InsightSettings,
}

impl GeminiInsightEngine {
    pub fn new(settings: InsightSettings) -> Result<Self, OsdrError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("osdr-explorer/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| OsdrError::InsightHttp(err.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| OsdrError::InsightHttp(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn run(&self, prompt: &Prompt, vars: &[(&str, &str)]) -> Result<String, OsdrError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(OsdrError::MissingApiKey)?;
        let body = request_body(prompt, &prompt.render(vars));

        let start = Instant::now();
        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|err| OsdrError::InsightHttp(err.to_string()))?;
        tracing::debug!(
            prompt = prompt.name,
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "insight.response"
        );

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "insight request failed".to_string());
            return Err(OsdrError::InsightStatus { status, message });
        }
        let raw: Value = response
            .json()
            .map_err(|err| OsdrError::InsightHttp(err.to_string()))?;
        extract_output(&raw, prompt.output_field)
    }
}

impl InsightEngine for GeminiInsightEngine {
    fn generate_insight(&self, question: &str) -> Result<String, OsdrError> {
        self.run(&INSIGHT_PROMPT, &[("question", question)])
    }

    fn summarize_study(&self, study_id: &str) -> Result<String, OsdrError> {
        self.run(&SUMMARY_PROMPT, &[("studyId", study_id)])
    }

    fn answer_with_context(
        &self,
        question: &str,
        relevant_data: &str,
    ) -> Result<String, OsdrError> {
        self.run(
            &CONTEXT_PROMPT,
            &[("question", question), ("relevantData", relevant_data)],
        )
    }
}

/// Request asking the model for a JSON object with a single string field.
pub fn request_body(prompt: &Prompt, text: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": text }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    prompt.output_field: {
                        "type": "STRING",
                        "description": prompt.output_description
                    }
                },
                "required": [prompt.output_field]
            }
        }
    })
}

pub fn extract_output(raw: &Value, field: &str) -> Result<String, OsdrError> {
    let text = raw
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            let reason = raw
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidate text");
            OsdrError::InsightResponse(reason.to_string())
        })?;
    let output: Value = serde_json::from_str(text)
        .map_err(|err| OsdrError::InsightResponse(format!("output is not JSON: {err}")))?;
    output
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OsdrError::InsightResponse(format!("output is missing `{field}`")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn render_substitutes_every_variable() {
        let text = CONTEXT_PROMPT.render(&[("question", "Why?"), ("relevantData", "OSD-1")]);
        assert!(text.contains("Question: Why?"));
        assert!(text.contains("Data: OSD-1"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn render_does_not_expand_placeholders_inside_values() {
        let text = CONTEXT_PROMPT.render(&[
            ("question", "see {{relevantData}}"),
            ("relevantData", "SECRET"),
        ]);
        assert!(text.contains("Question: see {{relevantData}}"));
        assert!(text.contains("Data: SECRET"));
        assert!(!text.contains("see SECRET"));
    }

    #[test]
    fn extract_reads_structured_field() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"summary\": \"Mice flew.\"}"}]}
            }]
        });
        assert_eq!(extract_output(&raw, "summary").unwrap(), "Mice flew.");
    }

    #[test]
    fn extract_reports_block_reason() {
        let raw = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_output(&raw, "insight").unwrap_err();
        assert_matches!(err, OsdrError::InsightResponse(reason) if reason == "SAFETY");
    }

    #[test]
    fn missing_key_fails_before_request() {
        let engine = GeminiInsightEngine::new(InsightSettings::default()).unwrap();
        assert_matches!(engine.generate_insight("q"), Err(OsdrError::MissingApiKey));
    }

    #[test]
    fn request_schema_names_output_field() {
        let body = request_body(&SUMMARY_PROMPT, "hello");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"][0],
            "summary"
        );
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }
}
