use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;

/// Accepted result fields for `GET /api/question`, tried in order.
pub const QUESTION_FIELDS: &[&str] = &["question", "result", "text", "message"];

/// Accepted result fields for `POST /api/grade`, tried in order.
pub const GRADE_FIELDS: &[&str] = &["result", "question"];

/// Body of `POST /api/grade`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeRequest {
    pub problem: String,
    pub answer: String,
    pub min_words: u32,
    pub max_words: u32,
}

/// The two remote operations the conversation depends on.
///
/// `ExamClient` talks HTTP; tests substitute a scripted implementation.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    async fn request_question(&self, institution: &str) -> Result<String, ClientError>;

    async fn request_grade(&self, request: &GradeRequest) -> Result<String, ClientError>;
}

pub type DynExamBackend = Arc<dyn ExamBackend>;

#[derive(Clone)]
pub struct ExamClient {
    client: Client,
    base_url: String,
}

impl ExamClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn question_url(&self, institution: &str) -> String {
        format!(
            "{}/api/question?univ={}",
            self.base_url,
            urlencoding::encode(institution)
        )
    }

    async fn read_payload(response: reqwest::Response, expected: &'static [&'static str]) -> Result<Value, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "exam service request failed");
            return Err(ClientError::RemoteError { status: status.as_u16() });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, "exam service returned a non-JSON body");
            ClientError::MalformedResponse { expected }
        })
    }
}

#[async_trait]
impl ExamBackend for ExamClient {
    async fn request_question(&self, institution: &str) -> Result<String, ClientError> {
        let url = self.question_url(institution);
        tracing::debug!(%url, "requesting question");

        let response = self.client.get(&url).send().await?;
        let payload = Self::read_payload(response, QUESTION_FIELDS).await?;

        extract_field(&payload, QUESTION_FIELDS)
            .or_else(|| compose_structured_question(&payload))
            .ok_or(ClientError::MalformedResponse { expected: QUESTION_FIELDS })
    }

    async fn request_grade(&self, request: &GradeRequest) -> Result<String, ClientError> {
        let url = format!("{}/api/grade", self.base_url);
        tracing::debug!(%url, answer_chars = request.answer.chars().count(), "requesting grade");

        let response = self.client.post(&url).json(request).send().await?;
        let payload = Self::read_payload(response, GRADE_FIELDS).await?;

        extract_field(&payload, GRADE_FIELDS)
            .ok_or(ClientError::MalformedResponse { expected: GRADE_FIELDS })
    }
}

/// Return the first of `fields` whose value is a JSON string.
pub fn extract_field(payload: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_str))
        .map(str::to_string)
}

/// Render the structured question shape (title, instruction, Japanese
/// prompt lines, vocabulary hints) as a single block of text.
pub fn compose_structured_question(payload: &Value) -> Option<String> {
    let instruction = payload.get("instruction").and_then(Value::as_str);
    let prompt_lines: Vec<&str> = payload
        .get("japanese")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if instruction.is_none() && prompt_lines.is_empty() {
        return None;
    }

    let mut lines = Vec::new();

    let theme = payload.get("theme").and_then(Value::as_str);
    let title = payload.get("title").and_then(Value::as_str);
    match (theme, title) {
        (Some(theme), Some(title)) => lines.push(format!("【{}】{}", theme, title)),
        (None, Some(title)) => lines.push(title.to_string()),
        (Some(theme), None) => lines.push(format!("【{}】", theme)),
        (None, None) => {}
    }

    if let Some(instruction) = instruction {
        lines.push(instruction.to_string());
    }
    lines.extend(prompt_lines.iter().map(|l| l.to_string()));

    let hints: Vec<String> = payload
        .get("hints")
        .and_then(Value::as_array)
        .map(|hints| {
            hints
                .iter()
                .filter_map(|h| {
                    let en = h.get("en").and_then(Value::as_str)?;
                    Some(match h.get("ja").and_then(Value::as_str) {
                        Some(ja) => format!("{} ({})", en, ja),
                        None => en.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if !hints.is_empty() {
        lines.push(format!("Hints: {}", hints.join(", ")));
    }

    Some(lines.join("\n"))
}
