use reqwest::Client;
use serde_json::Value;
use storage::records::StudentDoc;

use quiz_core::model::StudentRecord;

use crate::chat::{ChatClient, ChatCompletion, clean_json_response};
use crate::config::AiConfig;
use crate::error::AiReportError;

/// Sections the report prompt asks for, in display order. Other titles the
/// model invents follow, alphabetically.
pub const KNOWN_SECTIONS: &[&str] = &[
    "Strengths",
    "Areas for Improvement",
    "Overall Progress",
    "Recommendations",
    "Learning Path",
    "Next Steps",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReport {
    pub sections: Vec<ReportSection>,
}

/// Generates a narrative progress report from a student record.
///
/// Runs outside the quiz flow; any failure here only affects the report.
#[derive(Clone)]
pub struct AiReportGenerator {
    chat: Option<ChatClient>,
}

impl AiReportGenerator {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Client::new(), AiConfig::from_env())
    }

    #[must_use]
    pub fn new(client: Client, config: Option<AiConfig>) -> Self {
        Self {
            chat: config.map(|config| ChatClient::new(client, config)),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.chat.is_some()
    }

    /// # Errors
    ///
    /// Returns `AiReportError` when the generator is disabled, the request
    /// fails, or the reply is not a section map.
    pub async fn generate(&self, student: &StudentRecord) -> Result<AiReport, AiReportError> {
        let chat = self.chat.as_ref().ok_or(AiReportError::Disabled)?;
        let content = chat.complete(&build_prompt(student)?).await?;
        parse_report(&content)
    }
}

/// The prompt embeds the student's record, minus contact details.
fn build_prompt(student: &StudentRecord) -> Result<String, AiReportError> {
    let mut doc = StudentDoc::from_record(student);
    doc.email = None;
    let data = serde_json::to_string(&doc).map_err(|e| AiReportError::Parse(e.to_string()))?;
    Ok(format!(
        "Analyze the student's past quiz performance and write a progress report \
         with areas of improvement. Student data: {data}. \
         Respond with a JSON object where each key is a section title \
         (for example \"Strengths\", \"Areas for Improvement\", \"Overall Progress\") \
         and each value is an array of short strings, one per point. \
         Return only the JSON, without code fences."
    ))
}

/// Parse a model reply into ordered sections.
///
/// # Errors
///
/// Returns `AiReportError::Parse` unless the reply is a JSON object of
/// string lists (a bare string counts as a one-point list).
pub fn parse_report(response: &str) -> Result<AiReport, AiReportError> {
    let cleaned = clean_json_response(response);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| AiReportError::Parse(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AiReportError::Parse("expected a JSON object".into()));
    };

    let mut sections = Vec::with_capacity(map.len());
    for (title, points) in map {
        let points = match points {
            Value::String(point) => vec![point],
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(point) => Ok(point),
                    other => Err(AiReportError::Parse(format!(
                        "section {title:?} has a non-string point: {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(AiReportError::Parse(format!(
                    "section {title:?} is not a list: {other}"
                )));
            }
        };
        sections.push(ReportSection { title, points });
    }
    if sections.is_empty() {
        return Err(AiReportError::EmptyResponse);
    }

    sections.sort_by(|a, b| section_rank(&a.title).cmp(&section_rank(&b.title)));
    Ok(AiReport { sections })
}

fn section_rank(title: &str) -> (usize, String) {
    let known = KNOWN_SECTIONS
        .iter()
        .position(|s| *s == title)
        .unwrap_or(KNOWN_SECTIONS.len());
    (known, title.to_string())
}
