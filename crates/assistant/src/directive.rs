//! Structured directives embedded in model output.
//!
//! The model may answer with free text that contains a JSON object such as
//! `{"type": "get-time"}`. Date and time answers are produced locally from the
//! clock instead of trusting the model.

use chrono::{DateTime, TimeZone};
use serde::Deserialize;

use crate::responder::{AssistantReply, ReplyKind};

pub const UNSURE_FALLBACK: &str =
    "I'm not completely sure, but I’ll try to find a more accurate answer next time.";
pub const EMPTY_FALLBACK: &str = "Sorry, I couldn't find an answer to that.";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Directive {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

/// The span from the first `{` to the last `}`, if any.
pub fn find_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the embedded JSON object. A span that is not valid JSON is treated as
/// plain text.
pub fn extract(text: &str) -> Option<Directive> {
    let span = find_json_span(text)?;
    match serde_json::from_str::<Directive>(span) {
        Ok(directive) => Some(directive),
        Err(e) => {
            tracing::debug!("Ignoring unparseable directive in model output: {}", e);
            None
        }
    }
}

/// Turn generated text into the reply sent back to the user.
pub fn resolve<Tz>(text: &str, now: &DateTime<Tz>) -> AssistantReply
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(directive) = extract(text) else {
        let trimmed = text.trim();
        let response = if trimmed.is_empty() {
            EMPTY_FALLBACK.to_string()
        } else {
            trimmed.to_string()
        };
        return AssistantReply::new(ReplyKind::General, response);
    };

    match directive.kind.as_deref() {
        Some("get-date") => AssistantReply::new(
            ReplyKind::GetDate,
            format!("Current date is {}", now.format("%Y-%m-%d")),
        ),
        Some("get-time") => AssistantReply::new(
            ReplyKind::GetTime,
            format!("Current time is {}", now.format("%I:%M %p")),
        ),
        Some("get-day") => {
            AssistantReply::new(ReplyKind::GetDay, format!("Today is {}", now.format("%A")))
        }
        Some("get-month") => AssistantReply::new(
            ReplyKind::GetMonth,
            format!("This month is {}", now.format("%B")),
        ),
        _ => {
            let response = directive
                .response
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| UNSURE_FALLBACK.to_string());
            AssistantReply::new(ReplyKind::General, response)
        }
    }
}
