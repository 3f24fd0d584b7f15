//! Turns one spoken command into one reply.
//!
//! Arithmetic is answered locally. Everything else goes to the generative-text
//! client with a persona prompt, and the output is resolved through
//! [`crate::directive`].

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    brain::{self, LLMClient},
    calculator, directive,
};

pub const DEFAULT_ASSISTANT_NAME: &str = "AI Assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyKind {
    Calculation,
    GetDate,
    GetTime,
    GetDay,
    GetMonth,
    General,
}

/// Body returned by `POST /api/user/asktoassistant`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct AssistantReply {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub response: String,
}

impl AssistantReply {
    pub fn new(kind: ReplyKind, response: impl Into<String>) -> Self {
        Self {
            kind,
            response: response.into(),
        }
    }
}

/// Who is speaking and who is answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub assistant_name: String,
    pub user_name: String,
}

impl Persona {
    pub fn new(assistant_name: Option<&str>, user_name: impl Into<String>) -> Self {
        let assistant_name = assistant_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_ASSISTANT_NAME);
        Self {
            assistant_name: assistant_name.to_string(),
            user_name: user_name.into(),
        }
    }
}

/// Source of "now" for date and time answers
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Server-local wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock stuck at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

static LEADING_GREETING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(hey|hi|hello|ok|okay)\b[\s,]*").expect("valid greeting regex"));

/// Remove the assistant's name (and a greeting in front of it) so that
/// "Nova, what is 5 plus 10" reaches the calculator as "what is 5 plus 10".
pub fn strip_wake_word(command: &str, assistant_name: &str) -> String {
    let name = assistant_name.trim();
    if name.is_empty() {
        return command.trim().to_string();
    }

    let pattern = format!(r"(?i)\b{}\b[\s,:!.]*", regex::escape(name));
    let Ok(name_regex) = Regex::new(&pattern) else {
        return command.trim().to_string();
    };

    let stripped = name_regex.replace_all(command, " ");
    if stripped == command {
        return command.trim().to_string();
    }
    LEADING_GREETING
        .replace(stripped.trim(), "")
        .trim()
        .to_string()
}

/// Stateless apart from its collaborators, so one instance serves every request.
#[derive(Clone)]
pub struct QueryResponder {
    llm: LLMClient,
    clock: Arc<dyn Clock>,
}

impl QueryResponder {
    pub fn new(llm: LLMClient) -> Self {
        Self {
            llm,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn llm(&self) -> &LLMClient {
        &self.llm
    }

    /// Answer `command` on behalf of `persona`.
    pub async fn respond(&self, command: &str, persona: &Persona) -> AssistantReply {
        let query = strip_wake_word(command, &persona.assistant_name);

        if let Some(value) = calculator::evaluate(&query) {
            tracing::debug!("Answered locally as arithmetic: {}", query);
            return AssistantReply::new(
                ReplyKind::Calculation,
                format!("The result is {}", calculator::format_number(value)),
            );
        }

        let prompt = brain::persona_prompt(command, &persona.assistant_name, &persona.user_name);
        let text = self.llm.generate(&prompt).await;
        directive::resolve(&text, &self.clock.now())
    }
}
