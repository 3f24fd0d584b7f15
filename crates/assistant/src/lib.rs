//! # Assistant
//!
//! Answers spoken commands for a personal voice assistant. Arithmetic is
//! evaluated locally; everything else is sent to a generative-text model with
//! a persona prompt, and date/time requests in the model's answer are filled
//! in from the local clock. The [`voice`] module holds the wake-word speech
//! loop a front end runs against this service.

pub mod brain;
pub mod calculator;
pub mod directive;
pub mod responder;
pub mod voice;

#[cfg(test)]
mod brain_tests;

pub use brain::{LLMClient, LLMConfig};
pub use responder::{AssistantReply, Persona, QueryResponder, ReplyKind};
