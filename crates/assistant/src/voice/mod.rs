//! Hands-free conversation loop for a front end.
//!
//! ```text
//!   Idle ──restart──▶ Listening ──wake word──▶ Processing
//!    ▲                                             │ reply
//!    └──── speech ended ◀── Speaking / InterruptListening
//! ```
//!
//! [`speech_loop`] is the pure state machine, [`runner`] drives it against
//! platform adapters, and [`client`] talks to the backend over HTTP.

pub mod client;
pub mod runner;
pub mod sanitize;
pub mod speech_loop;

pub use client::{AssistantClient, ClientError, ClientSession, HttpAssistantClient, RemoteProfile};
pub use runner::{
    EventSink, Recognizer, SpeechLoopRunner, SpeechPlatformError, Synthesizer, event_channel,
};
pub use sanitize::sanitize_for_speech;
pub use speech_loop::{
    LoopSnapshot, Phase, RecognitionErrorKind, SpeechCommand, SpeechEvent, SpeechLoop, Utterance,
};
