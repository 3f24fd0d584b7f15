//! Wake-word listen/answer/speak state machine.
//!
//! `SpeechLoop` never touches a microphone or speaker. It consumes
//! [`SpeechEvent`]s reported by the platform and returns the
//! [`SpeechCommand`]s the platform should carry out, which keeps every
//! transition testable without audio hardware or timers.
//!
//! The main recognizer and the synthesizer are never on at the same time. The
//! only listener allowed during speech is the interrupt listener, which waits
//! for the wake word so the user can cut a long answer short.

use std::time::Duration;

use super::sanitize::sanitize_for_speech;

pub const DEFAULT_WAKE_WORD: &str = "nova";

pub const RESTART_AFTER_SPEECH: Duration = Duration::from_millis(700);
pub const RESTART_AFTER_END: Duration = Duration::from_millis(800);
pub const RESTART_AFTER_ERROR: Duration = Duration::from_millis(1200);
pub const LOGOUT_DELAY: Duration = Duration::from_millis(1200);

pub const THINKING_REPLY: &str = "I'm thinking...";
pub const CONNECT_FAILURE_REPLY: &str = "Sorry, I couldn't connect to the assistant.";
pub const FAREWELL: &str = "Goodbye, see you soon!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Listening,
    Processing,
    Speaking,
    InterruptListening,
}

/// Recognition failure reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Start called on a running recognizer, or stop on a stopped one
    InvalidState,
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    Other(String),
}

impl RecognitionErrorKind {
    /// Map a Web Speech style error code
    pub fn from_code(code: &str) -> Self {
        match code {
            "InvalidStateError" | "invalid-state" => Self::InvalidState,
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Text queued for synthesis. `id` ties start/end notifications back to the
/// request so that a cancelled utterance's late `end` is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Activated { user_name: Option<String> },
    Deactivated,
    RecognitionStarted,
    RecognitionResult(String),
    RecognitionEnded,
    RecognitionError(RecognitionErrorKind),
    ReplyReady(String),
    ReplyFailed,
    SynthesisStarted { id: u64 },
    SynthesisEnded { id: u64 },
    InterruptResult(String),
    InterruptFailed,
    RestartElapsed,
    LogOutRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechCommand {
    StartRecognition,
    StopRecognition,
    StartInterruptListener,
    StopInterruptListener,
    Speak(Utterance),
    CancelSpeech,
    /// Send the transcript to the assistant; answer with `ReplyReady`/`ReplyFailed`
    Submit(String),
    /// Deliver `RestartElapsed` after the delay
    ScheduleRestart(Duration),
    /// Log the user out after the delay, then deliver `Deactivated`
    LogOut { after: Duration },
}

/// What a front end shows: indicators and the last exchanged lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSnapshot {
    pub listening: bool,
    pub speaking: bool,
    pub user_text: String,
    pub assistant_text: String,
}

#[derive(Debug, Clone)]
pub struct SpeechLoop {
    wake_word: String,
    phase: Phase,
    active: bool,
    recognizing: bool,
    speaking: bool,
    logging_out: bool,
    utterance: u64,
    user_text: String,
    assistant_text: String,
}

impl SpeechLoop {
    /// `assistant_name` doubles as the wake word; `nova` when absent.
    pub fn new(assistant_name: Option<&str>) -> Self {
        let mut speech_loop = Self {
            wake_word: DEFAULT_WAKE_WORD.to_string(),
            phase: Phase::Idle,
            active: false,
            recognizing: false,
            speaking: false,
            logging_out: false,
            utterance: 0,
            user_text: String::new(),
            assistant_text: String::new(),
        };
        speech_loop.set_wake_word(assistant_name);
        speech_loop
    }

    pub fn set_wake_word(&mut self, assistant_name: Option<&str>) {
        self.wake_word = assistant_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_WAKE_WORD)
            .to_lowercase();
    }

    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_recognizing(&self) -> bool {
        self.recognizing
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            listening: self.recognizing,
            speaking: self.speaking,
            user_text: self.user_text.clone(),
            assistant_text: self.assistant_text.clone(),
        }
    }

    pub fn hears_wake_word(&self, transcript: &str) -> bool {
        transcript.to_lowercase().contains(&self.wake_word)
    }

    pub fn handle(&mut self, event: SpeechEvent) -> Vec<SpeechCommand> {
        match event {
            SpeechEvent::Activated { user_name } => {
                if self.active {
                    return Vec::new();
                }
                self.active = true;
                self.logging_out = false;
                let name = user_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or("there");
                self.speak(&format!("Hello {name}, how can I help you today?"))
            }

            SpeechEvent::Deactivated => {
                let commands = self.silence_everything();
                self.active = false;
                self.logging_out = false;
                commands
            }

            SpeechEvent::RecognitionStarted => {
                if !self.active || self.speaking || self.phase != Phase::Listening {
                    // A stray start would hear our own voice
                    self.recognizing = false;
                    return vec![SpeechCommand::StopRecognition];
                }
                self.recognizing = true;
                Vec::new()
            }

            SpeechEvent::RecognitionResult(transcript) => {
                if self.phase != Phase::Listening || !self.hears_wake_word(&transcript) {
                    return Vec::new();
                }
                let transcript = transcript.trim().to_string();
                self.user_text = transcript.clone();
                self.assistant_text.clear();
                self.recognizing = false;
                self.phase = Phase::Processing;
                vec![
                    SpeechCommand::StopRecognition,
                    SpeechCommand::Submit(transcript),
                ]
            }

            SpeechEvent::RecognitionEnded => self.recognition_stopped(RESTART_AFTER_END),

            SpeechEvent::RecognitionError(RecognitionErrorKind::InvalidState) => {
                tracing::debug!("Ignoring benign recognizer state error");
                Vec::new()
            }

            SpeechEvent::RecognitionError(kind) => {
                tracing::warn!("Speech recognition error: {:?}", kind);
                self.recognition_stopped(RESTART_AFTER_ERROR)
            }

            SpeechEvent::ReplyReady(text) => {
                if !self.active || self.phase != Phase::Processing {
                    return Vec::new();
                }
                let text = if text.trim().is_empty() {
                    THINKING_REPLY.to_string()
                } else {
                    text
                };
                self.speak(&text)
            }

            SpeechEvent::ReplyFailed => {
                if !self.active || self.phase != Phase::Processing {
                    return Vec::new();
                }
                self.speak(CONNECT_FAILURE_REPLY)
            }

            SpeechEvent::SynthesisStarted { id } => {
                if id != self.utterance || self.phase != Phase::Speaking {
                    return Vec::new();
                }
                let mut commands = Vec::new();
                if self.recognizing {
                    self.recognizing = false;
                    commands.push(SpeechCommand::StopRecognition);
                }
                self.speaking = true;
                if !self.logging_out {
                    self.phase = Phase::InterruptListening;
                    commands.push(SpeechCommand::StartInterruptListener);
                }
                commands
            }

            SpeechEvent::SynthesisEnded { id } => {
                if id != self.utterance
                    || !matches!(self.phase, Phase::Speaking | Phase::InterruptListening)
                {
                    return Vec::new();
                }
                let mut commands = Vec::new();
                if self.phase == Phase::InterruptListening {
                    commands.push(SpeechCommand::StopInterruptListener);
                }
                self.speaking = false;
                self.phase = Phase::Idle;
                if self.active {
                    commands.push(SpeechCommand::ScheduleRestart(RESTART_AFTER_SPEECH));
                }
                commands
            }

            SpeechEvent::InterruptResult(transcript) => {
                if self.phase != Phase::InterruptListening || !self.hears_wake_word(&transcript) {
                    return Vec::new();
                }
                self.utterance += 1;
                self.speaking = false;
                self.phase = Phase::Idle;
                let mut commands = vec![
                    SpeechCommand::CancelSpeech,
                    SpeechCommand::StopInterruptListener,
                ];
                commands.extend(self.start_recognition());
                commands
            }

            SpeechEvent::InterruptFailed => {
                if self.phase != Phase::InterruptListening {
                    return Vec::new();
                }
                self.phase = Phase::Speaking;
                vec![SpeechCommand::StopInterruptListener]
            }

            SpeechEvent::RestartElapsed => self.start_recognition(),

            SpeechEvent::LogOutRequested => {
                if self.logging_out {
                    return Vec::new();
                }
                let mut commands = self.silence_everything();
                self.active = false;
                self.logging_out = true;
                commands.extend(self.speak(FAREWELL));
                commands.push(SpeechCommand::LogOut {
                    after: LOGOUT_DELAY,
                });
                commands
            }
        }
    }

    fn start_recognition(&mut self) -> Vec<SpeechCommand> {
        if !self.active || self.recognizing || self.speaking || self.phase != Phase::Idle {
            return Vec::new();
        }
        self.recognizing = true;
        self.phase = Phase::Listening;
        vec![SpeechCommand::StartRecognition]
    }

    fn recognition_stopped(&mut self, restart_after: Duration) -> Vec<SpeechCommand> {
        self.recognizing = false;
        if self.phase == Phase::Listening {
            self.phase = Phase::Idle;
        }
        if self.active && !self.speaking && self.phase == Phase::Idle {
            vec![SpeechCommand::ScheduleRestart(restart_after)]
        } else {
            Vec::new()
        }
    }

    fn speak(&mut self, text: &str) -> Vec<SpeechCommand> {
        let clean = sanitize_for_speech(text);
        self.assistant_text = text.to_string();

        let mut commands = Vec::new();
        if self.recognizing {
            self.recognizing = false;
            commands.push(SpeechCommand::StopRecognition);
        }

        if clean.is_empty() {
            self.phase = Phase::Idle;
            if self.active {
                commands.push(SpeechCommand::ScheduleRestart(RESTART_AFTER_SPEECH));
            }
            return commands;
        }

        self.utterance += 1;
        self.speaking = false;
        self.phase = Phase::Speaking;
        commands.push(SpeechCommand::CancelSpeech);
        commands.push(SpeechCommand::Speak(Utterance {
            id: self.utterance,
            text: clean,
        }));
        commands
    }

    fn silence_everything(&mut self) -> Vec<SpeechCommand> {
        self.utterance += 1;
        self.recognizing = false;
        self.speaking = false;
        self.phase = Phase::Idle;
        vec![
            SpeechCommand::CancelSpeech,
            SpeechCommand::StopRecognition,
            SpeechCommand::StopInterruptListener,
        ]
    }
}
