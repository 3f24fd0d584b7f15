//! Drives a [`SpeechLoop`] against real platform adapters.
//!
//! Adapters report what happened through an [`EventSink`]; the runner feeds
//! each event to the state machine one at a time and carries out the returned
//! commands. Timers and backend calls run as spawned tasks that post their
//! outcome back into the same channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::{
    client::AssistantClient,
    speech_loop::{LoopSnapshot, SpeechCommand, SpeechEvent, SpeechLoop, Utterance},
};

#[derive(Debug, thiserror::Error)]
pub enum SpeechPlatformError {
    #[error("Recognizer is already in the requested state")]
    InvalidState,

    #[error("Speech platform unavailable: {0}")]
    Unavailable(String),

    #[error("Speech platform error: {0}")]
    Other(String),
}

/// A speech recognizer. Transcripts and lifecycle notifications go to the
/// sink the adapter was built with.
pub trait Recognizer: Send {
    fn start(&mut self) -> Result<(), SpeechPlatformError>;
    fn stop(&mut self) -> Result<(), SpeechPlatformError>;
}

/// A speech synthesizer. Must report `SynthesisStarted`/`SynthesisEnded`
/// with the utterance id.
pub trait Synthesizer: Send {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechPlatformError>;
    fn cancel(&mut self);
}

/// Cloneable handle for posting events into the loop
#[derive(Debug, Clone)]
pub struct EventSink(mpsc::UnboundedSender<SpeechEvent>);

impl EventSink {
    pub fn send(&self, event: SpeechEvent) {
        if self.0.send(event).is_err() {
            tracing::debug!("Speech loop has stopped; dropping event");
        }
    }
}

pub struct SpeechLoopRunner<R, S> {
    machine: SpeechLoop,
    recognizer: R,
    interrupt_listener: R,
    synthesizer: S,
    client: Arc<dyn AssistantClient>,
    sink: EventSink,
    events: mpsc::UnboundedReceiver<SpeechEvent>,
    snapshot: watch::Sender<LoopSnapshot>,
}

/// Build the event channel first so adapters can be constructed with the sink.
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<SpeechEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink(tx), rx)
}

impl<R: Recognizer, S: Synthesizer> SpeechLoopRunner<R, S> {
    pub fn new(
        machine: SpeechLoop,
        channel: (EventSink, mpsc::UnboundedReceiver<SpeechEvent>),
        recognizer: R,
        interrupt_listener: R,
        synthesizer: S,
        client: Arc<dyn AssistantClient>,
    ) -> Self {
        let (sink, events) = channel;
        let (snapshot, _) = watch::channel(machine.snapshot());
        Self {
            machine,
            recognizer,
            interrupt_listener,
            synthesizer,
            client,
            sink,
            events,
            snapshot,
        }
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Indicator and transcript updates for a UI
    pub fn subscribe(&self) -> watch::Receiver<LoopSnapshot> {
        self.snapshot.subscribe()
    }

    /// Process events until the loop is deactivated.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            let stop = matches!(event, SpeechEvent::Deactivated);
            tracing::trace!("Speech event: {:?}", event);

            for command in self.machine.handle(event) {
                self.execute(command);
            }
            self.snapshot.send_replace(self.machine.snapshot());

            if stop {
                tracing::info!("Speech loop deactivated");
                break;
            }
        }
    }

    fn execute(&mut self, command: SpeechCommand) {
        match command {
            SpeechCommand::StartRecognition => {
                report("start recognition", self.recognizer.start());
            }
            SpeechCommand::StopRecognition => {
                report("stop recognition", self.recognizer.stop());
            }
            SpeechCommand::StartInterruptListener => {
                if let Err(e) = self.interrupt_listener.start()
                    && !matches!(e, SpeechPlatformError::InvalidState)
                {
                    tracing::warn!("Interrupt listener failed to start: {}", e);
                    self.sink.send(SpeechEvent::InterruptFailed);
                }
            }
            SpeechCommand::StopInterruptListener => {
                report("stop interrupt listener", self.interrupt_listener.stop());
            }
            SpeechCommand::Speak(utterance) => {
                let id = utterance.id;
                if let Err(e) = self.synthesizer.speak(utterance) {
                    tracing::warn!("Speech synthesis failed: {}", e);
                    self.sink.send(SpeechEvent::SynthesisEnded { id });
                }
            }
            SpeechCommand::CancelSpeech => self.synthesizer.cancel(),
            SpeechCommand::Submit(transcript) => {
                let client = self.client.clone();
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    let event = match client.ask(&transcript).await {
                        Ok(reply) => SpeechEvent::ReplyReady(reply.response),
                        Err(e) => {
                            tracing::error!("Assistant request failed: {}", e);
                            SpeechEvent::ReplyFailed
                        }
                    };
                    sink.send(event);
                });
            }
            SpeechCommand::ScheduleRestart(delay) => {
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    sink.send(SpeechEvent::RestartElapsed);
                });
            }
            SpeechCommand::LogOut { after } => {
                let client = self.client.clone();
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if let Err(e) = client.logout().await {
                        tracing::warn!("Logout request failed: {}", e);
                    }
                    sink.send(SpeechEvent::Deactivated);
                });
            }
        }
    }
}

fn report(action: &str, result: Result<(), SpeechPlatformError>) {
    match result {
        Ok(()) => {}
        Err(SpeechPlatformError::InvalidState) => {
            tracing::debug!("Ignoring redundant {} call", action);
        }
        Err(e) => tracing::warn!("Failed to {}: {}", action, e),
    }
}
