//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::speech::{AudioInputHandle, AuthToken, SpeechError, Utterance, UtteranceId, Voice};
use crate::state_machine::Event;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Source of speech service authorization tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AuthToken, SpeechError>;
}

/// Parameters for a new recognition client
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerParams {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub auth_token: Option<AuthToken>,
}

impl RecognizerParams {
    pub fn new(language: impl Into<String>, auth_token: Option<AuthToken>) -> Self {
        Self {
            language: language.into(),
            continuous: true,
            interim_results: true,
            auth_token,
        }
    }
}

/// Parameters for a new synthesis client
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizerParams {
    pub language: String,
    pub auth_token: Option<AuthToken>,
}

/// Audio devices and client factories
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Open the audio capture context
    fn open_capture(&self) -> Result<AudioInputHandle, SpeechError>;

    /// Ask the user for microphone access. Resolves once access is granted.
    async fn request_microphone(&self) -> Result<(), SpeechError>;

    fn create_recognizer(
        &self,
        params: &RecognizerParams,
        sink: EventSink,
    ) -> Result<Box<dyn Recognizer>, SpeechError>;

    fn create_synthesizer(
        &self,
        params: &SynthesizerParams,
        sink: EventSink,
    ) -> Result<Arc<dyn Synthesizer>, SpeechError>;
}

/// Continuous recognition client. Results are reported through the
/// `EventSink` it was created with.
pub trait Recognizer: Send {
    fn start(&mut self) -> Result<(), SpeechError>;

    /// Stop recognizing and discard any pending result
    fn abort(&mut self);
}

/// Speech synthesis client
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Voices available once the client has loaded them
    async fn voices(&self) -> Result<Vec<Voice>, SpeechError>;

    /// Begin playback. Completion is reported with
    /// `EventSink::utterance_finished`.
    fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Stop playback; the cancelled utterance never reports completion
    fn cancel(&self);
}

// ============================================================================
// Arc implementation for shared token sources
// ============================================================================

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn fetch_token(&self) -> Result<AuthToken, SpeechError> {
        (**self).fetch_token().await
    }
}

// ============================================================================
// Event Sink
// ============================================================================

/// Callback channel handed to speech clients. Notifications go on the
/// session's unbounded notification queue, so a busy UI queue never loses a
/// completion.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    fn post(&self, event: Event) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::debug!(event = name, "Session gone; speech client notification dropped");
        }
    }

    /// The user started speaking
    pub fn speech_started(&self) {
        self.post(Event::StartSpeech);
    }

    pub fn final_result(&self, transcript: impl Into<String>, confidence: f64) {
        self.post(Event::asr_result(transcript, confidence));
    }

    pub fn recognition_error(&self, message: impl Into<String>, fatal: bool) {
        self.post(Event::AsrError {
            message: message.into(),
            fatal,
        });
    }

    pub fn utterance_finished(&self, utterance: UtteranceId) {
        self.post(Event::UtteranceFinished { utterance });
    }
}
