//! Terminal speech backend
//!
//! Stands in for a microphone and loudspeaker. Typed lines are "spoken" to
//! the recognizer while it is listening; synthesized text is printed as
//! `S> ...` and "played" for a time proportional to its length. Lines
//! beginning with `/` are UI commands instead of speech.

use super::{AudioInputHandle, AuthToken, AzureVoiceCatalog, SpeechError, Utterance, Voice};
use crate::runtime::{
    EventSink, Recognizer, RecognizerParams, SpeechBackend, Synthesizer, SynthesizerParams,
};
use crate::state_machine::Event;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PLAYBACK_PER_WORD: Duration = Duration::from_millis(300);
const MIN_PLAYBACK: Duration = Duration::from_millis(500);

/// One parsed line of terminal input
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// A UI gesture for the session
    Command(Event),
    /// Something the user "said"
    Speech(String),
    Blank,
}

/// Parse a line of terminal input
pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Blank);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ConsoleInput::Speech(line.to_string()));
    };

    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let event = match name {
        "click" => Event::Click,
        "alt" => Event::ShowAlternatives,
        "listen" => Event::Listen,
        "speak" if !argument.is_empty() => Event::speak(argument),
        "speak" => return Err("usage: /speak <text>".to_string()),
        "select" => {
            let value = serde_json::from_str(argument)
                .map_err(|e| format!("usage: /select <json> ({e})"))?;
            Event::Select { value }
        }
        other => return Err(format!("unknown command /{other}")),
    };
    Ok(ConsoleInput::Command(event))
}

/// State shared between the recognizer and the stdin reader
#[derive(Debug, Default)]
struct Microphone {
    listening: AtomicBool,
    sink: Mutex<Option<EventSink>>,
}

impl Microphone {
    fn hear(&self, speech: &str) -> bool {
        if !self.listening.load(Ordering::SeqCst) {
            return false;
        }
        let Ok(sink) = self.sink.lock() else {
            return false;
        };
        match sink.as_ref() {
            Some(sink) => {
                sink.speech_started();
                sink.final_result(speech, 1.0);
                true
            }
            None => false,
        }
    }

    /// The input device is gone; recognition cannot continue
    fn lost(&self, message: String) {
        if let Ok(sink) = self.sink.lock() {
            if let Some(sink) = sink.as_ref() {
                sink.recognition_error(message, true);
            }
        }
    }
}

/// Speech backend driven by the terminal
#[derive(Debug, Clone)]
pub struct ConsoleBackend {
    microphone: Arc<Microphone>,
    catalog: AzureVoiceCatalog,
}

impl ConsoleBackend {
    pub fn new(catalog: AzureVoiceCatalog) -> Self {
        Self {
            microphone: Arc::new(Microphone::default()),
            catalog,
        }
    }

    /// Read stdin until EOF, routing commands to `ui_tx` and speech to the
    /// recognizer
    pub async fn read_stdin(self, ui_tx: mpsc::Sender<Event>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !self.route(&line, &ui_tx).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read terminal input");
                    self.microphone.lost(format!("Terminal input failed: {e}"));
                    break;
                }
            }
        }
        tracing::info!("Terminal input closed");
    }

    /// Route one line. Returns false once the session is gone.
    async fn route(&self, line: &str, ui_tx: &mpsc::Sender<Event>) -> bool {
        match parse_line(line) {
            Ok(ConsoleInput::Command(event)) => ui_tx.send(event).await.is_ok(),
            Ok(ConsoleInput::Speech(speech)) => {
                if !self.microphone.hear(&speech) {
                    tracing::debug!("Not listening; speech dropped");
                }
                true
            }
            Ok(ConsoleInput::Blank) => true,
            Err(message) => {
                tracing::warn!(%message, "Invalid terminal command");
                true
            }
        }
    }
}

#[async_trait]
impl SpeechBackend for ConsoleBackend {
    fn open_capture(&self) -> Result<AudioInputHandle, SpeechError> {
        Ok(AudioInputHandle::new())
    }

    async fn request_microphone(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    fn create_recognizer(
        &self,
        params: &RecognizerParams,
        sink: EventSink,
    ) -> Result<Box<dyn Recognizer>, SpeechError> {
        if params.auth_token.is_none() {
            return Err(SpeechError::unavailable("Recognizer requires an authorization token"));
        }
        let mut slot = self
            .microphone
            .sink
            .lock()
            .map_err(|_| SpeechError::client("Microphone state poisoned"))?;
        *slot = Some(sink);
        tracing::debug!(
            language = %params.language,
            continuous = params.continuous,
            interim_results = params.interim_results,
            "Created console recognizer"
        );
        Ok(Box::new(ConsoleRecognizer {
            microphone: self.microphone.clone(),
        }))
    }

    fn create_synthesizer(
        &self,
        params: &SynthesizerParams,
        sink: EventSink,
    ) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        Ok(Arc::new(ConsoleSynthesizer {
            catalog: self.catalog.clone(),
            token: params.auth_token.clone(),
            sink,
            playing: Mutex::new(None),
        }))
    }
}

struct ConsoleRecognizer {
    microphone: Arc<Microphone>,
}

impl Recognizer for ConsoleRecognizer {
    fn start(&mut self) -> Result<(), SpeechError> {
        self.microphone.listening.store(true, Ordering::SeqCst);
        println!("(listening)");
        Ok(())
    }

    fn abort(&mut self) {
        self.microphone.listening.store(false, Ordering::SeqCst);
    }
}

/// Playback time for a piece of text
pub fn playback_duration(text: &str) -> Duration {
    let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
    (PLAYBACK_PER_WORD * words).max(MIN_PLAYBACK)
}

struct ConsoleSynthesizer {
    catalog: AzureVoiceCatalog,
    token: Option<AuthToken>,
    sink: EventSink,
    playing: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl Synthesizer for ConsoleSynthesizer {
    async fn voices(&self) -> Result<Vec<Voice>, SpeechError> {
        let token = self.token.as_ref().ok_or_else(|| {
            SpeechError::unavailable("Voice catalog requires an authorization token")
        })?;
        self.catalog.list(token).await
    }

    fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        let cancel = CancellationToken::new();
        {
            let mut playing = self
                .playing
                .lock()
                .map_err(|_| SpeechError::client("Playback state poisoned"))?;
            if let Some(previous) = playing.replace(cancel.clone()) {
                previous.cancel();
            }
        }

        println!("S> {}", utterance.text);
        let delay = playback_duration(&utterance.text);
        let sink = self.sink.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => sink.utterance_finished(utterance.id),
            }
        });
        Ok(())
    }

    fn cancel(&self) {
        if let Ok(mut playing) = self.playing.lock() {
            if let Some(token) = playing.take() {
                token.cancel();
            }
        }
    }
}
