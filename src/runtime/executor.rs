//! Session runtime executor

use super::timers::TimerTable;
use super::traits::{
    EventSink, Recognizer, RecognizerParams, SpeechBackend, Synthesizer, SynthesizerParams,
    TokenSource,
};
use super::{SessionHandle, SessionSnapshot};

use crate::dialogue::DialogueRegion;
use crate::speech::{ClientHandle, Utterance, UtteranceId, VoicePattern};
use crate::state_machine::presentation;
use crate::state_machine::{
    transition, ContextPatch, Effect, Event, PresentationState, SessionContext, TransitionError,
    TurnState,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Settings the executor needs to construct speech clients
#[derive(Debug, Clone, Default)]
pub struct RuntimeSettings {
    pub language: String,
    pub voice_pattern: VoicePattern,
}

/// Orchestrates the turn manager, presentation and dialogue regions over one
/// inbound event queue and executes the turn manager's effects
pub struct SessionRuntime<T, B>
where
    T: TokenSource + 'static,
    B: SpeechBackend + 'static,
{
    context: SessionContext,
    state: TurnState,
    presentation: PresentationState,
    dialogue: Box<dyn DialogueRegion>,
    token_source: Arc<T>,
    backend: Arc<B>,
    settings: RuntimeSettings,
    recognizer: Option<Box<dyn Recognizer>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    timers: TimerTable,
    /// Utterance currently playing; completions of anything else are stale
    current_utterance: Option<UtteranceId>,
    next_utterance: u64,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    /// Speech client notifications; unbounded so completions are never lost
    notify_rx: mpsc::UnboundedReceiver<Event>,
    notify_tx: mpsc::UnboundedSender<Event>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<T, B> SessionRuntime<T, B>
where
    T: TokenSource + 'static,
    B: SpeechBackend + 'static,
{
    pub fn new(
        context: SessionContext,
        token_source: T,
        backend: B,
        dialogue: Box<dyn DialogueRegion>,
        settings: RuntimeSettings,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let state = TurnState::default();
        let presentation = PresentationState::default();
        let (snapshot_tx, _) =
            watch::channel(SessionSnapshot::capture(&state, presentation, &context));
        Self {
            context,
            state,
            presentation,
            dialogue,
            token_source: Arc::new(token_source),
            backend: Arc::new(backend),
            settings,
            recognizer: None,
            synthesizer: None,
            timers: TimerTable::new(),
            current_utterance: None,
            next_utterance: 0,
            event_rx,
            event_tx,
            notify_rx,
            notify_tx,
            snapshot_tx,
        }
    }

    /// Handle for feeding events in and observing snapshots
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.event_tx.clone(), self.snapshot_tx.subscribe())
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        loop {
            let event = tokio::select! {
                biased;
                Some(event) = self.notify_rx.recv() => event,
                Some(event) = self.event_rx.recv() => event,
                else => break,
            };
            self.process_event(event);
            self.publish();
        }

        self.shutdown();
        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    /// Run one macrostep: the inbound event and everything it raises, in
    /// FIFO order, before the next inbound event is looked at
    fn process_event(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(current) = queue.pop_front() {
            let Some(current) = self.admit(current) else {
                continue;
            };
            queue.extend(self.dispatch(&current));
        }

        debug_assert!(
            !self.state.is_transient(),
            "macrostep ended in transient state {}",
            self.state.path()
        );
    }

    /// Translate internal notifications into vocabulary events, dropping
    /// stale ones
    fn admit(&mut self, event: Event) -> Option<Event> {
        match event {
            Event::TimerFired { timer, generation } => {
                if self.timers.fire(timer, generation) {
                    Some(timer.event())
                } else {
                    tracing::debug!(?timer, generation, "Dropping stale timer fire");
                    None
                }
            }
            Event::UtteranceFinished { utterance } => {
                if self.current_utterance == Some(utterance) {
                    self.current_utterance = None;
                    Some(Event::EndSpeech)
                } else {
                    tracing::debug!(%utterance, "Dropping completion of cancelled utterance");
                    None
                }
            }
            other => Some(other),
        }
    }

    /// Broadcast one event to all regions. Returns the events it raised,
    /// turn manager's first.
    fn dispatch(&mut self, event: &Event) -> Vec<Event> {
        let effects = self.advance_turn(event);

        if let Some(next) = presentation::transition(self.presentation, event) {
            tracing::debug!(from = ?self.presentation, to = ?next, "Presentation changed");
            self.presentation = next;
        }

        let output = self.dialogue.on_event(event, &self.context);
        self.record(output.patch.into());

        let mut raised = Vec::new();
        for effect in effects {
            if let Some(generated) = self.execute_effect(effect) {
                raised.push(generated);
            }
        }
        raised.extend(output.raise);
        raised
    }

    fn advance_turn(&mut self, event: &Event) -> Vec<Effect> {
        let result = match transition(&self.state, &self.context, event) {
            Ok(result) => result,
            Err(e @ TransitionError::Unhandled { .. }) => {
                tracing::trace!(error = %e, "Event ignored by turn manager");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, event = event.name(), "Rejected event");
                return Vec::new();
            }
        };

        self.record(result.patch);

        if result.new_state != self.state {
            tracing::info!(
                session_id = %self.context.session_id,
                from = self.state.path(),
                to = result.new_state.path(),
                event = event.name(),
                "Turn state changed"
            );
        }
        if let TurnState::Fail { reason } = &result.new_state {
            if !self.state.is_terminal() {
                tracing::error!(session_id = %self.context.session_id, %reason, "Session failed");
            }
        }
        self.state = result.new_state;

        if matches!(event, Event::Recognized) {
            if let Some(top) = self.context.top_hypothesis() {
                tracing::info!(confidence = top.confidence, "U> {}", top.utterance);
            }
        }

        result.effects
    }

    fn record(&mut self, patch: ContextPatch) {
        if patch.is_empty() {
            return;
        }
        if let Err(e) = self.context.apply(patch) {
            tracing::warn!(session_id = %self.context.session_id, error = %e, "Context write rejected");
        }
    }

    fn spawn_event<F>(&self, future: F)
    where
        F: std::future::Future<Output = Option<Event>> + Send + 'static,
    {
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Some(event) = future.await {
                let _ = event_tx.send(event).await;
            }
        });
    }

    /// Execute an effect and optionally return an event it generated
    /// synchronously. Failures become events; nothing escapes as an error.
    #[allow(clippy::too_many_lines)] // One arm per effect
    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::OpenAudioInput => match self.backend.open_capture() {
                Ok(handle) => {
                    self.record(ContextPatch {
                        audio_input: Some(handle),
                        ..Default::default()
                    });
                    None
                }
                Err(e) => Some(Event::AsrError {
                    message: format!("Failed to open audio input: {e}"),
                    fatal: true,
                }),
            },

            Effect::RequestMicrophone => {
                let backend = self.backend.clone();
                self.spawn_event(async move {
                    match backend.request_microphone().await {
                        Ok(()) => {
                            tracing::debug!("Microphone access granted");
                            None
                        }
                        Err(e) => Some(Event::AsrError {
                            message: format!("Microphone unavailable: {e}"),
                            fatal: true,
                        }),
                    }
                });
                None
            }

            Effect::FetchToken => {
                let token_source = self.token_source.clone();
                self.spawn_event(async move {
                    Some(match token_source.fetch_token().await {
                        Ok(token) => Event::TokenReceived { token },
                        Err(e) => {
                            tracing::warn!(error = %e, kind = ?e.kind, "Token fetch failed");
                            Event::TokenFailed {
                                message: e.to_string(),
                            }
                        }
                    })
                });
                None
            }

            Effect::CreateRecognizer => {
                let params = RecognizerParams::new(
                    self.settings.language.clone(),
                    self.context.auth_token.clone(),
                );
                let sink = EventSink::new(self.notify_tx.clone());
                match self.backend.create_recognizer(&params, sink) {
                    Ok(recognizer) => {
                        self.recognizer = Some(recognizer);
                        self.record(ContextPatch {
                            recognizer: Some(ClientHandle::new()),
                            ..Default::default()
                        });
                        None
                    }
                    Err(e) => Some(Event::AsrError {
                        message: format!("Failed to create recognizer: {e}"),
                        fatal: true,
                    }),
                }
            }

            Effect::CreateSynthesizer => {
                let params = SynthesizerParams {
                    language: self.settings.language.clone(),
                    auth_token: self.context.auth_token.clone(),
                };
                let sink = EventSink::new(self.notify_tx.clone());
                match self.backend.create_synthesizer(&params, sink) {
                    Ok(synthesizer) => {
                        self.synthesizer = Some(synthesizer);
                        self.record(ContextPatch {
                            synthesizer: Some(ClientHandle::new()),
                            ..Default::default()
                        });
                        None
                    }
                    Err(e) => Some(Event::TtsError {
                        message: format!("Failed to create synthesizer: {e}"),
                    }),
                }
            }

            Effect::AwaitVoices => {
                let Some(synthesizer) = self.synthesizer.clone() else {
                    return Some(Event::TtsError {
                        message: "No synthesis client".to_string(),
                    });
                };
                let pattern = self.settings.voice_pattern.clone();
                self.spawn_event(async move {
                    Some(match synthesizer.voices().await {
                        Ok(voices) => match pattern.require(&voices) {
                            Ok(voice) => {
                                tracing::info!(voice = %voice.name, "Selected synthesis voice");
                                Event::TtsReady {
                                    voice: voice.clone(),
                                }
                            }
                            Err(e) => Event::TtsError {
                                message: e.to_string(),
                            },
                        },
                        Err(e) => Event::TtsError {
                            message: format!("Failed to load voices: {e}"),
                        },
                    })
                });
                None
            }

            Effect::StartRecognition => {
                let Some(recognizer) = self.recognizer.as_mut() else {
                    return Some(Event::AsrError {
                        message: "No recognition client".to_string(),
                        fatal: true,
                    });
                };
                match recognizer.start() {
                    Ok(()) => {
                        tracing::debug!("Recognition started");
                        None
                    }
                    Err(e) => Some(Event::AsrError {
                        message: format!("Failed to start recognition: {e}"),
                        fatal: e.is_fatal(),
                    }),
                }
            }

            Effect::StopRecognition => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.abort();
                    tracing::debug!("Recognition aborted");
                }
                None
            }

            Effect::StartTimer { timer } => {
                self.timers
                    .arm(timer, self.context.passivity_timeout, self.event_tx.clone());
                None
            }

            Effect::CancelTimer { timer } => {
                self.timers.cancel(timer);
                None
            }

            Effect::StartSynthesis { text, voice } => {
                let Some(synthesizer) = self.synthesizer.as_ref() else {
                    return Some(Event::TtsError {
                        message: "No synthesis client".to_string(),
                    });
                };
                self.next_utterance += 1;
                let id = UtteranceId(self.next_utterance);
                tracing::info!(utterance = %id, voice = %voice.name, "S> {text}");
                match synthesizer.speak(Utterance { id, text, voice }) {
                    Ok(()) => {
                        self.current_utterance = Some(id);
                        None
                    }
                    Err(e) => Some(Event::TtsError {
                        message: format!("Failed to speak: {e}"),
                    }),
                }
            }

            Effect::StopSynthesis => {
                self.current_utterance = None;
                if let Some(synthesizer) = &self.synthesizer {
                    synthesizer.cancel();
                }
                None
            }

            Effect::Raise(event) => Some(event),
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot::capture(
            &self.state,
            self.presentation,
            &self.context,
        ));
    }

    fn shutdown(&mut self) {
        self.timers.cancel_all();
        if self.state.is_recognizing() {
            if let Some(recognizer) = self.recognizer.as_mut() {
                recognizer.abort();
            }
        }
        if let Some(synthesizer) = &self.synthesizer {
            synthesizer.cancel();
        }
    }
}
