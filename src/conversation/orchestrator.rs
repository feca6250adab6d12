//! Turn-taking conversation orchestrator
//!
//! Drives one spoken conversation through
//! `idle -> ai_speaking -> user_speaking -> processing -> ai_speaking -> ...`.
//!
//! - Every transition goes through the shared [`StateCell`]. A send is only
//!   accepted by winning the `user_speaking -> processing` transition, so a
//!   manual send racing a silence timeout produces exactly one turn.
//! - Each session owns a cancellation token. `end_conversation` cancels it;
//!   an in-flight turn notices at its next await and returns
//!   [`TurnOutcome::Cancelled`] without touching state.
//! - Collaborator failures inside a turn put the conversation back into
//!   `user_speaking` with the microphone recording again, then surface the error.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::messages::{ConversationMessage, MessageLog};
use super::recorder::Recorder;
use super::silence::SilenceDetector;
use super::state::{ConversationState, StateCell};
use crate::config::ConversationConfig;
use crate::error::RapportError;
use crate::services::{AudioCapture, AudioOutput, ReplyGenerator, SpeechSynthesizer, Transcriber};

/// Collaborators the orchestrator sequences
#[derive(Clone)]
pub struct ConversationServices {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ReplyGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub output: Arc<dyn AudioOutput>,
    pub capture: Arc<dyn AudioCapture>,
}

/// How a start or send request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn ran to completion and the microphone is recording again
    Completed,
    /// The transcription was empty; recording resumed without a new message
    NoSpeech,
    /// The conversation was not in `user_speaking`, so nothing happened
    Ignored,
    /// The session ended while the turn was in flight
    Cancelled,
}

#[derive(Debug, Default, Clone, Copy)]
struct SessionClock {
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

pub struct Orchestrator {
    services: ConversationServices,
    state: StateCell,
    messages: Mutex<MessageLog>,
    silence: Arc<SilenceDetector>,
    recorder: Recorder,
    cancel: Mutex<CancellationToken>,
    clock: Mutex<SessionClock>,
    silence_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl Orchestrator {
    pub fn new(services: ConversationServices, config: &ConversationConfig) -> Arc<Self> {
        let state = StateCell::new();
        let (silence, silence_rx) = SilenceDetector::new(config.silence_timeout(), state.clone());
        let silence = Arc::new(silence);
        let recorder = Recorder::new(services.capture.clone(), silence.clone());

        Arc::new(Self {
            services,
            state,
            messages: Mutex::new(MessageLog::new()),
            silence,
            recorder,
            cancel: Mutex::new(CancellationToken::new()),
            clock: Mutex::new(SessionClock::default()),
            silence_rx: Mutex::new(Some(silence_rx)),
        })
    }

    pub fn state(&self) -> ConversationState {
        self.state.current()
    }

    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    /// Committed messages, oldest first
    pub fn messages(&self) -> Vec<ConversationMessage> {
        lock(&self.messages).messages().to_vec()
    }

    /// Reply currently being spoken, not yet in the message log
    pub fn pending_reply(&self) -> Option<String> {
        lock(&self.messages).pending_reply().map(str::to_string)
    }

    pub fn user_transcript(&self) -> String {
        lock(&self.messages).user_transcript()
    }

    /// Seconds since the last `start_conversation`, frozen at `end_conversation`
    pub fn duration_seconds(&self) -> f64 {
        let clock = *lock(&self.clock);
        match clock.started_at {
            Some(start) => {
                let end = clock.ended_at.unwrap_or_else(Utc::now);
                (end - start).num_milliseconds().max(0) as f64 / 1000.0
            }
            None => 0.0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Feed the live speech recognizer's running transcript to the silence detector
    pub fn observe_transcript(&self, transcript: &str) -> bool {
        self.silence.observe(transcript)
    }

    /// Speak an opening line, then hand the floor to the user.
    ///
    /// Fails with `InvalidState` unless the conversation is idle. If the
    /// opening line cannot be generated or spoken the conversation returns to
    /// idle and the error is returned.
    pub async fn start_conversation(self: &Arc<Self>) -> Result<TurnOutcome, RapportError> {
        if !self
            .state
            .transition(ConversationState::Idle, ConversationState::AiSpeaking)
        {
            return Err(RapportError::InvalidState(format!(
                "cannot start a conversation while {}",
                self.state.current()
            )));
        }

        self.spawn_silence_listener();
        let token = self.begin_session();
        info!("conversation started");

        let opening_line = self.services.generator.generate_reply(&[]);
        let opening = match until_cancelled(&token, opening_line).await {
            None => return Ok(TurnOutcome::Cancelled),
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                self.abort_start(&token, &e);
                return Err(e);
            }
        };

        lock(&self.messages).stage_reply(opening.clone());
        match self.speak(&token, &opening).await {
            None => {
                lock(&self.messages).discard_pending();
                return Ok(TurnOutcome::Cancelled);
            }
            Some(Err(e)) => {
                lock(&self.messages).discard_pending();
                self.abort_start(&token, &e);
                return Err(e);
            }
            Some(Ok(())) => {}
        }
        lock(&self.messages).commit_pending();

        self.begin_user_turn(&token, ConversationState::AiSpeaking).await
    }

    /// End the user's turn: transcribe, reply, speak, and resume recording.
    ///
    /// Both the manual send and the silence detector call this. Only a caller
    /// that finds the conversation in `user_speaking` proceeds; everyone else
    /// gets [`TurnOutcome::Ignored`].
    pub async fn send_message(&self) -> Result<TurnOutcome, RapportError> {
        if !self
            .state
            .transition(ConversationState::UserSpeaking, ConversationState::Processing)
        {
            debug!(state = %self.state.current(), "send suppressed");
            return Ok(TurnOutcome::Ignored);
        }
        let token = lock(&self.cancel).clone();

        let clip = match self.recorder.stop().await {
            Ok(clip) => clip.unwrap_or_default(),
            Err(e) => return self.recover(&token, e).await,
        };
        if token.is_cancelled() {
            return Ok(TurnOutcome::Cancelled);
        }

        let transcript = if clip.is_empty() {
            String::new()
        } else {
            match until_cancelled(&token, self.services.transcriber.transcribe(&clip)).await {
                None => return Ok(TurnOutcome::Cancelled),
                Some(Ok(text)) => text,
                Some(Err(e)) => return self.recover(&token, e).await,
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            debug!("empty transcription, resuming recording");
            return match self.begin_user_turn(&token, ConversationState::Processing).await? {
                TurnOutcome::Completed => Ok(TurnOutcome::NoSpeech),
                other => Ok(other),
            };
        }

        let history = {
            let mut log = lock(&self.messages);
            log.push_user(transcript);
            log.messages().to_vec()
        };
        debug!(turns = history.len(), "requesting reply");

        let reply =
            match until_cancelled(&token, self.services.generator.generate_reply(&history)).await {
                None => return Ok(TurnOutcome::Cancelled),
                Some(Ok(text)) => text,
                Some(Err(e)) => return self.recover(&token, e).await,
            };

        lock(&self.messages).stage_reply(reply.clone());
        if !self
            .state
            .transition(ConversationState::Processing, ConversationState::AiSpeaking)
        {
            lock(&self.messages).discard_pending();
            return Ok(TurnOutcome::Cancelled);
        }

        match self.speak(&token, &reply).await {
            None => {
                lock(&self.messages).discard_pending();
                return Ok(TurnOutcome::Cancelled);
            }
            Some(Err(e)) => {
                lock(&self.messages).discard_pending();
                return self.recover(&token, e).await;
            }
            Some(Ok(())) => {}
        }
        lock(&self.messages).commit_pending();

        self.begin_user_turn(&token, ConversationState::AiSpeaking).await
    }

    /// Stop everything and return to idle. Valid from any state.
    pub async fn end_conversation(&self) {
        lock(&self.cancel).cancel();
        self.silence.disarm();
        lock(&self.messages).discard_pending();
        let previous = self.state.set(ConversationState::Idle);
        self.stop_clock();

        self.services.output.stop().await;
        self.recorder.force_stop().await;
        info!(from = %previous, "conversation ended");
    }

    fn begin_session(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.cancel) = token.clone();
        lock(&self.messages).clear();
        *lock(&self.clock) = SessionClock {
            started_at: Some(Utc::now()),
            ended_at: None,
        };
        token
    }

    /// Forward silence firings to `send_message` for as long as the orchestrator lives
    fn spawn_silence_listener(self: &Arc<Self>) {
        let Some(mut rx) = lock(&self.silence_rx).take() else {
            return;
        };
        let orchestrator = Arc::downgrade(self);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                match orchestrator.send_message().await {
                    Ok(outcome) => debug!(?outcome, "silence-triggered send finished"),
                    Err(e) => warn!(error = %e, "silence-triggered send failed"),
                }
            }
        });
    }

    async fn speak(
        &self,
        token: &CancellationToken,
        text: &str,
    ) -> Option<Result<(), RapportError>> {
        let synthesis = self.services.synthesizer.synthesize(text);
        let audio = match until_cancelled(token, synthesis).await? {
            Ok(audio) => audio,
            Err(e) => return Some(Err(e)),
        };
        until_cancelled(token, self.services.output.play(&audio)).await
    }

    /// Hand the floor to the user and start recording
    async fn begin_user_turn(
        &self,
        token: &CancellationToken,
        from: ConversationState,
    ) -> Result<TurnOutcome, RapportError> {
        if !self.state.transition(from, ConversationState::UserSpeaking) {
            return Ok(TurnOutcome::Cancelled);
        }

        if let Err(e) = self.recorder.start().await {
            error!(error = %e, "cannot resume recording, ending conversation");
            if self
                .state
                .transition(ConversationState::UserSpeaking, ConversationState::Idle)
            {
                self.stop_clock();
            }
            return Err(e);
        }

        if token.is_cancelled() {
            self.recorder.force_stop().await;
            return Ok(TurnOutcome::Cancelled);
        }
        Ok(TurnOutcome::Completed)
    }

    /// Put a failed turn back into `user_speaking` and surface the failure
    async fn recover(
        &self,
        token: &CancellationToken,
        failure: RapportError,
    ) -> Result<TurnOutcome, RapportError> {
        warn!(error = %failure, "turn failed, returning to user_speaking");
        if token.is_cancelled() {
            return Err(failure);
        }

        let from = self.state.current();
        if matches!(from, ConversationState::Processing | ConversationState::AiSpeaking) {
            self.begin_user_turn(token, from).await?;
        }
        Err(failure)
    }

    fn abort_start(&self, token: &CancellationToken, failure: &RapportError) {
        error!(error = %failure, "failed to open conversation");
        if !token.is_cancelled()
            && self
                .state
                .transition(ConversationState::AiSpeaking, ConversationState::Idle)
        {
            self.stop_clock();
        }
    }

    /// Freeze `duration_seconds` at the moment the conversation went idle
    fn stop_clock(&self) {
        let mut clock = lock(&self.clock);
        if clock.started_at.is_some() && clock.ended_at.is_none() {
            clock.ended_at = Some(Utc::now());
        }
    }
}

/// Run `fut` unless `token` is cancelled first
async fn until_cancelled<T>(token: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
