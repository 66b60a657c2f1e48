//! Speech engine contracts — the capability surface the read-aloud core
//! drives.
//!
//! This module defines the [`SpeechEngine`] and [`SynthesisEngine`] traits
//! that abstract over a concrete synthesizer so the playback controller and
//! file synthesizer can be tested (and engines swapped) without touching
//! the coordination logic. Engines finish utterances asynchronously on a
//! thread of their own choosing; completions are handed back through a
//! [`CompletionSink`] and drained by the owner on its own execution
//! context, so no engine thread ever touches controller state directly.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ReadAloudError;
use crate::language::Language;

// ── Utterance identity ─────────────────────────────────────────────

/// Correlation token pairing a submitted utterance with its completion.
///
/// Tokens are opaque and never reused within one owner; a completion whose
/// token no longer matches the outstanding request is stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(u64);

impl UtteranceId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw token value, for logging.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queueing behavior for an utterance submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Discard anything still enqueued in the engine before speaking.
    ///
    /// The playback controller always submits with this mode — there should
    /// never be more than one outstanding utterance, and flushing is the
    /// safety net if that invariant slips.
    Flush,

    /// Append after whatever the engine is already speaking.
    Append,
}

// ── Speech parameters ──────────────────────────────────────────────

/// Engine parameters attached to every utterance submission.
///
/// An immutable value passed by reference into each speak request, so the
/// engine can never observe a half-updated parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    language: Option<Language>,
    pitch: f32,
    rate: f32,
}

impl SpeechParams {
    /// Multiplier bounds for pitch and rate.
    pub const RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;

    /// Neutral parameters: no language preference, pitch and rate `1.0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            language: None,
            pitch: 1.0,
            rate: 1.0,
        }
    }

    /// Set the preferred synthesis language.
    #[must_use]
    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }

    /// Set the pitch multiplier, clamped to [`Self::RANGE`].
    #[must_use]
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.set_pitch(pitch);
        self
    }

    /// Set the rate multiplier, clamped to [`Self::RANGE`].
    #[must_use]
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.set_rate(rate);
        self
    }

    /// Update the preferred synthesis language in place.
    pub fn set_language(&mut self, language: Option<Language>) {
        self.language = language;
    }

    /// Update the pitch multiplier in place, clamped to [`Self::RANGE`].
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(*Self::RANGE.start(), *Self::RANGE.end());
    }

    /// Update the rate multiplier in place, clamped to [`Self::RANGE`].
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(*Self::RANGE.start(), *Self::RANGE.end());
    }

    /// Preferred synthesis language, if any.
    #[must_use]
    pub const fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Pitch multiplier.
    #[must_use]
    pub const fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Rate multiplier.
    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.rate
    }
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self::new()
    }
}

// ── Completion hand-off ────────────────────────────────────────────

/// Completion side of the engine ↔ owner hand-off.
///
/// The engine calls [`notify`](Self::notify) from whatever thread it
/// finishes an utterance on; the owning component drains the paired
/// receiver on its own execution context. `notify` first consults a
/// liveness gate so a torn-down owner never observes a late completion.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    tx: mpsc::UnboundedSender<UtteranceId>,
    attached: Arc<AtomicBool>,
}

impl CompletionSink {
    /// Report that `utterance` finished. Never blocks.
    pub fn notify(&self, utterance: UtteranceId) {
        if !self.attached.load(Ordering::SeqCst) {
            tracing::debug!(%utterance, "Dropping completion for detached owner");
            return;
        }

        if self.tx.send(utterance).is_err() {
            tracing::debug!(%utterance, "Completion receiver dropped");
        }
    }

    /// Whether the owner is currently listening for completions.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

/// Owner-side switch for the [`CompletionSink`] liveness gate.
#[derive(Debug)]
pub(crate) struct ListenerGate(Arc<AtomicBool>);

impl ListenerGate {
    pub(crate) fn attach(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn detach(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Build the completion hand-off: the engine-facing sink, the owner-side
/// gate, and the receiver the owner drains. Starts detached.
pub(crate) fn completion_channel() -> (
    CompletionSink,
    ListenerGate,
    mpsc::UnboundedReceiver<UtteranceId>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let attached = Arc::new(AtomicBool::new(false));
    let sink = CompletionSink {
        tx,
        attached: Arc::clone(&attached),
    };

    (sink, ListenerGate(attached), rx)
}

// ── Engine traits ──────────────────────────────────────────────────

/// Minimal capability surface required of a speech engine.
///
/// One engine instance is driven by one owner at a time; sharing an engine
/// between concurrent controllers is out of contract.
pub trait SpeechEngine: Send {
    /// Submit an utterance. Must return immediately; the engine speaks
    /// asynchronously and reports completion exactly once through the
    /// installed sink — unless the utterance is canceled by [`stop`](Self::stop)
    /// first, in which case its completion is suppressed.
    fn speak(
        &mut self,
        text: &str,
        mode: QueueMode,
        utterance: UtteranceId,
        params: &SpeechParams,
    ) -> Result<(), ReadAloudError>;

    /// Cancel the current utterance immediately.
    ///
    /// Audio teardown may be eventually consistent, but no completion may
    /// be delivered for anything canceled here.
    fn stop(&mut self);

    /// Install the completion sink. Called once by the owner before the
    /// first submission.
    fn set_completion_sink(&mut self, sink: CompletionSink);

    /// Language tags this engine can synthesize, as reported by the engine.
    ///
    /// See [`supported_languages`](crate::language::supported_languages)
    /// for turning the raw list into something presentable.
    fn available_languages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// File-synthesis capability — writing an utterance to an audio file
/// instead of speaking it.
///
/// Kept separate from [`SpeechEngine`] so a playback-only engine does not
/// have to pretend it can write files.
pub trait SynthesisEngine: Send {
    /// Begin writing `text` as audio to `path`. Must return immediately;
    /// completion of `utterance` is reported through the installed sink.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        path: &Path,
        utterance: UtteranceId,
        params: &SpeechParams,
    ) -> Result<(), ReadAloudError>;

    /// Abort the current write.
    ///
    /// Unlike [`SpeechEngine::stop`], the aborted utterance still reports
    /// completion — the synthesizer needs that signal to clean up the
    /// partial output file.
    fn stop(&mut self);

    /// Install the completion sink. Called once by the owner before the
    /// first submission.
    fn set_completion_sink(&mut self, sink: CompletionSink);
}
