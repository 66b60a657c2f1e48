//! Granular playback controller — the state machine that walks a text
//! through a speech engine one unit at a time.
//!
//! ```text
//!   Idle → Speaking ⇄ Paused → Idle
//! ```
//!
//! Public methods are called from a single logical UI context and never
//! block. The engine reports utterance completions from a thread of its
//! own; they are funneled through a channel and consumed by
//! [`pump`](PlaybackController::pump) on the caller's context, so the
//! controller's state is only ever touched from one side and no locking is
//! needed. Completions for superseded utterances are matched against the
//! outstanding correlation token and dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::{
    ListenerGate, QueueMode, SpeechEngine, SpeechParams, UtteranceId, completion_channel,
};
use crate::language::Language;
use crate::segment::{Granularity, SegmentIterator};

// ── Playback state ─────────────────────────────────────────────────

/// Current state of the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No text is loaded and nothing is outstanding at the engine.
    Idle,

    /// A sequence is active and the engine is (or is about to be) speaking.
    Speaking,

    /// A sequence is active but playback is held.
    Paused,
}

// ── Listener ───────────────────────────────────────────────────────

/// Lifecycle callbacks emitted by [`PlaybackController`].
///
/// `on_unit_selected` fires exactly once per unit, at selection time —
/// whether the unit was reached by automatic advance or chosen by an
/// explicit navigation call.
pub trait PlaybackListener: Send {
    /// A new read-through was started via [`PlaybackController::speak`].
    fn on_sequence_started(&mut self);

    /// The unit at `start..end` (byte offsets) became the current unit.
    fn on_unit_selected(&mut self, start: usize, end: usize);

    /// The sequence finished — the text was exhausted, or
    /// [`PlaybackController::stop`] was called while a sequence was active.
    fn on_sequence_completed(&mut self);
}

/// Playback lifecycle events, for the channel-backed listener adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A new read-through was started.
    SequenceStarted,

    /// The unit at `start..end` became the current unit.
    UnitSelected { start: usize, end: usize },

    /// The sequence finished.
    SequenceCompleted,
}

/// [`PlaybackListener`] adapter that forwards every callback into an
/// unbounded channel, for applications that drive their UI from an async
/// task rather than a direct callback.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl ChannelListener {
    /// Create the adapter and the receiver its events arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!(?event, "Playback event receiver dropped");
        }
    }
}

impl PlaybackListener for ChannelListener {
    fn on_sequence_started(&mut self) {
        self.emit(PlaybackEvent::SequenceStarted);
    }

    fn on_unit_selected(&mut self, start: usize, end: usize) {
        self.emit(PlaybackEvent::UnitSelected { start, end });
    }

    fn on_sequence_completed(&mut self) {
        self.emit(PlaybackEvent::SequenceCompleted);
    }
}

// ── Configuration ──────────────────────────────────────────────────

/// Configuration for a playback controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Engine parameters attached to every utterance.
    pub params: SpeechParams,

    /// Granularity of the reading unit.
    pub granularity: Granularity,
}

// ── Controller ─────────────────────────────────────────────────────

/// Drives a speech engine through a text, unit by unit.
///
/// Owns the text snapshot, the current unit bounds, and the pause/bypass
/// flags; issues speak requests and consumes completion notifications.
/// Lifecycle events go to the [`PlaybackListener`] supplied at
/// construction.
pub struct PlaybackController {
    engine: Box<dyn SpeechEngine>,
    listener: Box<dyn PlaybackListener>,
    segments: SegmentIterator,

    /// Immutable snapshot of the text being read. Replaced wholesale by
    /// [`set_text`](Self::set_text), never mutated in place.
    text: Option<String>,

    unit_start: usize,
    unit_end: usize,

    paused: bool,

    /// One-shot flag: the next completion must not auto-advance, because
    /// the current unit was already chosen by an explicit navigation call.
    bypass_advance: bool,

    /// Correlation token of the outstanding speak request, if any.
    pending: Option<UtteranceId>,
    next_utterance: u64,

    gate: ListenerGate,
    completions: mpsc::UnboundedReceiver<UtteranceId>,

    params: SpeechParams,
}

impl PlaybackController {
    /// Create a controller around `engine`, reporting lifecycle events to
    /// `listener`.
    ///
    /// Installs the completion sink on the engine; the controller starts
    /// Idle with no text loaded.
    #[must_use]
    pub fn new(
        mut engine: Box<dyn SpeechEngine>,
        listener: Box<dyn PlaybackListener>,
        config: PlaybackConfig,
    ) -> Self {
        let (sink, gate, completions) = completion_channel();
        engine.set_completion_sink(sink);

        Self {
            engine,
            listener,
            segments: SegmentIterator::new(config.granularity),
            text: None,
            unit_start: 0,
            unit_end: 0,
            paused: true,
            bypass_advance: false,
            pending: None,
            next_utterance: 0,
            gate,
            completions,
            params: config.params,
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Current state of the controller.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        if self.text.is_none() {
            PlaybackState::Idle
        } else if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Speaking
        }
    }

    /// Whether a sequence is active.
    ///
    /// This reflects sequence liveness — it stays `true` while Paused and
    /// only turns `false` once [`stop`](Self::stop) tears down to Idle.
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.text.is_some()
    }

    /// Bounds of the current unit, as byte offsets into the text.
    #[must_use]
    pub const fn unit(&self) -> (usize, usize) {
        (self.unit_start, self.unit_end)
    }

    /// The loaded text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The parameters attached to every utterance.
    #[must_use]
    pub const fn params(&self) -> &SpeechParams {
        &self.params
    }

    // ── Text and configuration ─────────────────────────────────────

    /// Replace the text buffer.
    ///
    /// Resets the unit cursor to the origin and re-derives segment
    /// boundaries. Does not start speaking, and does not cancel an
    /// utterance already at the engine — if one completes afterwards,
    /// reading continues from the start of the new text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();

        self.unit_start = 0;
        self.unit_end = 0;
        self.bypass_advance = false;
        self.segments.set_text(&text);
        self.text = if text.is_empty() { None } else { Some(text) };

        tracing::debug!(len = self.segments.len(), "Text buffer replaced");
    }

    /// Change the reading-unit granularity.
    ///
    /// Boundaries are re-derived over the current text and the unit cursor
    /// resets to the origin, since bounds computed under the old rules are
    /// meaningless under the new ones.
    pub fn set_granularity(&mut self, granularity: Granularity) {
        if self.segments.granularity() == granularity {
            return;
        }

        self.segments = SegmentIterator::new(granularity);
        if let Some(text) = &self.text {
            self.segments.set_text(text);
        }
        self.unit_start = 0;
        self.unit_end = 0;
        self.bypass_advance = false;

        tracing::debug!(?granularity, "Segment boundaries re-derived");
    }

    /// Set the preferred synthesis language for subsequent utterances.
    pub fn set_language(&mut self, language: Option<Language>) {
        self.params.set_language(language);
    }

    /// Set the pitch multiplier for subsequent utterances.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.params.set_pitch(pitch);
    }

    /// Set the rate multiplier for subsequent utterances.
    pub fn set_rate(&mut self, rate: f32) {
        self.params.set_rate(rate);
    }

    // ── Playback control ───────────────────────────────────────────

    /// Start reading from wherever the unit cursor currently is.
    ///
    /// Cancels any outstanding utterance, fires `on_sequence_started`, and
    /// runs the resume path.
    pub fn speak(&mut self) {
        self.pause();
        self.gate.attach();
        self.listener.on_sequence_started();
        self.resume();
    }

    /// Hold playback. The outstanding utterance is canceled; a completion
    /// that still arrives for it is dropped as stale.
    pub fn pause(&mut self) {
        self.paused = true;
        self.pending = None;
        self.engine.stop();
    }

    /// Continue playback.
    ///
    /// Runs the completion-handling path with no prior utterance, which
    /// uniformly covers "first unit of a fresh read" and "continue after
    /// pause".
    pub fn resume(&mut self) {
        if self.text.is_some() {
            self.paused = false;
        }
        self.handle_completion(None);
    }

    /// Advance to the next non-whitespace unit.
    ///
    /// Returns whether the cursor moved; at the end of the text it stays
    /// where it was. The outstanding utterance is canceled either way, and
    /// while playing the newly selected unit is submitted immediately.
    pub fn next(&mut self) -> bool {
        if self.text.is_none() {
            return false;
        }

        let moved = self.advance();
        self.bypass_advance = true;
        self.pending = None;
        self.engine.stop();

        if !self.paused {
            self.handle_completion(None);
        }

        moved
    }

    /// Retreat to the previous non-whitespace unit. Mirror of
    /// [`next`](Self::next).
    pub fn previous(&mut self) -> bool {
        if self.text.is_none() {
            return false;
        }

        let moved = self.retreat();
        self.bypass_advance = true;
        self.pending = None;
        self.engine.stop();

        if !self.paused {
            self.handle_completion(None);
        }

        moved
    }

    /// Select the unit containing (or starting at) the given text offset.
    ///
    /// Out-of-range offsets are treated as the origin. Does not cancel the
    /// outstanding utterance; when it completes, the selected unit is
    /// spoken instead of the automatic next one.
    pub fn set_segment_from_cursor(&mut self, position: usize) {
        if self.text.is_none() {
            return;
        }

        let len = self.segments.len();
        let cursor = if position >= len { 0 } else { position };

        if self.segments.is_boundary(cursor) {
            self.unit_start = cursor;
            self.unit_end = self.segments.following(cursor).unwrap_or(len);
        } else {
            self.unit_start = self.segments.preceding(cursor).unwrap_or(0);
            self.unit_end = self.segments.following(cursor).unwrap_or(len);
        }

        self.bypass_advance = true;
        self.listener
            .on_unit_selected(self.unit_start, self.unit_end);
    }

    /// Tear down to Idle.
    ///
    /// Cancels the engine, detaches completion delivery, clears the text
    /// buffer, and — if a sequence was active — fires
    /// `on_sequence_completed`. Valid from any state.
    pub fn stop(&mut self) {
        self.paused = true;
        self.pending = None;
        self.bypass_advance = false;
        self.engine.stop();
        self.gate.detach();

        if self.text.take().is_some() {
            self.listener.on_sequence_completed();
        }

        self.segments.set_text("");
        self.unit_start = 0;
        self.unit_end = 0;
    }

    // ── Completion handling ────────────────────────────────────────

    /// Drain utterance completions delivered by the engine since the last
    /// call.
    ///
    /// Call this from the same execution context the rest of the
    /// controller is driven from — typically whenever the engine's
    /// completion channel signals readiness. Never blocks.
    pub fn pump(&mut self) {
        while let Ok(utterance) = self.completions.try_recv() {
            self.handle_completion(Some(utterance));
        }
    }

    /// The completion-handling path. `None` marks a synthetic invocation
    /// from [`resume`](Self::resume) (or a navigation call) rather than a
    /// genuine engine notification.
    fn handle_completion(&mut self, utterance: Option<UtteranceId>) {
        if let Some(utterance) = utterance {
            if self.pending != Some(utterance) {
                tracing::debug!(%utterance, "Dropping stale completion");
                return;
            }
            self.pending = None;
        }

        if self.text.is_none() {
            // The sequence was torn down while the notification was in
            // flight.
            return;
        }

        if self.paused {
            return;
        }

        if self.bypass_advance {
            self.bypass_advance = false;
        } else if !self.advance() {
            self.stop();
            return;
        }

        self.speak_current_unit();
    }

    /// Move the unit cursor forward past any whitespace-only units.
    ///
    /// Commits the new bounds and emits `on_unit_selected` only on
    /// success; when no unit remains the cursor is left untouched.
    fn advance(&mut self) -> bool {
        let Some(text) = self.text.as_deref() else {
            return false;
        };

        let (mut start, mut end) = (self.unit_start, self.unit_end);
        loop {
            let Some(boundary) = self.segments.following(end) else {
                return false;
            };

            start = end;
            end = boundary;

            if !text[start..end].trim().is_empty() {
                break;
            }
        }

        self.unit_start = start;
        self.unit_end = end;
        self.listener.on_unit_selected(start, end);
        true
    }

    /// Mirror of [`advance`](Self::advance), walking backward from the
    /// current unit's start.
    fn retreat(&mut self) -> bool {
        let Some(text) = self.text.as_deref() else {
            return false;
        };

        let (mut start, mut end) = (self.unit_start, self.unit_end);
        loop {
            let Some(boundary) = self.segments.preceding(start) else {
                return false;
            };

            end = start;
            start = boundary;

            if !text[start..end].trim().is_empty() {
                break;
            }
        }

        self.unit_start = start;
        self.unit_end = end;
        self.listener.on_unit_selected(start, end);
        true
    }

    /// Submit the current unit to the engine under a fresh token.
    fn speak_current_unit(&mut self) {
        let Some(text) = self.text.as_deref() else {
            return;
        };

        let len = text.len();
        let (start, end) = (self.unit_start, self.unit_end);
        if start >= len || end > len || start > end {
            // Unit bounds out of sync with the text buffer is a bug in the
            // caller's text/cursor coordination, not a recoverable
            // condition.
            debug_assert!(
                false,
                "unit bounds {start}..{end} invalid for text of length {len}"
            );
            tracing::error!(start, end, len, "Unit bounds invalid at submission; stopping");
            self.stop();
            return;
        }

        let utterance = UtteranceId::new(self.next_utterance);
        self.next_utterance += 1;
        self.pending = Some(utterance);

        if let Err(error) = self
            .engine
            .speak(&text[start..end], QueueMode::Flush, utterance, &self.params)
        {
            tracing::warn!(%error, %utterance, "Engine rejected utterance submission");
            self.pending = None;
        }
    }
}
