//! Integration tests for the `PlaybackController` state machine.
//!
//! These tests drive the controller through its transitions using a mock
//! speech engine. No real synthesizer or audio hardware is involved — the
//! mock records every submission and lets a test fire completion
//! notifications for any recorded utterance, including deliberately stale
//! ones.

use std::sync::{Arc, Mutex};

use readaloud::{
    ChannelListener, CompletionSink, Granularity, PlaybackConfig, PlaybackController,
    PlaybackEvent, PlaybackState, QueueMode, ReadAloudError, SpeechEngine, SpeechParams,
    UtteranceId,
};
use tokio::sync::mpsc;

// ── Mock engine ────────────────────────────────────────────────────

#[derive(Default)]
struct EngineLog {
    spoken: Vec<(String, QueueMode, UtteranceId)>,
    stops: usize,
    sink: Option<CompletionSink>,
}

/// A speech engine that records submissions and completes nothing on its
/// own. Tests fire completions explicitly via [`MockEngine::complete`].
#[derive(Clone, Default)]
struct MockEngine {
    log: Arc<Mutex<EngineLog>>,
}

impl MockEngine {
    fn spoken_texts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .spoken
            .iter()
            .map(|(text, _, _)| text.clone())
            .collect()
    }

    fn utterance(&self, index: usize) -> UtteranceId {
        self.log.lock().unwrap().spoken[index].2
    }

    fn last_utterance(&self) -> UtteranceId {
        let log = self.log.lock().unwrap();
        log.spoken.last().expect("an utterance was submitted").2
    }

    fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    /// Deliver a completion notification, as the real engine would from
    /// its own thread.
    fn complete(&self, utterance: UtteranceId) {
        let log = self.log.lock().unwrap();
        log.sink
            .as_ref()
            .expect("controller installed the sink")
            .notify(utterance);
    }

    fn complete_last(&self) {
        self.complete(self.last_utterance());
    }
}

impl SpeechEngine for MockEngine {
    fn speak(
        &mut self,
        text: &str,
        mode: QueueMode,
        utterance: UtteranceId,
        _params: &SpeechParams,
    ) -> Result<(), ReadAloudError> {
        self.log
            .lock()
            .unwrap()
            .spoken
            .push((text.to_string(), mode, utterance));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }

    fn set_completion_sink(&mut self, sink: CompletionSink) {
        self.log.lock().unwrap().sink = Some(sink);
    }
}

// ── Helpers ────────────────────────────────────────────────────────

const TWO_SENTENCES: &str = "Hello world. Goodbye now.";

fn controller_with(
    text: &str,
    config: PlaybackConfig,
) -> (
    PlaybackController,
    MockEngine,
    mpsc::UnboundedReceiver<PlaybackEvent>,
) {
    let engine = MockEngine::default();
    let handle = engine.clone();
    let (listener, events) = ChannelListener::channel();
    let mut controller =
        PlaybackController::new(Box::new(engine), Box::new(listener), config);
    controller.set_text(text);
    (controller, handle, events)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn completed_count(events: &[PlaybackEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::SequenceCompleted))
        .count()
}

// ── Lifecycle ──────────────────────────────────────────────────────

#[test]
fn fresh_controller_is_idle() {
    let engine = MockEngine::default();
    let (listener, _events) = ChannelListener::channel();
    let controller = PlaybackController::new(
        Box::new(engine),
        Box::new(listener),
        PlaybackConfig::default(),
    );

    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(!controller.is_speaking());
    assert_eq!(controller.unit(), (0, 0));
}

#[test]
fn loading_text_parks_paused() {
    let (controller, engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    assert_eq!(controller.state(), PlaybackState::Paused);
    assert!(controller.is_speaking());
    assert!(engine.spoken_texts().is_empty(), "set_text must not speak");
}

#[test]
fn empty_text_stays_idle() {
    let (controller, _engine, _events) = controller_with("", PlaybackConfig::default());
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(!controller.is_speaking());
}

#[test]
fn speak_reads_both_sentences_then_completes() {
    let (mut controller, engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    assert_eq!(controller.state(), PlaybackState::Speaking);
    assert_eq!(engine.spoken_texts(), ["Hello world. "]);
    assert_eq!(controller.unit(), (0, 13));
    assert_eq!(
        drain(&mut events),
        [
            PlaybackEvent::SequenceStarted,
            PlaybackEvent::UnitSelected { start: 0, end: 13 },
        ]
    );

    engine.complete_last();
    controller.pump();
    assert_eq!(engine.spoken_texts(), ["Hello world. ", "Goodbye now."]);
    assert_eq!(controller.unit(), (13, 25));
    assert_eq!(
        drain(&mut events),
        [PlaybackEvent::UnitSelected { start: 13, end: 25 }]
    );

    engine.complete_last();
    controller.pump();
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(!controller.is_speaking());
    assert_eq!(drain(&mut events), [PlaybackEvent::SequenceCompleted]);
}

#[test]
fn whitespace_only_text_completes_without_speaking() {
    let (mut controller, engine, mut events) = controller_with("   ", PlaybackConfig::default());

    controller.resume();

    assert!(engine.spoken_texts().is_empty());
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert_eq!(completed_count(&drain(&mut events)), 1);
}

#[test]
fn stop_fires_sequence_completed_exactly_once() {
    let (mut controller, engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    controller.stop();
    assert!(!controller.is_speaking());
    assert_eq!(completed_count(&drain(&mut events)), 1);

    // A second stop has no sequence to complete.
    controller.stop();
    assert_eq!(completed_count(&drain(&mut events)), 0);

    // The canceled utterance's completion arrives after teardown: the
    // detached sink swallows it and nothing changes.
    engine.complete(engine.utterance(0));
    controller.pump();
    assert!(drain(&mut events).is_empty());
    assert_eq!(controller.state(), PlaybackState::Idle);
}

#[test]
fn stop_without_active_sequence_is_quiet() {
    let engine = MockEngine::default();
    let (listener, mut events) = ChannelListener::channel();
    let mut controller = PlaybackController::new(
        Box::new(engine),
        Box::new(listener),
        PlaybackConfig::default(),
    );

    controller.stop();
    assert!(drain(&mut events).is_empty());
}

// ── Navigation ─────────────────────────────────────────────────────

#[test]
fn rapid_next_parks_on_third_unit_without_speaking() {
    let (mut controller, engine, mut events) =
        controller_with("One. Two. Three.", PlaybackConfig::default());

    assert!(controller.next());
    assert!(controller.next());
    assert!(controller.next());

    assert_eq!(controller.unit(), (10, 16));
    assert!(engine.spoken_texts().is_empty(), "paused skipping must not speak");
    assert_eq!(engine.stops(), 3, "each skip cancels the engine exactly once");
    assert_eq!(
        drain(&mut events),
        [
            PlaybackEvent::UnitSelected { start: 0, end: 5 },
            PlaybackEvent::UnitSelected { start: 5, end: 10 },
            PlaybackEvent::UnitSelected { start: 10, end: 16 },
        ]
    );
}

#[test]
fn next_at_end_keeps_cursor() {
    let (mut controller, _engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    assert!(controller.next());
    assert!(controller.next());
    assert_eq!(controller.unit(), (13, 25));

    assert!(!controller.next());
    assert_eq!(controller.unit(), (13, 25));
}

#[test]
fn previous_at_start_keeps_cursor() {
    let (mut controller, _engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    assert!(!controller.previous());
    assert_eq!(controller.unit(), (0, 0));
}

#[test]
fn word_navigation_skips_whitespace_units() {
    let config = PlaybackConfig {
        granularity: Granularity::Word,
        ..PlaybackConfig::default()
    };
    let (mut controller, _engine, _events) = controller_with("Hello world", config);

    assert!(controller.next());
    assert_eq!(controller.unit(), (0, 5));

    // The space between the words is never selected.
    assert!(controller.next());
    assert_eq!(controller.unit(), (6, 11));

    assert!(controller.previous());
    assert_eq!(controller.unit(), (0, 5));
}

#[test]
fn next_during_playback_resubmits_fresh_utterance() {
    let (mut controller, engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    let first = engine.last_utterance();
    drain(&mut events);

    assert!(controller.next());
    assert_eq!(engine.spoken_texts(), ["Hello world. ", "Goodbye now."]);
    assert_ne!(engine.last_utterance(), first, "skip must use a fresh token");
    assert_eq!(
        drain(&mut events),
        [PlaybackEvent::UnitSelected { start: 13, end: 25 }]
    );

    // A completion for the canceled first utterance arriving late must not
    // double-advance.
    engine.complete(first);
    controller.pump();
    assert_eq!(controller.unit(), (13, 25));
    assert!(drain(&mut events).is_empty());
    assert_eq!(engine.spoken_texts().len(), 2);
}

#[test]
fn bounds_stay_inside_text_under_navigation() {
    let text = "Hello world. Goodbye now. The end.";
    let (mut controller, _engine, _events) = controller_with(text, PlaybackConfig::default());

    let moves: [fn(&mut PlaybackController) -> bool; 8] = [
        PlaybackController::next,
        PlaybackController::next,
        PlaybackController::previous,
        PlaybackController::next,
        PlaybackController::next,
        PlaybackController::next,
        PlaybackController::previous,
        PlaybackController::previous,
    ];

    for step in moves {
        step(&mut controller);
        let (start, end) = controller.unit();
        assert!(start <= end && end <= text.len(), "bounds {start}..{end}");
    }
}

// ── Cursor seek ────────────────────────────────────────────────────

#[test]
fn cursor_on_boundary_selects_unit_starting_there() {
    let (mut controller, _engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.set_segment_from_cursor(13);
    assert_eq!(controller.unit(), (13, 25));
    assert_eq!(
        drain(&mut events),
        [PlaybackEvent::UnitSelected { start: 13, end: 25 }]
    );
}

#[test]
fn cursor_inside_unit_selects_enclosing_unit() {
    let (mut controller, _engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.set_segment_from_cursor(5);
    assert_eq!(controller.unit(), (0, 13));

    controller.set_segment_from_cursor(17);
    assert_eq!(controller.unit(), (13, 25));
}

#[test]
fn cursor_out_of_range_is_treated_as_origin() {
    let (mut controller, _engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.set_segment_from_cursor(9000);
    assert_eq!(controller.unit(), (0, 13));
}

#[test]
fn cursor_seek_defers_speaking_to_the_next_completion() {
    let (mut controller, engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    let stops_before = engine.stops();
    drain(&mut events);

    // Seek does not cancel the in-flight utterance.
    controller.set_segment_from_cursor(13);
    assert_eq!(engine.stops(), stops_before);
    assert_eq!(
        drain(&mut events),
        [PlaybackEvent::UnitSelected { start: 13, end: 25 }]
    );

    // When the old utterance finishes, the seeked unit is spoken instead
    // of the automatic next one — and it is not announced a second time.
    engine.complete_last();
    controller.pump();
    assert_eq!(engine.spoken_texts().last().unwrap(), "Goodbye now.");
    assert!(drain(&mut events).is_empty());
}

// ── Pause / resume and stale completions ───────────────────────────

#[test]
fn pause_then_resume_moves_to_the_next_unit() {
    let (mut controller, engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    controller.pause();
    assert_eq!(controller.state(), PlaybackState::Paused);

    controller.resume();
    assert_eq!(controller.state(), PlaybackState::Speaking);
    assert_eq!(engine.spoken_texts(), ["Hello world. ", "Goodbye now."]);
}

#[test]
fn completion_of_a_paused_utterance_is_dropped() {
    let (mut controller, engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    let canceled = engine.last_utterance();
    drain(&mut events);

    controller.pause();
    engine.complete(canceled);
    controller.pump();

    assert_eq!(controller.state(), PlaybackState::Paused);
    assert_eq!(controller.unit(), (0, 13));
    assert!(drain(&mut events).is_empty());
    assert_eq!(engine.spoken_texts().len(), 1);
}

#[test]
fn set_text_during_playback_restarts_from_the_new_origin() {
    let (mut controller, engine, mut events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.speak();
    drain(&mut events);

    controller.set_text("Fresh start. Again.");
    assert_eq!(controller.unit(), (0, 0));
    assert_eq!(engine.spoken_texts().len(), 1, "live edit must not speak");

    // The old text's utterance finishes; reading continues at the start
    // of the replacement buffer.
    engine.complete_last();
    controller.pump();
    assert_eq!(engine.spoken_texts().last().unwrap(), "Fresh start. ");
    assert_eq!(controller.unit(), (0, 13));
}

// ── Configuration ──────────────────────────────────────────────────

#[test]
fn set_granularity_rederives_boundaries() {
    let (mut controller, _engine, _events) =
        controller_with("Hello world", PlaybackConfig::default());

    // Whole text is one sentence unit.
    assert!(controller.next());
    assert_eq!(controller.unit(), (0, 11));

    controller.set_granularity(Granularity::Word);
    assert_eq!(controller.unit(), (0, 0), "cursor resets under new rules");
    assert!(controller.next());
    assert_eq!(controller.unit(), (0, 5));
}

#[test]
fn params_follow_the_setters() {
    let (mut controller, _engine, _events) =
        controller_with(TWO_SENTENCES, PlaybackConfig::default());

    controller.set_pitch(1.4);
    controller.set_rate(900.0);

    assert!((controller.params().pitch() - 1.4).abs() < f32::EPSILON);
    assert!((controller.params().rate() - 2.0).abs() < f32::EPSILON);
}
