//! Text-to-file synthesis — orchestrates the engine's write-to-file
//! capability for "save this text as an audio file".
//!
//! The synthesizer owns one job at a time: it normalizes the requested
//! file name, refuses to overwrite, submits the write, and reconciles the
//! eventual completion — notifying the listener on success, deleting the
//! partial output after a cancel. Completions are marshaled through the
//! same sink/channel hand-off the playback controller uses.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::engine::{ListenerGate, SpeechParams, SynthesisEngine, UtteranceId, completion_channel};
use crate::error::ReadAloudError;

/// Extension appended to every output file.
const OUTPUT_EXTENSION: &str = "wav";

/// Callback surface for file synthesis.
pub trait SynthesisListener: Send {
    /// A file finished synthesizing and is ready on disk.
    fn on_file_synthesized(&mut self, path: &Path);
}

/// One outstanding write job.
#[derive(Debug)]
struct PendingJob {
    utterance: UtteranceId,
    path: PathBuf,
}

/// Drives a [`SynthesisEngine`] to write texts as audio files.
pub struct FileSynthesizer {
    engine: Box<dyn SynthesisEngine>,
    listener: Box<dyn SynthesisListener>,
    output_dir: PathBuf,

    gate: ListenerGate,
    completions: mpsc::UnboundedReceiver<UtteranceId>,

    pending: Option<PendingJob>,
    next_utterance: u64,
    canceled: bool,
}

impl FileSynthesizer {
    /// Create a synthesizer writing into `output_dir` (created lazily on
    /// the first job).
    #[must_use]
    pub fn new(
        mut engine: Box<dyn SynthesisEngine>,
        listener: Box<dyn SynthesisListener>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let (sink, gate, completions) = completion_channel();
        engine.set_completion_sink(sink);

        Self {
            engine,
            listener,
            output_dir: output_dir.into(),
            gate,
            completions,
            pending: None,
            next_utterance: 0,
            canceled: false,
        }
    }

    /// Whether a job is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Begin synthesizing `text` into `<output_dir>/<name>.wav`.
    ///
    /// `name` is normalized first: a trailing `.wav` in any case is
    /// stripped and surrounding whitespace trimmed. Returns the
    /// destination path immediately; the file is announced through the
    /// listener once the engine's completion is consumed by
    /// [`pump`](Self::pump).
    pub fn write(
        &mut self,
        text: &str,
        params: &SpeechParams,
        name: &str,
    ) -> Result<PathBuf, ReadAloudError> {
        if self.pending.is_some() {
            return Err(ReadAloudError::SynthesisBusy);
        }

        let name = normalize_name(name)?;
        let path = self.output_dir.join(format!("{name}.{OUTPUT_EXTENSION}"));
        if path.exists() {
            return Err(ReadAloudError::FileExists(path));
        }

        fs::create_dir_all(&self.output_dir)?;

        self.canceled = false;
        self.gate.attach();

        let utterance = UtteranceId::new(self.next_utterance);
        self.next_utterance += 1;
        self.engine
            .synthesize_to_file(text, &path, utterance, params)?;
        self.pending = Some(PendingJob {
            utterance,
            path: path.clone(),
        });

        tracing::info!(path = %path.display(), "File synthesis started");
        Ok(path)
    }

    /// Cancel the outstanding job, if any.
    ///
    /// The partial output file is removed once the engine acknowledges the
    /// abort through its completion notification.
    pub fn cancel(&mut self) {
        if self.pending.is_none() {
            return;
        }

        self.canceled = true;
        self.engine.stop();
    }

    /// Drain completion notifications delivered by the engine.
    ///
    /// Never blocks; call from the synthesizer's own execution context.
    pub fn pump(&mut self) {
        while let Ok(utterance) = self.completions.try_recv() {
            self.handle_completion(utterance);
        }
    }

    fn handle_completion(&mut self, utterance: UtteranceId) {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|job| job.utterance == utterance);
        if !matches {
            tracing::debug!(%utterance, "Dropping stale synthesis completion");
            return;
        }

        let job = self.pending.take().expect("matched job is present");
        self.gate.detach();

        if self.canceled {
            self.canceled = false;
            remove_partial_file(&job.path);
            tracing::info!(path = %job.path.display(), "Synthesis canceled; partial file removed");
        } else {
            tracing::info!(path = %job.path.display(), "File synthesized");
            self.listener.on_file_synthesized(&job.path);
        }
    }
}

/// Strip a trailing `.wav` (any case) and surrounding whitespace.
fn normalize_name(name: &str) -> Result<String, ReadAloudError> {
    let trimmed = name.trim();
    let stripped = trimmed
        .get(trimmed.len().wrapping_sub(4)..)
        .filter(|tail| tail.eq_ignore_ascii_case(".wav"))
        .map_or(trimmed, |_| &trimmed[..trimmed.len() - 4]);

    let normalized = stripped.trim();
    if normalized.is_empty() {
        return Err(ReadAloudError::InvalidFileName(name.to_string()));
    }

    Ok(normalized.to_string())
}

/// Best-effort removal of a canceled job's partial output.
fn remove_partial_file(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        if error.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), %error, "Failed to remove partial file");
        }
    }
}
