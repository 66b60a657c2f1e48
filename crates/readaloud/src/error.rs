//! Read-aloud error types.

use std::path::PathBuf;

/// Errors that can occur while driving speech playback or file synthesis.
///
/// Recoverable playback conditions (stale completions, out-of-range
/// cursors, an exhausted text) never surface here — the controller handles
/// them internally and callers only observe listener callbacks. This enum
/// covers the genuinely fallible surface: engine submissions and the file
/// synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum ReadAloudError {
    /// The engine rejected an utterance submission.
    #[error("Speech engine rejected utterance: {0}")]
    Engine(String),

    /// A file-synthesis job is already outstanding.
    #[error("A synthesis job is already in progress")]
    SynthesisBusy,

    /// The requested output file already exists — never overwritten.
    #[error("Output file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// The requested file name was empty after normalization.
    #[error("Invalid output file name: {0:?}")]
    InvalidFileName(String),

    /// IO error (output directory creation, partial-file cleanup).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
