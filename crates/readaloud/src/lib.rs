#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod controller;
pub mod engine;
pub mod error;
pub mod language;
pub mod segment;
pub mod synth;

// Re-export key types for convenience
pub use controller::{
    ChannelListener, PlaybackConfig, PlaybackController, PlaybackEvent, PlaybackListener,
    PlaybackState,
};
pub use engine::{
    CompletionSink, QueueMode, SpeechEngine, SpeechParams, SynthesisEngine, UtteranceId,
};
pub use error::ReadAloudError;
pub use language::{Language, supported_languages};
pub use segment::{Granularity, SegmentIterator};
pub use synth::{FileSynthesizer, SynthesisListener};
