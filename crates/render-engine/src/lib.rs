//! Burnin Render Engine
//!
//! Burns timed cue text into the pixels of a video, frame by frame.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ── MediaBackend::open_source ──┐
//!                                           ▼
//!                                    PlaybackClock (de-duplicated pts)
//!                                           │
//! cues.srt ── CueStore::lookup(pts) ────────┤
//!                                           ▼
//! style.json ── FontLibrary ──────── FrameCompositor
//!                                    (background → outline → fill)
//!                                           │
//!                                           ▼
//!                                   StreamEncoderSink ── FrameEncoder
//!                                           │
//!                                           ▼
//!                                    OutputArtifact (webm / mp4)
//! ```
//!
//! [`BurnSession`] wires the stages together, reports progress and handles
//! cancellation. Decoding and encoding are injected through
//! [`MediaBackend`]; [`FfmpegBackend`] is the production implementation.

pub mod compositor;
pub mod ffmpeg;
pub mod font;
pub mod layout;
pub mod playback;
pub mod session;
pub mod sink;
pub mod source;
pub mod surface;

pub use compositor::FrameCompositor;
pub use ffmpeg::FfmpegBackend;
pub use font::{BlockFace, FontLibrary, FontdueFace, GlyphFace, TextMeasure};
pub use layout::{wrap, wrap_paragraphs};
pub use playback::{PlaybackClock, PlaybackState};
pub use session::*;
pub use sink::{EncodeParams, EncodeSettings, OutputArtifact, OutputFormat, StreamEncoderSink};
pub use source::{FrameEncoder, FrameEvent, FrameSource, MediaBackend, SourceInfo};
pub use surface::Surface;
