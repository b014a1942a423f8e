//! Media backend seams: decoded frame sources and frame encoders.

use std::path::Path;

use burnin_common::error::BurnResult;

use crate::sink::{EncodeParams, OutputFormat};
use crate::surface::Surface;

/// What a source produced on a `next_frame` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameEvent {
    /// A frame was written into the surface; `pts` is its presentation time
    /// in seconds.
    Frame { pts: f64 },
    /// End of media.
    End,
}

/// Basic properties of an opened source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Total duration in seconds (0 when unknown).
    pub duration_secs: f64,
}

/// A decoded video source presented frame by frame.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    /// Wait for the next presented frame and write its pixels into `surface`.
    ///
    /// Decode failures are reported as `SourceLoad`.
    async fn next_frame(&mut self, surface: &mut Surface) -> BurnResult<FrameEvent>;

    /// Stop decoding and release the decoder. Idempotent.
    async fn stop(&mut self);
}

/// An incremental video encoder.
#[async_trait::async_trait]
pub trait FrameEncoder: Send {
    /// Encode one frame. Returns any encoded bytes that became available.
    async fn encode(&mut self, surface: &Surface, pts: f64) -> BurnResult<Vec<u8>>;

    /// Finish the stream and return the remaining encoded bytes.
    async fn flush(&mut self) -> BurnResult<Vec<u8>>;

    /// Drop all pending output and release the encoder. Idempotent.
    async fn abort(&mut self);
}

/// Provides sources and encoders to a burn session.
#[async_trait::async_trait]
pub trait MediaBackend: Send + Sync {
    /// Open `path` for decoding, sampled at `frame_rate` frames per second.
    async fn open_source(&self, path: &Path, frame_rate: u32) -> BurnResult<Box<dyn FrameSource>>;

    /// Start an encoder for frames of the given geometry.
    async fn open_encoder(&self, params: &EncodeParams) -> BurnResult<Box<dyn FrameEncoder>>;

    /// Output formats this backend can produce.
    fn supported_formats(&self) -> &[OutputFormat] {
        &[OutputFormat::Webm, OutputFormat::Mp4]
    }

    /// Check if this backend is usable on the current system.
    fn is_available(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
