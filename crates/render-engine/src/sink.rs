//! Stream encoder sink: feeds composited frames to an encoder and assembles
//! the output artifact.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use burnin_common::config::EncodingDefaults;
use burnin_common::error::{BurnError, BurnResult};

use crate::source::FrameEncoder;
use crate::surface::Surface;

/// Output container/codec pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// WebM / VP9.
    #[default]
    Webm,
    /// Fragmented MP4 / H.264.
    Mp4,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webm => "webm",
            OutputFormat::Mp4 => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webm => "video/webm;codecs=vp9",
            OutputFormat::Mp4 => "video/mp4;codecs=avc1",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = BurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webm" | "vp9" => Ok(OutputFormat::Webm),
            "mp4" | "h264" => Ok(OutputFormat::Mp4),
            other => Err(BurnError::unsupported(format!(
                "Unknown output format '{other}' (expected webm or mp4)"
            ))),
        }
    }
}

/// Per-session encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Sampling and output frame rate.
    pub frame_rate: u32,
    pub format: OutputFormat,
    pub video_bitrate_kbps: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            format: OutputFormat::Webm,
            video_bitrate_kbps: 2500,
        }
    }
}

impl EncodeSettings {
    /// Build settings from the configured defaults.
    pub fn from_defaults(defaults: &EncodingDefaults) -> BurnResult<Self> {
        let settings = Self {
            frame_rate: defaults.frame_rate,
            format: defaults.format.parse()?,
            video_bitrate_kbps: defaults.video_bitrate_kbps,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> BurnResult<()> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(BurnError::config(format!(
                "frame rate must be within 1..=240 (got {})",
                self.frame_rate
            )));
        }
        if self.video_bitrate_kbps == 0 {
            return Err(BurnError::config("video bitrate must be > 0"));
        }
        Ok(())
    }
}

/// Everything an encoder needs to start a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub format: OutputFormat,
    pub video_bitrate_kbps: u32,
}

impl EncodeParams {
    pub fn new(width: u32, height: u32, settings: &EncodeSettings) -> Self {
        Self {
            width,
            height,
            frame_rate: settings.frame_rate,
            format: settings.format,
            video_bitrate_kbps: settings.video_bitrate_kbps,
        }
    }
}

/// The finished, encoded video.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    pub bytes: Vec<u8>,
    pub duration_secs: f64,
    pub frame_count: u64,
    pub format: OutputFormat,
}

impl OutputArtifact {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn write_to(&self, path: &Path) -> BurnResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = self.bytes.len(),
            duration_secs = self.duration_secs,
            "Wrote output artifact"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Open,
    Failed,
}

/// Buffers encoded output and produces the artifact at [`finalize`](Self::finalize).
///
/// The first encoder error moves the sink to a failed state: later pushes
/// are ignored and finalization reports that error.
pub struct StreamEncoderSink {
    encoder: Box<dyn FrameEncoder>,
    params: EncodeParams,
    state: SinkState,
    buffer: Vec<u8>,
    frames: u64,
    last_pts: Option<f64>,
    failure: Option<BurnError>,
}

impl StreamEncoderSink {
    pub fn new(encoder: Box<dyn FrameEncoder>, params: EncodeParams) -> Self {
        Self {
            encoder,
            params,
            state: SinkState::Open,
            buffer: Vec::new(),
            frames: 0,
            last_pts: None,
            failure: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == SinkState::Failed
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames
    }

    /// Encode one frame. Returns `false` if the frame was not accepted.
    pub async fn push(&mut self, surface: &Surface, pts: f64) -> bool {
        if self.state == SinkState::Failed {
            return false;
        }
        if surface.width() != self.params.width || surface.height() != self.params.height {
            self.fail(BurnError::encoding(format!(
                "frame is {}x{}, encoder expects {}x{}",
                surface.width(),
                surface.height(),
                self.params.width,
                self.params.height
            )))
            .await;
            return false;
        }

        match self.encoder.encode(surface, pts).await {
            Ok(chunk) => {
                self.buffer.extend_from_slice(&chunk);
                self.frames += 1;
                self.last_pts = Some(pts);
                true
            }
            Err(e) => {
                self.fail(e).await;
                false
            }
        }
    }

    /// Flush the encoder and assemble the artifact.
    ///
    /// Fails with `Encoding` if any push failed, if no frame was encoded, or
    /// if the flush itself fails.
    pub async fn finalize(mut self) -> BurnResult<OutputArtifact> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        let Some(last_pts) = self.last_pts else {
            self.encoder.abort().await;
            return Err(BurnError::finalize("no frames were encoded"));
        };

        let tail = match self.encoder.flush().await {
            Ok(tail) => tail,
            Err(e) => {
                self.encoder.abort().await;
                return Err(match e {
                    e @ BurnError::Encoding { .. } => e,
                    other => BurnError::finalize(other.to_string()),
                });
            }
        };
        self.buffer.extend_from_slice(&tail);

        let artifact = OutputArtifact {
            bytes: self.buffer,
            duration_secs: last_pts + 1.0 / self.params.frame_rate.max(1) as f64,
            frame_count: self.frames,
            format: self.params.format,
        };
        tracing::debug!(
            bytes = artifact.bytes.len(),
            frames = artifact.frame_count,
            duration_secs = artifact.duration_secs,
            "Encoder sink finalized"
        );
        Ok(artifact)
    }

    /// Drop buffered output and release the encoder.
    pub async fn discard(mut self) {
        self.buffer.clear();
        self.encoder.abort().await;
    }

    async fn fail(&mut self, error: BurnError) {
        tracing::error!(error = %error, frames = self.frames, "Encoder failed");
        let error = match error {
            e @ BurnError::Encoding { .. } => e,
            other => BurnError::encoding(other.to_string()),
        };
        self.state = SinkState::Failed;
        self.failure = Some(error);
        self.buffer.clear();
        self.encoder.abort().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnin_common::error::FailureStage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits one byte per frame; optionally fails on the n-th frame.
    struct ByteEncoder {
        fail_at: Option<u64>,
        encoded: u64,
        aborts: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl FrameEncoder for ByteEncoder {
        async fn encode(&mut self, _surface: &Surface, _pts: f64) -> BurnResult<Vec<u8>> {
            if Some(self.encoded) == self.fail_at {
                return Err(BurnError::encoding("encoder crashed"));
            }
            self.encoded += 1;
            Ok(vec![self.encoded as u8])
        }

        async fn flush(&mut self) -> BurnResult<Vec<u8>> {
            Ok(b"end".to_vec())
        }

        async fn abort(&mut self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sink(fail_at: Option<u64>) -> (StreamEncoderSink, Arc<AtomicUsize>) {
        let aborts = Arc::new(AtomicUsize::new(0));
        let encoder = ByteEncoder {
            fail_at,
            encoded: 0,
            aborts: aborts.clone(),
        };
        let params = EncodeParams::new(4, 4, &EncodeSettings::default());
        (StreamEncoderSink::new(Box::new(encoder), params), aborts)
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("WebM".parse::<OutputFormat>().unwrap(), OutputFormat::Webm);
        assert_eq!("mp4".parse::<OutputFormat>().unwrap(), OutputFormat::Mp4);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Webm.mime_type(), "video/webm;codecs=vp9");
    }

    #[test]
    fn test_settings_validation() {
        assert!(EncodeSettings::default().validate().is_ok());
        let zero = EncodeSettings {
            frame_rate: 0,
            ..EncodeSettings::default()
        };
        assert!(zero.validate().is_err());
        let from_config = EncodeSettings::from_defaults(&EncodingDefaults::default()).unwrap();
        assert_eq!(from_config, EncodeSettings::default());
    }

    #[tokio::test]
    async fn test_finalize_assembles_artifact() {
        let (mut sink, _) = sink(None);
        let surface = Surface::new(4, 4).unwrap();
        for i in 0..3 {
            assert!(sink.push(&surface, i as f64 / 30.0).await);
        }

        let artifact = sink.finalize().await.unwrap();
        assert_eq!(artifact.bytes, vec![1, 2, 3, b'e', b'n', b'd']);
        assert_eq!(artifact.frame_count, 3);
        assert!((artifact.duration_secs - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_sink_ignores_pushes_and_fails_finalize() {
        let (mut sink, aborts) = sink(Some(1));
        let surface = Surface::new(4, 4).unwrap();
        assert!(sink.push(&surface, 0.0).await);
        assert!(!sink.push(&surface, 1.0 / 30.0).await);
        assert!(sink.is_failed());
        assert!(!sink.push(&surface, 2.0 / 30.0).await);
        assert_eq!(aborts.load(Ordering::SeqCst), 1);

        let err = sink.finalize().await.unwrap_err();
        assert_eq!(err.stage(), Some(FailureStage::Encode));
    }

    #[tokio::test]
    async fn test_mismatched_frame_size_fails() {
        let (mut sink, _) = sink(None);
        let wrong = Surface::new(8, 8).unwrap();
        assert!(!sink.push(&wrong, 0.0).await);
        assert!(matches!(
            sink.finalize().await,
            Err(BurnError::Encoding { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_stream_cannot_finalize() {
        let (sink, aborts) = sink(None);
        let err = sink.finalize().await.unwrap_err();
        assert_eq!(err.stage(), Some(FailureStage::Finalize));
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discard_aborts_encoder() {
        let (mut sink, aborts) = sink(None);
        let surface = Surface::new(4, 4).unwrap();
        sink.push(&surface, 0.0).await;
        sink.discard().await;
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }
}
