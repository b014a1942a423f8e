//! ffmpeg-based media backend.
//!
//! Decoding runs `ffmpeg` emitting raw RGBA frames on stdout at a fixed
//! frame rate; encoding runs a second `ffmpeg` reading raw RGBA frames on
//! stdin and writing a streamable container to stdout. Both processes are
//! killed if their handle is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use burnin_common::config::EncodingDefaults;
use burnin_common::error::{BurnError, BurnResult};

use crate::sink::{EncodeParams, OutputFormat};
use crate::source::{FrameEncoder, FrameEvent, FrameSource, MediaBackend, SourceInfo};
use crate::surface::{frame_len, Surface};

/// Size of chunks read from the encoder's stdout.
const READ_CHUNK: usize = 64 * 1024;

/// Media backend driving the `ffmpeg`/`ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::from_config(&EncodingDefaults::default())
    }

    pub fn from_config(config: &EncodingDefaults) -> Self {
        Self {
            ffmpeg: PathBuf::from(&config.ffmpeg),
            ffprobe: PathBuf::from(&config.ffprobe),
        }
    }

    /// Whether `ffprobe` can be run too (needed to open sources).
    pub fn probe_available(&self) -> bool {
        command_exists(&self.ffprobe)
    }

    /// Read the displayed width and height and the duration of the first
    /// video stream.
    ///
    /// The decoder applies rotation metadata, so quarter-turn rotated
    /// streams report their dimensions swapped.
    pub async fn probe(&self, path: &Path) -> BurnResult<SourceInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration:stream_tags=rotate:stream_side_data=rotation:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BurnError::source_load(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(BurnError::source_load(format!(
                "ffprobe failed for {} (status {}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&output.stdout)
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaBackend for FfmpegBackend {
    async fn open_source(&self, path: &Path, frame_rate: u32) -> BurnResult<Box<dyn FrameSource>> {
        if !path.exists() {
            return Err(BurnError::source_load(format!(
                "source video not found: {}",
                path.display()
            )));
        }
        let info = self.probe(path).await?;
        let source = FfmpegFrameSource::spawn(&self.ffmpeg, path, info, frame_rate)?;
        Ok(Box::new(source))
    }

    async fn open_encoder(&self, params: &EncodeParams) -> BurnResult<Box<dyn FrameEncoder>> {
        Ok(Box::new(FfmpegEncoder::spawn(&self.ffmpeg, params)?))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees; side data wins over the legacy tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .rotate
                    .as_deref()
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> BurnResult<SourceInfo> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| BurnError::source_load(format!("Unreadable ffprobe output: {e}")))?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| BurnError::source_load("source has no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(BurnError::source_load("video stream has no dimensions")),
    };
    let quarter_turns = (stream.rotation() / 90.0).round() as i64;
    let (width, height) = if quarter_turns.rem_euclid(2) == 1 {
        (height, width)
    } else {
        (width, height)
    };

    let parse_secs = |s: &Option<String>| s.as_deref().and_then(|d| d.trim().parse::<f64>().ok());
    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| parse_secs(&f.duration))
        .or_else(|| parse_secs(&stream.duration))
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    Ok(SourceInfo {
        width,
        height,
        duration_secs,
    })
}

/// Raw RGBA frames decoded by an `ffmpeg` child process.
struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    info: SourceInfo,
    frame_rate: u32,
    frame_len: usize,
    frame_index: u64,
}

impl FfmpegFrameSource {
    fn spawn(ffmpeg: &Path, path: &Path, info: SourceInfo, frame_rate: u32) -> BurnResult<Self> {
        let frame_len = frame_len(info.width, info.height).ok_or_else(|| {
            BurnError::surface(format!("frame {}x{} is too large", info.width, info.height))
        })?;

        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-an", "-sn", "-r"])
            .arg(frame_rate.to_string())
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(source = %path.display(), frame_rate, "Starting ffmpeg decoder");
        let mut child = cmd
            .spawn()
            .map_err(|e| BurnError::source_load(format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BurnError::source_load("Failed to capture ffmpeg stdout"))?;
        let stderr_task = child.stderr.take().map(drain_to_string);

        tracing::info!(
            pid = child.id(),
            width = info.width,
            height = info.height,
            duration_secs = info.duration_secs,
            "ffmpeg decoder started"
        );

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            stderr_task,
            info,
            frame_rate,
            frame_len,
            frame_index: 0,
        })
    }

    /// Wait for the decoder to exit; a non-zero status is a decode failure.
    async fn reap(&mut self) -> BurnResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .await
            .map_err(|e| BurnError::source_load(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr_task.take()).await;
        if !status.success() {
            return Err(BurnError::source_load(format!(
                "ffmpeg decode failed (status {status}): {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FrameSource for FfmpegFrameSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    async fn next_frame(&mut self, surface: &mut Surface) -> BurnResult<FrameEvent> {
        if surface.as_bytes().len() != self.frame_len {
            return Err(BurnError::source_load(format!(
                "surface is {}x{}, source frames are {}x{}",
                surface.width(),
                surface.height(),
                self.info.width,
                self.info.height
            )));
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(FrameEvent::End);
        };

        let filled = read_full(stdout, surface.as_bytes_mut())
            .await
            .map_err(|e| BurnError::source_load(format!("Failed reading decoded frame: {e}")))?;

        if filled == 0 {
            self.reap().await?;
            return Ok(FrameEvent::End);
        }
        if filled < self.frame_len {
            self.reap().await?;
            return Err(BurnError::source_load(format!(
                "truncated frame {} ({filled} of {} bytes)",
                self.frame_index, self.frame_len
            )));
        }

        let pts = self.frame_index as f64 / self.frame_rate.max(1) as f64;
        self.frame_index += 1;
        Ok(FrameEvent::Frame { pts })
    }

    async fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// An `ffmpeg` child encoding raw RGBA frames from stdin.
struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    stdout_task: Option<JoinHandle<std::io::Result<()>>>,
    stderr_task: Option<JoinHandle<String>>,
}

impl FfmpegEncoder {
    fn spawn(ffmpeg: &Path, params: &EncodeParams) -> BurnResult<Self> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", params.width, params.height),
            "-r".to_string(),
            params.frame_rate.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-an".to_string(),
            // 4:2:0 codecs need even dimensions
            "-vf".to_string(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        ];
        args.append(&mut codec_args_for_format(params));
        args.push("pipe:1".to_string());

        tracing::debug!(args = ?args, "Starting ffmpeg encoder");
        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BurnError::encoding(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BurnError::encoding("Failed to capture ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BurnError::encoding("Failed to capture ffmpeg stdout"))?;
        let stderr_task = child.stderr.take().map(drain_to_string);

        // Drain encoded output concurrently so ffmpeg never blocks on a full pipe.
        let (tx, chunks) = mpsc::unbounded_channel();
        let stdout_task: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    return Ok(());
                }
                if tx.send(buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }
        });

        tracing::info!(
            pid = child.id(),
            width = params.width,
            height = params.height,
            format = %params.format,
            "ffmpeg encoder started"
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            chunks,
            stdout_task: Some(stdout_task),
            stderr_task,
        })
    }

    fn drain_ready(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(chunk) = self.chunks.try_recv() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Kill the child and collect whatever it wrote to stderr.
    async fn kill_and_collect_stderr(&mut self) -> String {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        join_stderr(self.stderr_task.take()).await
    }
}

#[async_trait::async_trait]
impl FrameEncoder for FfmpegEncoder {
    async fn encode(&mut self, surface: &Surface, _pts: f64) -> BurnResult<Vec<u8>> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(BurnError::encoding("encoder input is closed"));
        };
        if let Err(e) = stdin.write_all(surface.as_bytes()).await {
            let stderr = self.kill_and_collect_stderr().await;
            return Err(BurnError::encoding(format!(
                "Failed writing frame to ffmpeg: {e}: {}",
                stderr.trim()
            )));
        }
        Ok(self.drain_ready())
    }

    async fn flush(&mut self) -> BurnResult<Vec<u8>> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| BurnError::finalize(format!("Failed closing ffmpeg input: {e}")))?;
        }
        let Some(mut child) = self.child.take() else {
            return Err(BurnError::finalize("encoder already closed"));
        };

        let status = child
            .wait()
            .await
            .map_err(|e| BurnError::finalize(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = join_stderr(self.stderr_task.take()).await;

        if let Some(task) = self.stdout_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(BurnError::finalize(format!(
                        "Failed reading ffmpeg output: {e}"
                    )))
                }
                Err(e) => {
                    return Err(BurnError::finalize(format!(
                        "ffmpeg output reader failed: {e}"
                    )))
                }
            }
        }

        if !status.success() {
            return Err(BurnError::finalize(format!(
                "ffmpeg encode failed (status {status}): {}",
                stderr.trim()
            )));
        }

        Ok(self.drain_ready())
    }

    async fn abort(&mut self) {
        let _ = self.kill_and_collect_stderr().await;
        if let Some(task) = self.stdout_task.take() {
            task.abort();
        }
        while self.chunks.try_recv().is_ok() {}
    }
}

fn codec_args_for_format(params: &EncodeParams) -> Vec<String> {
    let video_bitrate = format!("{}k", params.video_bitrate_kbps.max(100));

    match params.format {
        OutputFormat::Webm => vec![
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-deadline".to_string(),
            "realtime".to_string(),
            "-cpu-used".to_string(),
            "8".to_string(),
            "-row-mt".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "webm".to_string(),
        ],
        // Fragmented so the muxer never seeks back in the output pipe.
        OutputFormat::Mp4 => vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-profile:v".to_string(),
            "high".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-movflags".to_string(),
            "frag_keyframe+empty_moov+default_base_moof".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ],
    }
}

/// Fill `buf` from `reader`. Returns the number of bytes read, which is
/// less than `buf.len()` only at end of stream.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn drain_to_string<R: AsyncRead + Unpin + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut output = String::new();
        match reader.read_to_string(&mut output).await {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

async fn join_stderr(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(task) => task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
        None => String::new(),
    }
}

fn command_exists(binary: &Path) -> bool {
    std::process::Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
