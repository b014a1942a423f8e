//! Burn session: orchestrates decode → composite → encode for one pass.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use burnin_common::clock::SessionClock;
use burnin_common::error::{BurnError, BurnResult};
use burnin_cue_model::cue::CueStore;
use burnin_cue_model::style::SubtitleStyle;

use crate::compositor::FrameCompositor;
use crate::font::FontLibrary;
use crate::playback::{ClockEvent, PlaybackClock};
use crate::sink::{EncodeParams, EncodeSettings, OutputArtifact, StreamEncoderSink};
use crate::source::MediaBackend;
use crate::surface::Surface;

/// Progress callback for burn passes.
pub type ProgressCallback = Box<dyn Fn(BurnProgress) + Send>;

/// Burn progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnProgress {
    /// Current progress [0.0, 1.0], never decreasing within a pass.
    pub fraction: f64,

    /// Frames encoded so far.
    pub frames_rendered: u64,

    /// Presentation time of the latest frame in seconds.
    pub presentation_secs: f64,

    /// Current stage.
    pub stage: BurnStage,
}

/// Stages of a burn pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
}

/// Burn session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no pass started yet.
    Idle,
    /// A pass is in progress.
    Running,
    /// The last pass produced an artifact.
    Completed,
    /// The last pass failed.
    Failed,
    /// The last pass was cancelled.
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// How a pass ended, when it did not fail.
#[derive(Debug)]
pub enum BurnOutcome {
    Completed(OutputArtifact),
    Cancelled,
}

impl BurnOutcome {
    pub fn artifact(&self) -> Option<&OutputArtifact> {
        match self {
            BurnOutcome::Completed(artifact) => Some(artifact),
            BurnOutcome::Cancelled => None,
        }
    }

    pub fn into_artifact(self) -> Option<OutputArtifact> {
        match self {
            BurnOutcome::Completed(artifact) => Some(artifact),
            BurnOutcome::Cancelled => None,
        }
    }
}

/// Burns cues into a video, one pass at a time.
///
/// The media backend and font library are injected; a session owns no
/// global state, so independent sessions can run concurrently. Share a
/// session through an `Arc` to [`cancel`](Self::cancel) it from another
/// task or from the progress callback.
pub struct BurnSession {
    backend: Arc<dyn MediaBackend>,
    fonts: Arc<FontLibrary>,
    settings: EncodeSettings,
    state: Mutex<SessionState>,
    cancel_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl BurnSession {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        fonts: Arc<FontLibrary>,
        settings: EncodeSettings,
    ) -> Self {
        Self {
            backend,
            fonts,
            settings,
            state: Mutex::new(SessionState::Idle),
            cancel_tx: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Request cancellation of the running pass.
    ///
    /// Returns `false` if no pass is running. Once acknowledged, the pass
    /// reports no further progress and resolves as [`BurnOutcome::Cancelled`].
    pub fn cancel(&self) -> bool {
        match lock(&self.cancel_tx).as_ref() {
            Some(tx) => {
                tx.send_replace(true);
                tracing::info!("Burn cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Run one burn pass over `source_path`.
    ///
    /// `cues` and `style` are snapshotted at start. Fails with
    /// `SessionBusy` if a pass is already running on this session.
    pub async fn start(
        &self,
        source_path: &Path,
        cues: &CueStore,
        style: &SubtitleStyle,
        progress: Option<ProgressCallback>,
    ) -> BurnResult<BurnOutcome> {
        let (run, cancel_rx) = self.begin()?;
        let cues = cues.clone();
        let style = style.clone();

        let clock = SessionClock::start();
        tracing::info!(
            source = %source_path.display(),
            cues = cues.len(),
            backend = self.backend.name(),
            format = %self.settings.format,
            frame_rate = self.settings.frame_rate,
            started_at = clock.epoch_wall(),
            "Burn started"
        );

        let result = self
            .run(source_path, &cues, style, progress, cancel_rx)
            .await;

        match &result {
            Ok(BurnOutcome::Completed(artifact)) => {
                tracing::info!(
                    frames = artifact.frame_count,
                    duration_secs = artifact.duration_secs,
                    bytes = artifact.bytes.len(),
                    elapsed_secs = clock.elapsed_secs(),
                    realtime_factor = clock.realtime_factor(artifact.duration_secs),
                    "Burn completed"
                );
                run.settle(SessionState::Completed);
            }
            Ok(BurnOutcome::Cancelled) => {
                tracing::info!(elapsed_secs = clock.elapsed_secs(), "Burn cancelled");
                run.settle(SessionState::Cancelled);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    stage = e.stage().map(|s| s.as_str()).unwrap_or("setup"),
                    "Burn failed"
                );
                run.settle(SessionState::Failed);
            }
        }
        result
    }

    /// Move `Idle`/terminal → `Running` and arm a fresh cancellation channel.
    fn begin(&self) -> BurnResult<(ActiveRun<'_>, watch::Receiver<bool>)> {
        let mut state = lock(&self.state);
        if *state == SessionState::Running {
            return Err(BurnError::SessionBusy);
        }
        *state = SessionState::Running;

        let (tx, rx) = watch::channel(false);
        *lock(&self.cancel_tx) = Some(tx);
        Ok((
            ActiveRun {
                session: self,
                settled: false,
            },
            rx,
        ))
    }

    async fn run(
        &self,
        source_path: &Path,
        cues: &CueStore,
        style: SubtitleStyle,
        progress: Option<ProgressCallback>,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> BurnResult<BurnOutcome> {
        style.validate()?;
        self.settings.validate()?;
        if !cues.invalid_cues().is_empty() {
            tracing::warn!(
                ids = ?cues.invalid_cues(),
                "Cues with empty or reversed ranges are never shown"
            );
        }

        report(
            &progress,
            BurnProgress {
                fraction: 0.0,
                frames_rendered: 0,
                presentation_secs: 0.0,
                stage: BurnStage::Preparing,
            },
        );

        let mut source = self
            .backend
            .open_source(source_path, self.settings.frame_rate)
            .await?;
        let info = source.info();
        let mut surface = match Surface::new(info.width, info.height) {
            Ok(surface) => surface,
            Err(e) => {
                source.stop().await;
                return Err(e);
            }
        };

        let mut clock = PlaybackClock::new(source);
        let params = EncodeParams::new(info.width, info.height, &self.settings);
        let encoder = match self.backend.open_encoder(&params).await {
            Ok(encoder) => encoder,
            Err(e) => {
                clock.stop().await;
                return Err(e);
            }
        };
        let mut sink = StreamEncoderSink::new(encoder, params);
        let mut compositor = FrameCompositor::with_library(style, &self.fonts);

        clock.play()?;
        let mut last_pts = 0.0;
        loop {
            let event = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => None,
                event = clock.advance(&mut surface) => Some(event),
            };

            let frame = match event {
                None => {
                    clock.stop().await;
                    sink.discard().await;
                    return Ok(BurnOutcome::Cancelled);
                }
                Some(Err(e)) => {
                    clock.fail().await;
                    sink.discard().await;
                    return Err(e);
                }
                Some(Ok(ClockEvent::End)) => break,
                Some(Ok(ClockEvent::Frame(frame))) => frame,
            };

            compositor.composite(&mut surface, cues.lookup(frame.pts));
            if !sink.push(&surface, frame.pts).await {
                clock.fail().await;
                return match sink.finalize().await {
                    Err(e) => Err(e),
                    Ok(_) => Err(BurnError::encoding("encoder rejected a frame")),
                };
            }
            last_pts = frame.pts;

            // Cancellation requested from the callback or another task
            // silences progress before the loop observes it.
            if *cancel_rx.borrow() {
                continue;
            }
            report(
                &progress,
                BurnProgress {
                    fraction: frame.fraction,
                    frames_rendered: sink.frames_encoded(),
                    presentation_secs: frame.pts,
                    stage: BurnStage::Rendering,
                },
            );
        }

        if !clock.finish() {
            sink.discard().await;
            return Err(BurnError::finalize("playback ended more than once"));
        }
        let frames = sink.frames_encoded();
        if !*cancel_rx.borrow() {
            report(
                &progress,
                BurnProgress {
                    fraction: clock.progress(),
                    frames_rendered: frames,
                    presentation_secs: last_pts,
                    stage: BurnStage::Finalizing,
                },
            );
        }

        let finalized = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => None,
            result = sink.finalize() => Some(result),
        };
        let artifact = match finalized {
            None => return Ok(BurnOutcome::Cancelled),
            Some(result) => result?,
        };

        report(
            &progress,
            BurnProgress {
                fraction: 1.0,
                frames_rendered: artifact.frame_count,
                presentation_secs: last_pts,
                stage: BurnStage::Complete,
            },
        );
        Ok(BurnOutcome::Completed(artifact))
    }
}

/// Marks a pass as running; settles the session state when dropped.
///
/// A pass whose future is dropped before it settles counts as cancelled.
struct ActiveRun<'a> {
    session: &'a BurnSession,
    settled: bool,
}

impl ActiveRun<'_> {
    fn settle(mut self, state: SessionState) {
        *lock(&self.session.state) = state;
        self.settled = true;
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *lock(&self.session.state) = SessionState::Cancelled;
        }
        *lock(&self.session.cancel_tx) = None;
    }
}

fn report(progress: &Option<ProgressCallback>, update: BurnProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}

/// Resolves once cancellation is requested; never resolves if the sender
/// is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
