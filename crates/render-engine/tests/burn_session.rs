use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use burnin_common::error::{BurnError, BurnResult, FailureStage};
use burnin_cue_model::cue::{Cue, CueStore};
use burnin_cue_model::style::{Rgba, SubtitleStyle};
use burnin_render_engine::{
    BurnOutcome, BurnProgress, BurnSession, BurnStage, EncodeParams, EncodeSettings, FontLibrary,
    FrameEncoder, FrameEvent, FrameSource, MediaBackend, SessionState, SourceInfo, Surface,
};

const BASE: Rgba = Rgba::opaque(40, 60, 90);
const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;

#[derive(Debug, Clone)]
struct RecordedFrame {
    pts: f64,
    pixels: Vec<u8>,
}

/// In-memory backend: a solid-colour source and an encoder that records
/// every frame it receives.
#[derive(Clone)]
struct SyntheticBackend {
    width: u32,
    height: u32,
    duration_secs: f64,
    repeat_frames: bool,
    fail_encoder_at: Option<usize>,
    gate: Option<Arc<Notify>>,
    flush_gate: Option<Arc<Notify>>,
    recorded: Arc<Mutex<Vec<RecordedFrame>>>,
    encoder_aborted: Arc<AtomicBool>,
    source_stopped: Arc<AtomicBool>,
}

impl SyntheticBackend {
    fn new(duration_secs: f64) -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            duration_secs,
            repeat_frames: false,
            fail_encoder_at: None,
            gate: None,
            flush_gate: None,
            recorded: Arc::new(Mutex::new(Vec::new())),
            encoder_aborted: Arc::new(AtomicBool::new(false)),
            source_stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn frames(&self) -> Vec<RecordedFrame> {
        self.recorded.lock().unwrap().clone()
    }

    fn frame_at(&self, pts: f64) -> RecordedFrame {
        self.frames()
            .into_iter()
            .find(|f| (f.pts - pts).abs() < 1e-9)
            .unwrap_or_else(|| panic!("no frame recorded at {pts}"))
    }
}

struct SyntheticSource {
    info: SourceInfo,
    total: u64,
    index: u64,
    frame_rate: u32,
    repeat: bool,
    repeated: bool,
    gate: Option<Arc<Notify>>,
    stopped: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl FrameSource for SyntheticSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    async fn next_frame(&mut self, surface: &mut Surface) -> BurnResult<FrameEvent> {
        if let Some(gate) = self.gate.take() {
            gate.notified().await;
        }
        if self.stopped.load(Ordering::SeqCst) || self.index >= self.total {
            return Ok(FrameEvent::End);
        }

        surface.fill(BASE);
        let pts = self.index as f64 / self.frame_rate as f64;
        if self.repeat && !self.repeated {
            self.repeated = true;
        } else {
            self.repeated = false;
            self.index += 1;
        }
        Ok(FrameEvent::Frame { pts })
    }

    async fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct RecordingEncoder {
    recorded: Arc<Mutex<Vec<RecordedFrame>>>,
    fail_at: Option<usize>,
    flush_gate: Option<Arc<Notify>>,
    aborted: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl FrameEncoder for RecordingEncoder {
    async fn encode(&mut self, surface: &Surface, pts: f64) -> BurnResult<Vec<u8>> {
        let mut recorded = self.recorded.lock().unwrap();
        if Some(recorded.len()) == self.fail_at {
            return Err(BurnError::encoding("synthetic encoder failure"));
        }
        recorded.push(RecordedFrame {
            pts,
            pixels: surface.as_bytes().to_vec(),
        });
        Ok(vec![0xAB; 4])
    }

    async fn flush(&mut self) -> BurnResult<Vec<u8>> {
        if let Some(gate) = self.flush_gate.take() {
            gate.notified().await;
        }
        Ok(b"END".to_vec())
    }

    async fn abort(&mut self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MediaBackend for SyntheticBackend {
    async fn open_source(&self, _path: &Path, frame_rate: u32) -> BurnResult<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticSource {
            info: SourceInfo {
                width: self.width,
                height: self.height,
                duration_secs: self.duration_secs,
            },
            total: (self.duration_secs * frame_rate as f64).round() as u64,
            index: 0,
            frame_rate,
            repeat: self.repeat_frames,
            repeated: false,
            gate: self.gate.clone(),
            stopped: self.source_stopped.clone(),
        }))
    }

    async fn open_encoder(&self, _params: &EncodeParams) -> BurnResult<Box<dyn FrameEncoder>> {
        Ok(Box::new(RecordingEncoder {
            recorded: self.recorded.clone(),
            fail_at: self.fail_encoder_at,
            flush_gate: self.flush_gate.clone(),
            aborted: self.encoder_aborted.clone(),
        }))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

fn scenario_cues() -> CueStore {
    CueStore::from_cues(vec![
        Cue::new("sub_1", 0.0, 1.0, "One by iterating over"),
        Cue::new("sub_9", 7.0, 8.0, "transformation"),
    ])
}

fn session(backend: &SyntheticBackend) -> Arc<BurnSession> {
    Arc::new(BurnSession::new(
        Arc::new(backend.clone()),
        Arc::new(FontLibrary::builtin()),
        EncodeSettings::default(),
    ))
}

fn recorder() -> (Arc<Mutex<Vec<BurnProgress>>>, Box<dyn Fn(BurnProgress) + Send>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, Box::new(move |p| sink.lock().unwrap().push(p)))
}

fn base_frame() -> Vec<u8> {
    let mut surface = Surface::new(WIDTH, HEIGHT).unwrap();
    surface.fill(BASE);
    surface.as_bytes().to_vec()
}

#[tokio::test]
async fn burns_cues_into_an_eight_second_source() {
    let backend = SyntheticBackend::new(8.2);
    let session = session(&backend);

    let outcome = session
        .start(
            Path::new("demo.mp4"),
            &scenario_cues(),
            &SubtitleStyle::default(),
            None,
        )
        .await
        .unwrap();

    let artifact = outcome.into_artifact().expect("burn should complete");
    assert!((artifact.duration_secs - 8.2).abs() <= 1.0 / 30.0 + 1e-9);
    assert_eq!(artifact.frame_count, 246);
    assert!(artifact.bytes.ends_with(b"END"));
    assert_eq!(session.state(), SessionState::Completed);

    let base = base_frame();
    let captioned = backend.frame_at(0.5);
    assert_ne!(captioned.pixels, base, "text should be drawn at t=0.5");
    assert!(captioned
        .pixels
        .chunks_exact(4)
        .any(|px| px == [255, 255, 255, 255]));

    assert_eq!(backend.frame_at(4.0).pixels, base, "no cue is active at t=4.0");
    assert_ne!(backend.frame_at(7.5).pixels, base);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one() {
    let backend = SyntheticBackend::new(2.0);
    let session = session(&backend);
    let (log, callback) = recorder();

    session
        .start(
            Path::new("demo.mp4"),
            &scenario_cues(),
            &SubtitleStyle::default(),
            Some(callback),
        )
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert!(log.len() > 60);
    assert_eq!(log[0].stage, BurnStage::Preparing);
    assert_eq!(log[0].fraction, 0.0);
    for pair in log.windows(2) {
        assert!(pair[1].fraction >= pair[0].fraction);
    }
    let last = log.last().unwrap();
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.stage, BurnStage::Complete);
    assert_eq!(last.frames_rendered, 60);
}

#[tokio::test]
async fn cancel_mid_burn_stops_progress_and_returns_no_artifact() {
    let backend = SyntheticBackend::new(8.2);
    let session = session(&backend);
    let log = Arc::new(Mutex::new(Vec::<BurnProgress>::new()));

    let callback: Box<dyn Fn(BurnProgress) + Send> = {
        let log = log.clone();
        let session = session.clone();
        Box::new(move |p| {
            let at = p.presentation_secs;
            log.lock().unwrap().push(p);
            if at >= 3.0 {
                session.cancel();
            }
        })
    };

    let outcome = session
        .start(
            Path::new("demo.mp4"),
            &scenario_cues(),
            &SubtitleStyle::default(),
            Some(callback),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, BurnOutcome::Cancelled));
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(backend.encoder_aborted.load(Ordering::SeqCst));
    assert!(backend.source_stopped.load(Ordering::SeqCst));

    let log = log.lock().unwrap();
    let last = log.last().unwrap();
    assert!((last.presentation_secs - 3.0).abs() < 1e-9);
    assert!(log.iter().all(|p| p.stage != BurnStage::Complete));
    assert!(!session.cancel(), "nothing left to cancel");
}

#[tokio::test]
async fn cancel_from_another_task_while_waiting_for_a_frame() {
    let mut backend = SyntheticBackend::new(8.2);
    backend.gate = Some(Arc::new(Notify::new()));
    let session = session(&backend);
    let (log, callback) = recorder();
    let cues = scenario_cues();
    let style = SubtitleStyle::default();

    let burn = session.start(Path::new("demo.mp4"), &cues, &style, Some(callback));
    let canceller = async {
        while session.state() != SessionState::Running {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        session.cancel()
    };

    let (outcome, requested) = tokio::join!(burn, canceller);
    assert!(requested);
    assert!(matches!(outcome.unwrap(), BurnOutcome::Cancelled));
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(backend.frames().is_empty());
    assert!(backend.source_stopped.load(Ordering::SeqCst));
    assert!(backend.encoder_aborted.load(Ordering::SeqCst));

    let log = log.lock().unwrap();
    assert!(log.iter().all(|p| p.stage == BurnStage::Preparing));
}

#[tokio::test]
async fn cancel_while_finalizing_returns_no_artifact() {
    let mut backend = SyntheticBackend::new(0.5);
    backend.flush_gate = Some(Arc::new(Notify::new()));
    let session = session(&backend);
    let (log, callback) = recorder();
    let cues = scenario_cues();
    let style = SubtitleStyle::default();

    let burn = session.start(Path::new("demo.mp4"), &cues, &style, Some(callback));
    let canceller = async {
        loop {
            let finalizing = log
                .lock()
                .unwrap()
                .iter()
                .any(|p| p.stage == BurnStage::Finalizing);
            if finalizing {
                break;
            }
            tokio::task::yield_now().await;
        }
        session.cancel()
    };

    let (outcome, requested) = tokio::join!(burn, canceller);
    assert!(requested);
    assert!(matches!(outcome.unwrap(), BurnOutcome::Cancelled));
    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(backend.frames().len(), 15);

    let log = log.lock().unwrap();
    assert_eq!(log.last().map(|p| p.stage), Some(BurnStage::Finalizing));
}

#[tokio::test]
async fn encoder_failure_fails_the_session() {
    let mut backend = SyntheticBackend::new(8.2);
    backend.fail_encoder_at = Some(100);
    let session = session(&backend);
    let (log, callback) = recorder();

    let err = session
        .start(
            Path::new("demo.mp4"),
            &scenario_cues(),
            &SubtitleStyle::default(),
            Some(callback),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BurnError::Encoding { .. }));
    assert_eq!(err.stage(), Some(FailureStage::Encode));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(backend.encoder_aborted.load(Ordering::SeqCst));
    assert!(log
        .lock()
        .unwrap()
        .iter()
        .all(|p| p.stage != BurnStage::Complete));
}

#[tokio::test]
async fn zero_sized_source_reports_surface_unavailable() {
    let mut backend = SyntheticBackend::new(1.0);
    backend.width = 0;
    let session = session(&backend);

    let err = session
        .start(
            Path::new("empty.mp4"),
            &scenario_cues(),
            &SubtitleStyle::default(),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BurnError::SurfaceUnavailable { .. }));
    assert!(backend.source_stopped.load(Ordering::SeqCst));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn repeated_presentation_times_are_encoded_once() {
    let mut backend = SyntheticBackend::new(1.0);
    backend.repeat_frames = true;
    let session = session(&backend);

    let outcome = session
        .start(
            Path::new("demo.mp4"),
            &CueStore::new(),
            &SubtitleStyle::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.artifact().map(|a| a.frame_count), Some(30));
    let pts: Vec<f64> = backend.frames().iter().map(|f| f.pts).collect();
    assert!(pts.windows(2).all(|w| w[1] > w[0]));
}

#[tokio::test]
async fn second_start_while_running_is_busy() {
    let mut backend = SyntheticBackend::new(0.5);
    let gate = Arc::new(Notify::new());
    backend.gate = Some(gate.clone());
    let session = session(&backend);
    let cues = scenario_cues();
    let style = SubtitleStyle::default();

    let first = session.start(Path::new("a.mp4"), &cues, &style, None);
    let second = async {
        while session.state() != SessionState::Running {
            tokio::task::yield_now().await;
        }
        let busy = session.start(Path::new("b.mp4"), &cues, &style, None).await;
        gate.notify_one();
        busy
    };

    let (first, second) = tokio::join!(first, second);
    assert!(matches!(second, Err(BurnError::SessionBusy)));
    assert!(first.unwrap().artifact().is_some());
    assert_eq!(session.state(), SessionState::Completed);
}

#[tokio::test]
async fn session_can_run_again_after_finishing() {
    let backend = SyntheticBackend::new(0.5);
    let session = session(&backend);
    let cues = scenario_cues();
    let style = SubtitleStyle::default();

    for _ in 0..2 {
        let outcome = session
            .start(Path::new("a.mp4"), &cues, &style, None)
            .await
            .unwrap();
        assert_eq!(outcome.artifact().map(|a| a.frame_count), Some(15));
    }
    assert_eq!(backend.frames().len(), 30);
}

#[tokio::test]
async fn independent_sessions_run_concurrently() {
    let left = SyntheticBackend::new(1.0);
    let right = SyntheticBackend::new(0.5);
    let (a, b) = (session(&left), session(&right));
    let cues = scenario_cues();
    let style = SubtitleStyle::default();

    let (ra, rb) = tokio::join!(
        a.start(Path::new("left.mp4"), &cues, &style, None),
        b.start(Path::new("right.mp4"), &cues, &style, None),
    );
    assert_eq!(ra.unwrap().artifact().map(|x| x.frame_count), Some(30));
    assert_eq!(rb.unwrap().artifact().map(|x| x.frame_count), Some(15));
}

#[tokio::test]
async fn invalid_style_is_rejected_before_decoding() {
    let backend = SyntheticBackend::new(1.0);
    let session = session(&backend);
    let style = SubtitleStyle {
        font_size: 0.0,
        ..SubtitleStyle::default()
    };

    let err = session
        .start(Path::new("demo.mp4"), &scenario_cues(), &style, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BurnError::Config { .. }));
    assert!(backend.frames().is_empty());
    assert_eq!(session.state(), SessionState::Failed);
}
