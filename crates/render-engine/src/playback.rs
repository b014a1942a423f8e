//! Playback clock: paces a frame source and de-duplicates presentation times.

use burnin_common::clock::FrameGate;
use burnin_common::error::{BurnError, BurnResult};

use crate::source::{FrameEvent, FrameSource};
use crate::surface::Surface;

/// Playback state machine: `Stopped → Playing → {Ended | Errored}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Ended,
    Errored,
}

/// A distinct frame ready for compositing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickedFrame {
    pub pts: f64,
    /// Progress in [0, 1], never decreasing.
    pub fraction: f64,
}

/// What the clock yields on each advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockEvent {
    Frame(TickedFrame),
    End,
}

/// Drives a [`FrameSource`] from the start to end of media.
///
/// Frames whose presentation time does not advance past the last one are
/// dropped before they reach the compositor.
pub struct PlaybackClock {
    source: Box<dyn FrameSource>,
    state: PlaybackState,
    duration_secs: f64,
    gate: FrameGate,
    progress: f64,
    finished: bool,
}

impl PlaybackClock {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        let duration_secs = source.info().duration_secs;
        Self {
            source,
            state: PlaybackState::Stopped,
            duration_secs,
            gate: FrameGate::new(),
            progress: 0.0,
            finished: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Latest reported progress fraction.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Distinct frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.gate.admitted()
    }

    /// Duplicate frames dropped so far.
    pub fn frames_skipped(&self) -> u64 {
        self.gate.skipped()
    }

    /// `Stopped → Playing`.
    pub fn play(&mut self) -> BurnResult<()> {
        match self.state {
            PlaybackState::Stopped => {
                self.state = PlaybackState::Playing;
                Ok(())
            }
            PlaybackState::Playing => Ok(()),
            other => Err(BurnError::unsupported(format!(
                "cannot restart playback from {other:?}"
            ))),
        }
    }

    /// Record a presented time. Returns the progress fraction for a new frame,
    /// or `None` when `pts` does not advance past the last presented frame.
    pub fn tick(&mut self, pts: f64) -> Option<f64> {
        if self.state != PlaybackState::Playing || !self.gate.admit(pts) {
            return None;
        }
        let fraction = if self.duration_secs > 0.0 {
            (pts / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.progress = self.progress.max(fraction);
        Some(self.progress)
    }

    /// Wait for the next distinct frame, decoding into `surface`.
    pub async fn advance(&mut self, surface: &mut Surface) -> BurnResult<ClockEvent> {
        if self.state != PlaybackState::Playing {
            return Ok(ClockEvent::End);
        }
        loop {
            match self.source.next_frame(surface).await {
                Ok(FrameEvent::Frame { pts }) => {
                    if let Some(fraction) = self.tick(pts) {
                        return Ok(ClockEvent::Frame(TickedFrame { pts, fraction }));
                    }
                    tracing::trace!(pts, "Dropped duplicate frame");
                }
                Ok(FrameEvent::End) => return Ok(ClockEvent::End),
                Err(e) => {
                    self.state = PlaybackState::Errored;
                    return Err(e);
                }
            }
        }
    }

    /// `Playing → Ended`. Returns `true` exactly once, on the transition that
    /// must trigger sink finalization.
    pub fn finish(&mut self) -> bool {
        if self.finished || self.state != PlaybackState::Playing {
            return false;
        }
        self.finished = true;
        self.state = PlaybackState::Ended;
        self.progress = 1.0;
        true
    }

    /// Stop the source without reaching end of media.
    pub async fn stop(&mut self) {
        self.source.stop().await;
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Move to `Errored` after a downstream failure and release the source.
    pub async fn fail(&mut self) {
        self.source.stop().await;
        self.state = PlaybackState::Errored;
    }
}
