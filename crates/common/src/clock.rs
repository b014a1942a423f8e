//! Clock and timing utilities for frame synchronization.
//!
//! A burn pass has two notions of time: the wall clock the pass runs on
//! (used for throughput logging) and the presentation time of each decoded
//! frame (used for cue lookup and progress). This module provides:
//! - A session clock anchored at pass start
//! - Presentation-time de-duplication
//! - Seconds/milliseconds conversion helpers

use std::time::Instant;

/// A wall clock anchored to the moment a burn pass started.
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the pass started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since the pass started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at pass start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Media seconds processed per wall-clock second.
    pub fn realtime_factor(&self, media_secs: f64) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= 0.0 {
            return 0.0;
        }
        media_secs / elapsed
    }
}

/// Convert seconds to whole milliseconds (rounded, negative clamps to 0).
pub fn secs_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0).round() as u64
}

/// Convert milliseconds to seconds.
pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Presentation-time gate.
///
/// Admits a timestamp only if it is strictly later than the last admitted
/// one, so a source that re-presents the same frame is not processed twice
/// and admitted times are monotonically increasing.
#[derive(Debug, Default)]
pub struct FrameGate {
    last_pts: Option<f64>,
    admitted: u64,
    skipped: u64,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `pts` if it advances past the last admitted time.
    pub fn admit(&mut self, pts: f64) -> bool {
        if !pts.is_finite() {
            self.skipped += 1;
            return false;
        }
        match self.last_pts {
            Some(last) if pts <= last => {
                self.skipped += 1;
                false
            }
            _ => {
                self.last_pts = Some(pts);
                self.admitted += 1;
                true
            }
        }
    }

    /// Last admitted presentation time.
    pub fn last_pts(&self) -> Option<f64> {
        self.last_pts
    }

    /// Number of admitted timestamps.
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Number of rejected (duplicate or out-of-order) timestamps.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_ms_conversion() {
        assert_eq!(secs_to_ms(1.5), 1500);
        assert_eq!(secs_to_ms(-2.0), 0);
        assert_eq!(secs_to_ms(f64::NAN), 0);
        assert!((ms_to_secs(8200) - 8.2).abs() < 1e-9);
    }

    #[test]
    fn test_frame_gate_dedups() {
        let mut gate = FrameGate::new();
        assert!(gate.admit(0.0)); // first time always admitted
        assert!(!gate.admit(0.0)); // same frame re-presented
        assert!(gate.admit(1.0 / 30.0));
        assert!(!gate.admit(0.01)); // out of order
        assert_eq!(gate.admitted(), 2);
        assert_eq!(gate.skipped(), 2);
        assert_eq!(gate.last_pts(), Some(1.0 / 30.0));
    }

    #[test]
    fn test_frame_gate_rejects_non_finite() {
        let mut gate = FrameGate::new();
        assert!(!gate.admit(f64::NAN));
        assert!(gate.last_pts().is_none());
    }
}
