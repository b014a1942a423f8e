//! Timed text cues and the cue store.

use serde::{Deserialize, Serialize};

/// A timed piece of caption text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Opaque identifier supplied by the producer.
    pub id: String,

    /// Start time in seconds.
    pub start: f64,

    /// End time in seconds (inclusive).
    pub end: f64,

    /// Cue text (may contain line breaks).
    pub text: String,

    /// Producer confidence score [0.0, 1.0], carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Cue {
    /// Create a new cue.
    pub fn new(id: impl Into<String>, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            text: text.into(),
            confidence: None,
        }
    }

    /// Attach a confidence score.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// A cue is selectable only with finite bounds, `start >= 0` and `start < end`.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start < self.end
    }

    /// Whether the cue covers presentation time `t` (bounds inclusive).
    pub fn is_active_at(&self, t: f64) -> bool {
        self.is_valid() && self.start <= t && t <= self.end
    }
}

/// Ordered collection of cues.
///
/// Cues may overlap and need not be sorted; lookup resolves overlaps by
/// store order (first match wins).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueStore {
    cues: Vec<Cue>,
}

impl CueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cues(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn push(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn as_slice(&self) -> &[Cue] {
        &self.cues
    }

    /// The active cue at time `t`: first cue in store order with `start <= t <= end`.
    pub fn lookup(&self, t: f64) -> Option<&Cue> {
        if !t.is_finite() || t < 0.0 {
            return None;
        }
        self.cues.iter().find(|cue| cue.is_active_at(t))
    }

    /// Latest end time over all valid cues.
    pub fn duration_hint(&self) -> Option<f64> {
        self.cues
            .iter()
            .filter(|cue| cue.is_valid())
            .map(|cue| cue.end)
            .max_by(f64::total_cmp)
    }

    /// Ids of cues that can never become active.
    pub fn invalid_cues(&self) -> Vec<&str> {
        self.cues
            .iter()
            .filter(|cue| !cue.is_valid())
            .map(|cue| cue.id.as_str())
            .collect()
    }
}

impl From<Vec<Cue>> for CueStore {
    fn from(cues: Vec<Cue>) -> Self {
        Self::from_cues(cues)
    }
}

impl<'a> IntoIterator for &'a CueStore {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}
