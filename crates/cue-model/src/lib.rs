//! Burnin Cue Model
//!
//! Defines the data contracts a burn consumes:
//! - **Cues:** Timed caption text and the ordered [`CueStore`] with
//!   first-match lookup by presentation time
//! - **Style:** [`SubtitleStyle`], the visual description of caption text
//! - **Interchange:** SRT parsing/generation and WebVTT export
//!
//! All times are seconds on the source video's presentation timeline.

pub mod cue;
pub mod srt;
pub mod style;

pub use cue::*;
pub use srt::*;
pub use style::*;
