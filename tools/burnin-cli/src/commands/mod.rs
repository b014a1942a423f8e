pub mod burn;
pub mod check;
pub mod cues;
