//! Error types shared across Burnin crates.

use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a failure originated from.
///
/// Lets callers tell an input problem (decode) from an environment
/// problem (encode/finalize) without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Decode,
    Composite,
    Encode,
    Finalize,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Decode => "decode",
            FailureStage::Composite => "composite",
            FailureStage::Encode => "encode",
            FailureStage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for Burnin operations.
#[derive(Debug, thiserror::Error)]
pub enum BurnError {
    #[error("Source load error: {message}")]
    SourceLoad { message: String },

    #[error("Surface unavailable: {message}")]
    SurfaceUnavailable { message: String },

    #[error("Encoding error ({stage}): {message}")]
    Encoding {
        stage: FailureStage,
        message: String,
    },

    #[error("Session busy: a burn is already running on this session")]
    SessionBusy,

    #[error("Subtitle parse error at line {line}: {message}")]
    Subtitle { line: usize, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using BurnError.
pub type BurnResult<T> = Result<T, BurnError>;

impl BurnError {
    pub fn source_load(msg: impl Into<String>) -> Self {
        Self::SourceLoad {
            message: msg.into(),
        }
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable {
            message: msg.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            stage: FailureStage::Encode,
            message: msg.into(),
        }
    }

    pub fn finalize(msg: impl Into<String>) -> Self {
        Self::Encoding {
            stage: FailureStage::Finalize,
            message: msg.into(),
        }
    }

    pub fn subtitle(line: usize, msg: impl Into<String>) -> Self {
        Self::Subtitle {
            line,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// The pipeline stage this error belongs to, if it came from the pipeline.
    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            Self::SourceLoad { .. } => Some(FailureStage::Decode),
            Self::SurfaceUnavailable { .. } => Some(FailureStage::Composite),
            Self::Encoding { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the failure points at the caller's input rather than the environment.
    pub fn is_input_problem(&self) -> bool {
        matches!(
            self,
            Self::SourceLoad { .. }
                | Self::Subtitle { .. }
                | Self::Config { .. }
                | Self::FileNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            BurnError::source_load("bad header").stage(),
            Some(FailureStage::Decode)
        );
        assert_eq!(
            BurnError::surface("zero width").stage(),
            Some(FailureStage::Composite)
        );
        assert_eq!(
            BurnError::finalize("flush failed").stage(),
            Some(FailureStage::Finalize)
        );
        assert_eq!(BurnError::SessionBusy.stage(), None);
    }

    #[test]
    fn test_display_includes_stage() {
        let err = BurnError::encoding("broken pipe");
        assert_eq!(err.to_string(), "Encoding error (encode): broken pipe");
    }

    #[test]
    fn test_input_problem_classification() {
        assert!(BurnError::source_load("missing moov").is_input_problem());
        assert!(!BurnError::encoding("ffmpeg died").is_input_problem());
    }
}
