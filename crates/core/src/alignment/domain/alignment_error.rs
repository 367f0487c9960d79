use thiserror::Error;

/// Why a single alignment attempt failed.
///
/// Every variant is local to one face in one frame; callers skip that face
/// and keep processing the stream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("point shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("insufficient points: {0}")]
    InsufficientPoints(String),
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
}
