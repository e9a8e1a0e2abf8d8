use std::time::Instant;

use thiserror::Error;

use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("image has no pixels")]
    EmptyImage,
    #[error("processing deadline exceeded")]
    DeadlineExceeded,
    #[error("{0}")]
    Internal(String),
}

/// Domain interface for face detection over a luminance frame.
///
/// Takes `&self`: a detector is built once at startup and shared by every
/// worker, so it must not carry per-call state. `deadline`, when set, bounds
/// how long a single call may scan.
pub trait FaceDetector: Send + Sync {
    fn detect(
        &self,
        frame: &Frame,
        deadline: Option<Instant>,
    ) -> Result<Vec<FaceBox>, DetectionError>;
}

/// Fails once `deadline` has passed. `None` never expires.
pub fn check_deadline(deadline: Option<Instant>) -> Result<(), DetectionError> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(DetectionError::DeadlineExceeded),
        _ => Ok(()),
    }
}
