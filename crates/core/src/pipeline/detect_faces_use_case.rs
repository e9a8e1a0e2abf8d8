use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::decoding::domain::image_decoder::{DecodeError, ImageDecoder};
use crate::detection::domain::face_detector::{check_deadline, DetectionError, FaceDetector};
use crate::shared::face_box::FaceBox;

#[derive(Error, Debug)]
pub enum DetectFacesError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] DecodeError),
    #[error("face detection failed: {0}")]
    Detect(#[from] DetectionError),
}

impl DetectFacesError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::Detect(DetectionError::DeadlineExceeded))
    }
}

/// Single-image detection pipeline: decode → detect.
///
/// Cheap to clone; every clone shares the same decoder and detector.
#[derive(Clone)]
pub struct DetectFacesUseCase {
    decoder: Arc<dyn ImageDecoder>,
    detector: Arc<dyn FaceDetector>,
}

impl DetectFacesUseCase {
    pub fn new(decoder: Arc<dyn ImageDecoder>, detector: Arc<dyn FaceDetector>) -> Self {
        Self { decoder, detector }
    }

    /// Decodes `image` and returns its faces in scan order.
    ///
    /// A job picked up after `deadline` is dropped before decoding. The
    /// decoded frame lives only for the duration of this call.
    pub fn execute(
        &self,
        image: &[u8],
        deadline: Option<Instant>,
    ) -> Result<Vec<FaceBox>, DetectFacesError> {
        check_deadline(deadline)?;

        let frame = self.decoder.decode(image)?;
        log::debug!("Decoded {}x{} image", frame.width(), frame.height());

        Ok(self.detector.detect(&frame, deadline)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::face_box::CASCADE_CONFIDENCE;
    use crate::shared::frame::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // --- Stubs ---

    struct StubDecoder {
        frame: Option<Frame>,
    }

    impl ImageDecoder for StubDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
            if bytes.is_empty() {
                return Err(DecodeError::Empty);
            }
            self.frame.clone().ok_or(DecodeError::Empty)
        }
    }

    /// Returns one box per 10 pixels of frame width and counts calls.
    struct StubDetector {
        calls: AtomicUsize,
    }

    impl StubDetector {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FaceDetector for StubDetector {
        fn detect(
            &self,
            frame: &Frame,
            _deadline: Option<Instant>,
        ) -> Result<Vec<FaceBox>, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..frame.width() as i32 / 10)
                .map(|i| FaceBox::new(i * 10, 0, 10, 10, CASCADE_CONFIDENCE))
                .collect())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(
            &self,
            _frame: &Frame,
            _deadline: Option<Instant>,
        ) -> Result<Vec<FaceBox>, DetectionError> {
            Err(DetectionError::Internal("unsupported layout".into()))
        }
    }

    fn use_case(detector: Arc<dyn FaceDetector>) -> DetectFacesUseCase {
        let decoder = StubDecoder {
            frame: Some(Frame::new(vec![0; 30 * 5], 30, 5)),
        };
        DetectFacesUseCase::new(Arc::new(decoder), detector)
    }

    #[test]
    fn test_returns_detector_output_in_order() {
        let faces = use_case(Arc::new(StubDetector::new()))
            .execute(b"img", None)
            .unwrap();
        let xs: Vec<i32> = faces.iter().map(|f| f.x).collect();
        assert_eq!(xs, vec![0, 10, 20]);
    }

    #[test]
    fn test_decode_failure_skips_detection() {
        let detector = Arc::new(StubDetector::new());
        let err = use_case(detector.clone()).execute(b"", None).unwrap_err();
        assert!(matches!(err, DetectFacesError::Decode(DecodeError::Empty)));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detection_failure_is_wrapped() {
        let err = use_case(Arc::new(FailingDetector))
            .execute(b"img", None)
            .unwrap_err();
        assert!(matches!(err, DetectFacesError::Detect(DetectionError::Internal(_))));
        assert_eq!(err.to_string(), "face detection failed: unsupported layout");
        assert!(!err.is_deadline_exceeded());
    }

    #[test]
    fn test_expired_deadline_skips_all_work() {
        let detector = Arc::new(StubDetector::new());
        let past = Instant::now() - Duration::from_millis(1);
        let err = use_case(detector.clone())
            .execute(b"img", Some(past))
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_decode_error_message() {
        let err = use_case(Arc::new(StubDetector::new()))
            .execute(b"", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to decode image: image payload is empty");
    }
}
