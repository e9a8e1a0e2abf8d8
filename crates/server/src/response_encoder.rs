use facedetect_core::shared::face_box::FaceBox;

use crate::proto::{Face, FaceDetectionResponse};

impl From<&FaceBox> for Face {
    fn from(face: &FaceBox) -> Self {
        Self {
            x: face.x,
            y: face.y,
            width: face.width,
            height: face.height,
            confidence: face.confidence,
        }
    }
}

/// Wraps detections in the wire response, keeping detector order.
pub fn encode_response(faces: &[FaceBox]) -> FaceDetectionResponse {
    FaceDetectionResponse {
        faces: faces.iter().map(Face::from).collect(),
    }
}
