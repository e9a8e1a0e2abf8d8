//! The one place where pipeline failures become gRPC statuses.

use tonic::Status;

use facedetect_core::pipeline::detect_faces_use_case::DetectFacesError;
use facedetect_core::pipeline::infrastructure::threaded_worker_pool::PoolError;

pub fn detect_faces_status(err: &DetectFacesError) -> Status {
    if err.is_deadline_exceeded() {
        Status::deadline_exceeded(err.to_string())
    } else {
        Status::internal(err.to_string())
    }
}

pub fn pool_status(err: &PoolError) -> Status {
    match err {
        PoolError::Saturated => Status::resource_exhausted(err.to_string()),
        PoolError::ShutDown => Status::unavailable(err.to_string()),
    }
}
