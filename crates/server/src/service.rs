use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tonic::{Request, Response, Status};

use facedetect_core::pipeline::detect_faces_use_case::DetectFacesUseCase;
use facedetect_core::pipeline::infrastructure::threaded_worker_pool::ThreadedWorkerPool;

use crate::proto::face_detection_service_server::FaceDetectionService;
use crate::proto::{FaceDetectionResponse, ImageRequest};
use crate::response_encoder::encode_response;
use crate::status_mapping::{detect_faces_status, pool_status};

/// gRPC handler: hands each image to the worker pool and awaits the result
/// without blocking the async runtime.
pub struct FaceDetectionGrpc {
    use_case: DetectFacesUseCase,
    pool: Arc<ThreadedWorkerPool>,
    request_timeout: Duration,
}

impl FaceDetectionGrpc {
    pub fn new(
        use_case: DetectFacesUseCase,
        pool: Arc<ThreadedWorkerPool>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            use_case,
            pool,
            request_timeout,
        }
    }
}

#[tonic::async_trait]
impl FaceDetectionService for FaceDetectionGrpc {
    async fn detect_faces(
        &self,
        request: Request<ImageRequest>,
    ) -> Result<Response<FaceDetectionResponse>, Status> {
        let image = request.into_inner().image;
        log::info!("Received image for processing ({} bytes)", image.len());

        let deadline = Instant::now() + self.request_timeout;
        let (tx, rx) = oneshot::channel();
        let use_case = self.use_case.clone();
        self.pool
            .submit(move || {
                // receiver is gone if the caller hung up; nothing to report
                let _ = tx.send(use_case.execute(&image, Some(deadline)));
            })
            .map_err(|e| {
                log::error!("Rejected request: {e}");
                pool_status(&e)
            })?;

        let outcome = rx.await.map_err(|_| {
            log::error!("Detection job ended without a result");
            Status::internal("face detection aborted unexpectedly")
        })?;

        match outcome {
            Ok(faces) => {
                log::info!("{} face(s) detected", faces.len());
                Ok(Response::new(encode_response(&faces)))
            }
            Err(e) => {
                log::error!("Error processing image: {e}");
                Err(detect_faces_status(&e))
            }
        }
    }
}
