//! Startup, serving and graceful shutdown.
//!
//! Order: model load (fatal on failure, nothing bound yet) → bind → serve
//! until signalled → stop accepting and drain in-flight RPCs → join the
//! worker pool → drop the model.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use facedetect_core::decoding::infrastructure::codec_image_decoder::CodecImageDecoder;
use facedetect_core::detection::infrastructure::cascade_face_detector::CascadeFaceDetector;
use facedetect_core::pipeline::detect_faces_use_case::DetectFacesUseCase;
use facedetect_core::pipeline::infrastructure::threaded_worker_pool::ThreadedWorkerPool;

use crate::config::Config;
use crate::proto::face_detection_service_server::FaceDetectionServiceServer;
use crate::service::FaceDetectionGrpc;

type DetectionServer = FaceDetectionServiceServer<FaceDetectionGrpc>;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to start detection workers: {0}")]
    Workers(#[source] std::io::Error),
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("failed to stop detection workers: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runtime knobs for a serving instance.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
    pub max_message_bytes: usize,
}

impl From<&Config> for ServerOptions {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            request_timeout: config.request_timeout(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

/// Runs the service until Ctrl-C or SIGTERM.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let params = config.detection_params()?;

    log::info!("Loading model from {}", config.model_path.display());
    let detector = CascadeFaceDetector::from_model_file(&config.model_path, params)?;
    let decoder = CodecImageDecoder::with_max_pixels(config.max_image_pixels);
    let use_case = DetectFacesUseCase::new(Arc::new(decoder), Arc::new(detector));

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    log::info!(
        "Face detection service listening on {} ({} workers)",
        listener.local_addr()?,
        config.workers
    );

    serve(listener, use_case, ServerOptions::from(&config), shutdown_signal()).await?;
    log::info!("Server stopped");
    Ok(())
}

/// Serves on an already-bound listener until `shutdown` resolves, then
/// drains in-flight requests and joins the worker pool.
pub async fn serve<F>(
    listener: TcpListener,
    use_case: DetectFacesUseCase,
    options: ServerOptions,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send,
{
    let pool = Arc::new(
        ThreadedWorkerPool::new(options.workers, options.queue_capacity)
            .map_err(ServeError::Workers)?,
    );
    let service = FaceDetectionGrpc::new(use_case, pool.clone(), options.request_timeout);

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<DetectionServer>().await;

    let signal = async move {
        shutdown.await;
        log::info!("Shutdown requested, draining in-flight requests");
        health_reporter.set_not_serving::<DetectionServer>().await;
    };

    let served = Server::builder()
        .add_service(health_service)
        .add_service(
            FaceDetectionServiceServer::new(service)
                .max_decoding_message_size(options.max_message_bytes),
        )
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
        .await;

    // joining blocks, keep it off the async workers
    tokio::task::spawn_blocking(move || pool.shutdown()).await?;
    served?;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
