use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use facedetect_core::detection::domain::detection_params::{
    DetectionParams, InvalidParams, DEFAULT_MIN_NEIGHBORS, DEFAULT_MIN_SIZE, DEFAULT_SCALE_FACTOR,
};
use facedetect_core::shared::constants::{
    DEFAULT_HOST, DEFAULT_MAX_IMAGE_PIXELS, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_MODEL_PATH, DEFAULT_PORT,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_WORKER_THREADS,
};

/// gRPC face detection service.
///
/// Every option can also be set through the environment variable shown in
/// its help text; a `.env` file in the working directory is read first.
#[derive(Parser, Debug, Clone)]
#[command(name = "facedetect-server", version)]
pub struct Config {
    /// Interface to listen on.
    #[arg(long, env = "GRPC_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "GRPC_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Haar cascade model (OpenCV cascade XML).
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Detection worker threads.
    #[arg(long, env = "WORKER_THREADS", default_value_t = DEFAULT_WORKER_THREADS)]
    pub workers: usize,

    /// Requests allowed to wait for a free worker.
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Processing-time budget per request, in milliseconds.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    /// Largest accepted request message, in bytes.
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Largest decoded image, in pixels (width * height).
    #[arg(long, env = "MAX_IMAGE_PIXELS", default_value_t = DEFAULT_MAX_IMAGE_PIXELS)]
    pub max_image_pixels: u64,

    /// Pyramid downscale ratio between levels (> 1.0).
    #[arg(long, env = "SCALE_FACTOR", default_value_t = DEFAULT_SCALE_FACTOR)]
    pub scale_factor: f64,

    /// Overlapping raw hits needed to confirm a face (0 disables grouping).
    #[arg(long, env = "MIN_NEIGHBORS", default_value_t = DEFAULT_MIN_NEIGHBORS)]
    pub min_neighbors: u32,

    /// Smallest detectable face, in pixels (square).
    #[arg(long, env = "MIN_FACE_SIZE", default_value_t = DEFAULT_MIN_SIZE)]
    pub min_face_size: u32,
}

impl Config {
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.workers == 0 {
            return Err("Worker threads must be at least 1".into());
        }
        if self.queue_capacity == 0 {
            return Err("Queue capacity must be at least 1".into());
        }
        if self.request_timeout_ms == 0 {
            return Err("Request timeout must be greater than 0 ms".into());
        }
        if self.max_message_bytes == 0 {
            return Err("Max message size must be greater than 0 bytes".into());
        }
        if self.max_image_pixels == 0 {
            return Err("Max image size must be greater than 0 pixels".into());
        }
        self.detection_params()?;
        Ok(())
    }

    pub fn detection_params(&self) -> Result<DetectionParams, InvalidParams> {
        DetectionParams::new(
            self.scale_factor,
            self.min_neighbors,
            (self.min_face_size, self.min_face_size),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("facedetect-server").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--host",
            "127.0.0.1",
            "--port",
            "6000",
            "--model-path",
            "/models/face.xml",
            "--workers",
            "3",
            "--request-timeout-ms",
            "250",
            "--scale-factor",
            "1.1",
            "--min-neighbors",
            "3",
            "--min-face-size",
            "30",
            "--max-image-pixels",
            "1000000",
        ]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6000);
        assert_eq!(config.model_path, PathBuf::from("/models/face.xml"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.max_image_pixels, 1_000_000);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_relative_eq!(config.scale_factor, 1.1);
        let params = config.detection_params().unwrap();
        assert_eq!(params.min_neighbors(), 3);
        assert_eq!(params.min_size(), (30, 30));
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case::no_workers(&["--workers", "0"], "Worker threads")]
    #[case::no_queue(&["--queue-capacity", "0"], "Queue capacity")]
    #[case::no_timeout(&["--request-timeout-ms", "0"], "Request timeout")]
    #[case::no_message(&["--max-message-bytes", "0"], "Max message size")]
    #[case::no_pixels(&["--max-image-pixels", "0"], "Max image size")]
    #[case::flat_pyramid(&["--scale-factor", "1.0"], "scale factor")]
    #[case::zero_face(&["--min-face-size", "0"], "minimum size")]
    fn test_validate_rejects(#[case] args: &[&str], #[case] expected: &str) {
        let err = parse(args).validate().unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "{err} does not mention {expected}"
        );
    }

    #[test]
    fn test_image_limit_defaults_to_sixteen_megapixels() {
        assert_eq!(parse(&[]).max_image_pixels, 16_777_216);
    }

    #[test]
    fn test_non_numeric_port_is_a_parse_error() {
        let result = Config::try_parse_from(["facedetect-server", "--port", "http"]);
        assert!(result.is_err());
    }
}
