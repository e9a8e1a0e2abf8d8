pub const DEFAULT_MODEL_PATH: &str = "model/haarcascade_default.xml";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 50051;

/// Concurrent detections.
pub const DEFAULT_WORKER_THREADS: usize = 10;

/// Requests allowed to wait for a free worker before callers are turned away.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Per-request processing budget, same as the gateway's call deadline.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Largest decoded image accepted, in pixels (width * height). Detection
/// holds roughly 16 bytes per pixel while it runs.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 4096 * 4096;
