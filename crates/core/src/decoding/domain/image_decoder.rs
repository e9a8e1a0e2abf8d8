use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("image of {width}x{height} exceeds the {max_pixels} pixel limit")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    #[error("unrecognized or corrupt image data: {0}")]
    Unrecognized(#[from] image::ImageError),
}

/// Domain interface for turning an encoded image payload into luminance.
///
/// Implementations hold no per-call state so one instance can serve
/// every worker concurrently.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError>;
}
