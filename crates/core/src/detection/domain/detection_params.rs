use thiserror::Error;

pub const DEFAULT_SCALE_FACTOR: f64 = 1.2;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;
pub const DEFAULT_MIN_SIZE: u32 = 20;

#[derive(Error, Debug, PartialEq)]
#[error("invalid detection parameter: {0}")]
pub struct InvalidParams(pub String);

/// Multi-scale scan tuning, fixed for the lifetime of a detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    scale_factor: f64,
    min_neighbors: u32,
    min_size: (u32, u32),
}

impl DetectionParams {
    /// `scale_factor` is the pyramid step and must exceed 1. `min_neighbors`
    /// is how many overlapping raw hits a location needs beyond the first;
    /// 0 disables grouping. `min_size` is the smallest face window, in pixels.
    pub fn new(
        scale_factor: f64,
        min_neighbors: u32,
        min_size: (u32, u32),
    ) -> Result<Self, InvalidParams> {
        if !scale_factor.is_finite() || scale_factor <= 1.0 {
            return Err(InvalidParams(format!(
                "scale factor must be greater than 1.0, got {scale_factor}"
            )));
        }
        if min_size.0 == 0 || min_size.1 == 0 {
            return Err(InvalidParams(format!(
                "minimum size must be at least 1x1, got {}x{}",
                min_size.0, min_size.1
            )));
        }
        Ok(Self {
            scale_factor,
            min_neighbors,
            min_size,
        })
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn min_neighbors(&self) -> u32 {
        self.min_neighbors
    }

    pub fn min_size(&self) -> (u32, u32) {
        self.min_size
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: (DEFAULT_MIN_SIZE, DEFAULT_MIN_SIZE),
        }
    }
}
