use std::path::Path;
use std::time::Instant;

use crate::detection::domain::detection_params::DetectionParams;
use crate::detection::domain::face_detector::{check_deadline, DetectionError, FaceDetector};
use crate::shared::face_box::{FaceBox, CASCADE_CONFIDENCE};
use crate::shared::frame::Frame;

use super::haar_cascade::{HaarCascade, ModelLoadError, WindowVerdict};
use super::image_pyramid::{plan_levels, render_level, PyramidLevel};
use super::integral_image::IntegralImage;
use super::rect_grouper::{group_rectangles, Rect, GROUP_EPS};

/// Pyramid factor above which the window moves one pixel at a time.
const FINE_STEP_FACTOR: f64 = 2.0;

/// Multi-scale sliding-window face detector over a boosted Haar cascade.
///
/// Holds only immutable model data, so one instance serves all workers.
pub struct CascadeFaceDetector {
    cascade: HaarCascade,
    params: DetectionParams,
}

impl CascadeFaceDetector {
    pub fn new(cascade: HaarCascade, params: DetectionParams) -> Self {
        Self { cascade, params }
    }

    /// Loads the cascade at `model_path`. Any failure is fatal for startup.
    pub fn from_model_file(
        model_path: &Path,
        params: DetectionParams,
    ) -> Result<Self, ModelLoadError> {
        let cascade = HaarCascade::load(model_path)?;
        log::info!(
            "Loaded cascade {} ({}x{} window, {} stages, {} features)",
            model_path.display(),
            cascade.window().0,
            cascade.window().1,
            cascade.stage_count(),
            cascade.feature_count()
        );
        Ok(Self::new(cascade, params))
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    fn scan_level(
        &self,
        frame: &Frame,
        level: &PyramidLevel,
        deadline: Option<Instant>,
        hits: &mut Vec<Rect>,
    ) -> Result<(), DetectionError> {
        let scaled = render_level(frame, level);
        let integral = IntegralImage::new(scaled.as_ndarray());
        let (win_w, win_h) = self.cascade.window();
        let max_x = integral.width().saturating_sub(win_w as usize);
        let max_y = integral.height().saturating_sub(win_h as usize);
        let step = if level.factor > FINE_STEP_FACTOR { 1 } else { 2 };

        let mut y = 0;
        while y <= max_y {
            check_deadline(deadline)?;
            let mut x = 0;
            while x <= max_x {
                match self.cascade.evaluate(&integral, x, y) {
                    WindowVerdict::Accepted => hits.push(Rect::new(
                        (x as f64 * level.factor).round() as i32,
                        (y as f64 * level.factor).round() as i32,
                        level.window_size.0 as i32,
                        level.window_size.1 as i32,
                    )),
                    // a window that fails the first stage is far from a face
                    WindowVerdict::Rejected { stage: 0 } => x += step,
                    WindowVerdict::Rejected { .. } => {}
                }
                x += step;
            }
            y += step;
        }
        Ok(())
    }
}

impl FaceDetector for CascadeFaceDetector {
    fn detect(
        &self,
        frame: &Frame,
        deadline: Option<Instant>,
    ) -> Result<Vec<FaceBox>, DetectionError> {
        if frame.is_empty() {
            return Err(DetectionError::EmptyImage);
        }

        let levels = plan_levels(
            (frame.width(), frame.height()),
            self.cascade.window(),
            self.params.scale_factor(),
            self.params.min_size(),
        );

        let mut hits = Vec::new();
        for level in &levels {
            check_deadline(deadline)?;
            self.scan_level(frame, level, deadline, &mut hits)?;
        }

        check_deadline(deadline)?;
        let grouped = group_rectangles(&hits, self.params.min_neighbors(), GROUP_EPS, deadline)?;
        log::debug!(
            "{}x{} image: {} levels, {} raw hits, {} grouped",
            frame.width(),
            frame.height(),
            levels.len(),
            hits.len(),
            grouped.len()
        );

        Ok(grouped
            .into_iter()
            .map(|r| FaceBox::new(r.x, r.y, r.width, r.height, CASCADE_CONFIDENCE))
            .collect())
    }
}
