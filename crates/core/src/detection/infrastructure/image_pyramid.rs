use std::borrow::Cow;

use ndarray::ArrayView2;

use crate::shared::frame::Frame;

/// One scale of the detection pyramid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PyramidLevel {
    /// Source pixels per scaled pixel.
    pub factor: f64,
    /// Size of the downscaled image the fixed window slides over.
    pub scaled_size: (u32, u32),
    /// Size of the scan window mapped back to source pixels.
    pub window_size: (u32, u32),
}

/// Plans the pyramid for an image, coarsening by `scale_factor` until the
/// downscaled image no longer exceeds the classifier window.
///
/// Levels whose mapped window is below `min_size` are skipped but still
/// advance the scale.
pub fn plan_levels(
    image_size: (u32, u32),
    window: (u32, u32),
    scale_factor: f64,
    min_size: (u32, u32),
) -> Vec<PyramidLevel> {
    let mut levels = Vec::new();
    let mut factor = 1.0f64;
    loop {
        let scaled_size = (
            (image_size.0 as f64 / factor).round() as u32,
            (image_size.1 as f64 / factor).round() as u32,
        );
        if scaled_size.0 <= window.0 || scaled_size.1 <= window.1 {
            break;
        }
        let window_size = (
            (window.0 as f64 * factor).round() as u32,
            (window.1 as f64 * factor).round() as u32,
        );
        if window_size.0 >= min_size.0 && window_size.1 >= min_size.1 {
            levels.push(PyramidLevel {
                factor,
                scaled_size,
                window_size,
            });
        }
        factor *= scale_factor;
    }
    levels
}

/// Bilinear downscale of `frame` to the level's size. The first level
/// borrows the source unchanged.
pub fn render_level<'a>(frame: &'a Frame, level: &PyramidLevel) -> Cow<'a, Frame> {
    if level.scaled_size == (frame.width(), frame.height()) {
        return Cow::Borrowed(frame);
    }
    Cow::Owned(resize_bilinear(frame.as_ndarray(), level.scaled_size))
}

/// Two-tap linear interpolation with pixel centres aligned: destination
/// index `d` samples source position `(d + 0.5) * src / dst - 0.5`, clamped
/// to the image. No area averaging, so fine detail aliases the same way a
/// cascade trained on linearly resized pyramids expects.
fn resize_bilinear(src: ArrayView2<'_, u8>, size: (u32, u32)) -> Frame {
    let (src_h, src_w) = src.dim();
    let xs = taps(src_w, size.0 as usize);
    let ys = taps(src_h, size.1 as usize);

    let data = ys
        .iter()
        .flat_map(|&(y0, y1, fy)| {
            xs.iter().map(move |&(x0, x1, fx)| {
                let lerp = |a: u8, b: u8, t: f32| a as f32 + (b as f32 - a as f32) * t;
                let top = lerp(src[[y0, x0]], src[[y0, x1]], fx);
                let bottom = lerp(src[[y1, x0]], src[[y1, x1]], fx);
                (top + (bottom - top) * fy).round() as u8
            })
        })
        .collect();
    Frame::new(data, size.0, size.1)
}

/// Source neighbours and weight of the second one, per destination index.
fn taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = src_len as f64 / dst_len as f64;
    let last = src_len.saturating_sub(1);
    (0..dst_len)
        .map(|d| {
            let pos = ((d as f64 + 0.5) * scale - 0.5).clamp(0.0, last as f64);
            let i0 = pos.floor() as usize;
            let i1 = (i0 + 1).min(last);
            (i0, i1, (pos - i0 as f64) as f32)
        })
        .collect()
}
