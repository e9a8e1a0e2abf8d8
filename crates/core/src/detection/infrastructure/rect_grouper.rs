use std::time::Instant;

use crate::detection::domain::face_detector::{check_deadline, DetectionError};

use super::math::partition;

/// Relative tolerance for treating two raw hits as the same location.
pub const GROUP_EPS: f64 = 0.2;

/// Integer window rectangle in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Collapses overlapping raw cascade hits into confirmed detections.
///
/// Hits are clustered by edge proximity (`eps` relative to the smaller
/// size), each cluster is averaged, and only clusters with more than
/// `min_neighbors` members survive. A surviving cluster that sits inside a
/// stronger one is dropped. With `min_neighbors == 0` the raw hits are
/// returned untouched.
///
/// Clustering is quadratic in the hit count, so `deadline` is checked
/// before every row of the pairwise pass.
pub fn group_rectangles(
    rects: &[Rect],
    min_neighbors: u32,
    eps: f64,
    deadline: Option<Instant>,
) -> Result<Vec<Rect>, DetectionError> {
    if min_neighbors == 0 || rects.is_empty() {
        return Ok(rects.to_vec());
    }

    let (labels, classes) =
        partition(rects, |a, b| similar(a, b, eps), || check_deadline(deadline))?;

    let mut sums = vec![[0i64; 4]; classes];
    let mut counts = vec![0u32; classes];
    for (r, &cls) in rects.iter().zip(&labels) {
        let s = &mut sums[cls];
        s[0] += r.x as i64;
        s[1] += r.y as i64;
        s[2] += r.width as i64;
        s[3] += r.height as i64;
        counts[cls] += 1;
    }

    let averaged: Vec<Rect> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            Rect::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut kept = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            j != i && n2 > min_neighbors && inside(r1, r2, eps) && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            kept.push(*r1);
        }
    }
    Ok(kept)
}

fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    ((a.x - b.x).abs() as f64) <= delta
        && ((a.y - b.y).abs() as f64) <= delta
        && ((a.x + a.width - b.x - b.width).abs() as f64) <= delta
        && ((a.y + a.height - b.y - b.height).abs() as f64) <= delta
}

/// Whether `inner` lies within `outer` grown by `eps` of its size.
fn inside(inner: &Rect, outer: &Rect, eps: f64) -> bool {
    let dx = (outer.width as f64 * eps).round() as i32;
    let dy = (outer.height as f64 * eps).round() as i32;
    inner.x >= outer.x - dx
        && inner.y >= outer.y - dy
        && inner.x + inner.width <= outer.x + outer.width + dx
        && inner.y + inner.height <= outer.y + outer.height + dy
}
