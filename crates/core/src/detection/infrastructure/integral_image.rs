use ndarray::{Array2, ArrayView2};

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables carry a leading zero row and column, so any rectangle sum
/// costs four lookups. Plain sums live in `u32` and may wrap on very large
/// images; box sums use modular arithmetic, so they stay exact as long as
/// the box itself sums below 2^32 (any box up to 16M pixels). Squared sums
/// use `u64`, which cannot overflow for any decodable image.
pub struct IntegralImage {
    sum: Array2<u32>,
    sq_sum: Array2<u64>,
}

impl IntegralImage {
    pub fn new(pixels: ArrayView2<'_, u8>) -> Self {
        let (h, w) = pixels.dim();
        let mut sum = Array2::<u32>::zeros((h + 1, w + 1));
        let mut sq_sum = Array2::<u64>::zeros((h + 1, w + 1));

        for y in 0..h {
            let mut row = 0u32;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = pixels[[y, x]] as u32;
                row = row.wrapping_add(v);
                row_sq += (v * v) as u64;
                sum[[y + 1, x + 1]] = sum[[y, x + 1]].wrapping_add(row);
                sq_sum[[y + 1, x + 1]] = sq_sum[[y, x + 1]] + row_sq;
            }
        }

        Self { sum, sq_sum }
    }

    pub fn width(&self) -> usize {
        self.sum.ncols() - 1
    }

    pub fn height(&self) -> usize {
        self.sum.nrows() - 1
    }

    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        box_sum(&self.sum, x, y, w, h) as f64
    }

    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let t = &self.sq_sum;
        (t[[y + h, x + w]] + t[[y, x]] - t[[y, x + w]] - t[[y + h, x]]) as f64
    }
}

fn box_sum(table: &Array2<u32>, x: usize, y: usize, w: usize, h: usize) -> u32 {
    table[[y + h, x + w]]
        .wrapping_add(table[[y, x]])
        .wrapping_sub(table[[y, x + w]])
        .wrapping_sub(table[[y + h, x]])
}
