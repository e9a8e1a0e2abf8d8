use ndarray::ArrayView2;

/// A decoded still image: single-channel luminance bytes in row-major order.
///
/// Owned by the request that decoded it and dropped once the response is
/// built; detection only ever borrows it.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize),
            "data length must equal width * height"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView2<'_, u8> {
        ArrayView2::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }
}

impl From<image::GrayImage> for Frame {
    fn from(img: image::GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height)
    }
}
