use image::{imageops, ImageBuffer, Rgb, RgbImage};
use ndarray::ArrayView3;

/// A single video/image frame: contiguous RGB bytes in row-major order.
///
/// Decoding happens outside this crate; the pipeline only ever sees
/// three-channel RGB data.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * Self::CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Frame of uniform colour.
    pub fn filled(width: u32, height: u32, color: [u8; 3], index: usize) -> Self {
        let data = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * Self::CHANNELS)
            .collect();
        Self::new(data, width, height, index)
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
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

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, Self::CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Borrowed `image` view over the pixel buffer.
    pub fn as_image(&self) -> ImageBuffer<Rgb<u8>, &[u8]> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
            .expect("Frame data length must match dimensions")
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Frame data length must match dimensions")
    }

    /// Bilinear resize to `width` × `height`.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let resized = imageops::resize(
            &self.as_image(),
            width,
            height,
            imageops::FilterType::Triangle,
        );
        Frame::from_rgb_image(resized, self.index)
    }

    /// Copy with `amount` pixels of `fill` added on every side.
    pub fn padded(&self, amount: u32, fill: [u8; 3]) -> Frame {
        let width = self.width + 2 * amount;
        let height = self.height + 2 * amount;
        let mut out = Frame::filled(width, height, fill, self.index);

        let row_len = self.width as usize * Self::CHANNELS;
        for y in 0..self.height as usize {
            let src = y * row_len;
            let dst = ((y + amount as usize) * width as usize + amount as usize) * Self::CHANNELS;
            out.data[dst..dst + row_len].copy_from_slice(&self.data[src..src + row_len]);
        }
        out
    }

    /// Sub-frame `[x1, x2) × [y1, y2)`, clipped to the frame bounds.
    ///
    /// Returns `None` when the clipped region is empty.
    pub fn crop(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Frame> {
        let x1 = x1.clamp(0, self.width as i64) as usize;
        let y1 = y1.clamp(0, self.height as i64) as usize;
        let x2 = x2.clamp(0, self.width as i64) as usize;
        let y2 = y2.clamp(0, self.height as i64) as usize;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let w = x2 - x1;
        let mut data = Vec::with_capacity(w * (y2 - y1) * Self::CHANNELS);
        for y in y1..y2 {
            let start = (y * self.width as usize + x1) * Self::CHANNELS;
            data.extend_from_slice(&self.data[start..start + w * Self::CHANNELS]);
        }
        Some(Frame::new(data, w as u32, (y2 - y1) as u32, self.index))
    }
}
