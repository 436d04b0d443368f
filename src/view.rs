use crate::error::{LatchError, LatchResult};

/// Borrowed row-major 8 bit image with an explicit row pitch.
///
/// Rows start every `stride` bytes, only the first `width` bytes of a row are pixels.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: u32,
}

impl<'a> ImageView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: u32) -> LatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(LatchError::ZeroDimension { width, height });
        }
        // Clamped reads do their arithmetic in i32.
        let max = i32::MAX as u32;
        if width > max || height > max || stride > max {
            return Err(LatchError::DimensionTooLarge {
                width,
                height,
                stride,
            });
        }
        if stride < width {
            return Err(LatchError::StrideTooSmall { width, stride });
        }
        // The last row does not need its padding.
        let required = (height as usize - 1) * stride as usize + width as usize;
        if data.len() < required {
            return Err(LatchError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }
        Ok(ImageView {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The raw buffer, including row padding.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.row(y)[x as usize]
    }

    /// Pixel value with both coordinates clamped onto the image, replicating the border.
    #[inline]
    pub fn pixel_clamped(&self, x: i32, y: i32) -> u8 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.stride as usize + x]
    }
}

impl<'a> From<&'a image::GrayImage> for ImageView<'a> {
    fn from(img: &'a image::GrayImage) -> Self {
        ImageView {
            data: img.as_raw(),
            width: img.width(),
            height: img.height(),
            stride: img.width(),
        }
    }
}
