//! Square-window grayscale morphology.
//!
//! Window positions falling outside the grid are skipped rather than padded,
//! so borders are neither darkened by dilation nor lightened by erosion.

use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Force an odd window size. `0` behaves like `1` (identity).
pub fn normalize_kernel_size(kernel_size: u32) -> u32 {
    if kernel_size % 2 == 0 { kernel_size + 1 } else { kernel_size }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Max,
    Min,
}

impl Extremum {
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Extremum::Max => a.max(b),
            Extremum::Min => a.min(b),
        }
    }

    fn identity(self) -> u8 {
        match self {
            Extremum::Max => u8::MIN,
            Extremum::Min => u8::MAX,
        }
    }
}

/// Rectangular windows are separable: a horizontal pass followed by a
/// vertical pass gives the same extremum as scanning the full square.
fn window_filter(mask: &GrayImage, kernel_size: u32, op: Extremum) -> GrayImage {
    let (width, height) = mask.dimensions();
    let radius = (normalize_kernel_size(kernel_size) / 2) as i64;
    if radius == 0 || width == 0 || height == 0 {
        return mask.clone();
    }

    let mut horizontal = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let lo = (x as i64 - radius).max(0) as u32;
            let hi = (x as i64 + radius).min(width as i64 - 1) as u32;
            let value = (lo..=hi).fold(op.identity(), |acc, px| op.pick(acc, mask.get_pixel(px, y)[0]));
            horizontal.put_pixel(x, y, Luma([value]));
        }
    }

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let lo = (y as i64 - radius).max(0) as u32;
        let hi = (y as i64 + radius).min(height as i64 - 1) as u32;
        for x in 0..width {
            let value = (lo..=hi).fold(op.identity(), |acc, py| op.pick(acc, horizontal.get_pixel(x, py)[0]));
            output.put_pixel(x, y, Luma([value]));
        }
    }

    output
}

/// Each output pixel is the maximum of its `kernel_size`×`kernel_size` neighbourhood
pub fn dilate(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    window_filter(mask, kernel_size, Extremum::Max)
}

/// Each output pixel is the minimum of its `kernel_size`×`kernel_size` neighbourhood
pub fn erode(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    window_filter(mask, kernel_size, Extremum::Min)
}

/// Morphological closing: dilate, then erode the dilation result.
///
/// Fills holes and gaps narrower than the window while keeping the overall
/// shape. Binary input stays binary.
pub fn close(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    erode(&dilate(mask, kernel_size), kernel_size)
}

/// Closing over an RGBA raster whose red channel carries the intensity.
///
/// The result is written to all three colour channels and alpha is forced opaque.
pub fn close_rgba(image: &RgbaImage, kernel_size: u32) -> RgbaImage {
    let intensity = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[0]])
    });
    let closed = close(&intensity, kernel_size);

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let v = closed.get_pixel(x, y)[0];
        Rgba([v, v, v, 255])
    })
}

/// True when every pixel is either 0 or 255
pub fn is_binary(mask: &GrayImage) -> bool {
    mask.pixels().all(|p| p[0] == 0 || p[0] == 255)
}
