use image::GrayImage;
use crate::{algorithms::morphology, error::Result, traits::ImagePreprocessor};

/// Simple thresholding preprocessor
#[derive(Debug, Clone)]
pub struct ThresholdPreprocessor {
    pub threshold: u8,
}

impl Default for ThresholdPreprocessor {
    fn default() -> Self {
        Self { threshold: 128 }
    }
}

impl ImagePreprocessor for ThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::contrast::threshold(image, self.threshold))
    }

    fn name(&self) -> &'static str {
        "threshold"
    }
}

/// Morphological closing (dilate then erode) to fill pinholes and gaps
#[derive(Debug, Clone)]
pub struct ClosingPreprocessor {
    pub kernel_size: u32,
}

impl Default for ClosingPreprocessor {
    fn default() -> Self {
        Self { kernel_size: 5 }
    }
}

impl ImagePreprocessor for ClosingPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(morphology::close(image, self.kernel_size))
    }

    fn name(&self) -> &'static str {
        "closing"
    }
}
