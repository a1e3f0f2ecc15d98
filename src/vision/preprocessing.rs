// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page image preprocessing for the detection, recognition and layout models
//!
//! Tensor buffers are reserved fallibly so that a page too large for host
//! memory surfaces as `ComputeError::OutOfMemory` instead of aborting.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{arr2, Array2, Array4};

use crate::models::ComputeError;

/// Square input side for the text detection model
pub const DET_INPUT_SIZE: u32 = 960;

/// Recognition model input height (PP-OCR uses 48)
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
pub const REC_MAX_WIDTH: u32 = 2048;

/// Square input side for the layout model
pub const LAYOUT_INPUT_SIZE: u32 = 800;

/// Mean values for normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Allocate a zeroed `[1, 3, height, width]` tensor without aborting on failure
pub fn alloc_nchw(height: usize, width: usize) -> Result<Array4<f32>, ComputeError> {
    let len = 3usize
        .checked_mul(height)
        .and_then(|n| n.checked_mul(width))
        .ok_or_else(|| {
            ComputeError::OutOfMemory(format!("tensor of {}x{} pixels is too large", width, height))
        })?;

    let mut data: Vec<f32> = Vec::new();
    data.try_reserve_exact(len)?;
    data.resize(len, 0.0);

    Array4::from_shape_vec((1, 3, height, width), data)
        .map_err(|e| ComputeError::Failed(format!("tensor shape error: {}", e)))
}

/// Write an RGB image into an NCHW tensor normalized with ImageNet mean/std
fn fill_normalized(tensor: &mut Array4<f32>, rgb: &RgbImage) {
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }
}

/// Preprocess a page for text detection
///
/// The page is letterboxed into a `DET_INPUT_SIZE` square; use
/// `PreprocessInfo` to map detections back to page coordinates.
pub fn preprocess_for_detection(image: &DynamicImage) -> Result<Array4<f32>, ComputeError> {
    let resized = resize_with_padding(image, DET_INPUT_SIZE);
    let rgb = resized.to_rgb8();

    let mut tensor = alloc_nchw(DET_INPUT_SIZE as usize, DET_INPUT_SIZE as usize)?;
    fill_normalized(&mut tensor, &rgb);
    Ok(tensor)
}

/// Preprocess a cropped text line for recognition
///
/// Height is fixed at `REC_INPUT_HEIGHT`; width follows the aspect ratio,
/// clamped to `[4, REC_MAX_WIDTH]`.
pub fn preprocess_for_recognition(image: &DynamicImage) -> Result<Array4<f32>, ComputeError> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Err(ComputeError::Failed("empty text crop".to_string()));
    }

    let scale = REC_INPUT_HEIGHT as f32 / orig_h as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32).clamp(4, REC_MAX_WIDTH);

    let resized = image.resize_exact(
        new_width,
        REC_INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );
    let rgb = resized.to_rgb8();

    let mut tensor = alloc_nchw(REC_INPUT_HEIGHT as usize, new_width as usize)?;
    fill_normalized(&mut tensor, &rgb);
    Ok(tensor)
}

/// Inputs for the layout model: the image tensor plus its scale and shape
pub struct LayoutInputs {
    pub image: Array4<f32>,
    /// `[[scale_y, scale_x]]`, resized over original
    pub scale_factor: Array2<f32>,
    /// `[[height, width]]` of the resized image
    pub im_shape: Array2<f32>,
}

/// Preprocess a page for the layout model (stretched to a fixed square)
pub fn preprocess_for_layout(image: &DynamicImage) -> Result<LayoutInputs, ComputeError> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Err(ComputeError::InvalidDocument("page rendered to an empty image".to_string()));
    }

    let side = LAYOUT_INPUT_SIZE;
    let resized = image.resize_exact(side, side, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut tensor = alloc_nchw(side as usize, side as usize)?;
    fill_normalized(&mut tensor, &rgb);

    let scale_y = side as f32 / orig_h as f32;
    let scale_x = side as f32 / orig_w as f32;

    Ok(LayoutInputs {
        image: tensor,
        scale_factor: arr2(&[[scale_y, scale_x]]),
        im_shape: arr2(&[[side as f32, side as f32]]),
    })
}

/// Resize image with aspect ratio preservation and padding
///
/// The image is scaled to fit within target_size x target_size
/// while preserving aspect ratio, then padded with gray (128)
/// to reach the target dimensions.
pub fn resize_with_padding(image: &DynamicImage, target_size: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    if orig_w == 0 || orig_h == 0 {
        return DynamicImage::ImageRgb8(RgbImage::from_pixel(
            target_size,
            target_size,
            Rgb([128, 128, 128]),
        ));
    }

    let info = PreprocessInfo::new(image, target_size);
    let new_w = ((orig_w as f32 * info.scale).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * info.scale).round() as u32).clamp(1, target_size);

    let resized = image
        .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut output = RgbImage::from_pixel(target_size, target_size, Rgb([128, 128, 128]));
    image::imageops::replace(
        &mut output,
        &resized,
        info.offset_x as i64,
        info.offset_y as i64,
    );

    DynamicImage::ImageRgb8(output)
}

/// Scaling factor and offsets used during letterboxing
///
/// Maps detection results back to original coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessInfo {
    /// Scale factor applied
    pub scale: f32,
    /// X offset from padding
    pub offset_x: u32,
    /// Y offset from padding
    pub offset_y: u32,
    /// Original image width
    pub original_width: u32,
    /// Original image height
    pub original_height: u32,
}

impl PreprocessInfo {
    /// Calculate preprocessing info for an image
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();

        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a coordinate from preprocessed space back to original image space
    ///
    /// Results are clamped to the original image bounds.
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}

/// Crop a region of a page, clamped to the page bounds
///
/// Returns `None` when the clamped region is empty.
pub fn crop_region(page: &DynamicImage, x: f32, y: f32, width: f32, height: f32) -> Option<DynamicImage> {
    let (page_w, page_h) = page.dimensions();
    let x0 = x.max(0.0).floor() as u32;
    let y0 = y.max(0.0).floor() as u32;
    let x1 = ((x + width).ceil() as u32).min(page_w);
    let y1 = ((y + height).ceil() as u32).min(page_h);

    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    Some(page.crop_imm(x0, y0, x1 - x0, y1 - y0))
}
