use image::{imageops, GrayImage, RgbaImage};
use lens_data::Region;
use serde::{Deserialize, Serialize};

use crate::VisionError;

/// Which edge of the raw capture the HUD top sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopSide {
    Left,
    Right,
    Unknown,
}

/// Rotate a raw capture into the canonical portrait orientation.
/// 90 degrees when the HUD top is on the left edge, 270 when on the right,
/// identity otherwise. Pixel data is preserved apart from the rotation.
pub fn orient(frame: &RgbaImage, top: TopSide) -> RgbaImage {
    match top {
        TopSide::Left => imageops::rotate90(frame),
        TopSide::Right => imageops::rotate270(frame),
        TopSide::Unknown => frame.clone(),
    }
}

/// Copy out a sub-raster. Errors when the region reaches past the frame;
/// a partial crop is never returned.
pub fn crop(frame: &RgbaImage, region: Region) -> Result<RgbaImage, VisionError> {
    check_bounds(frame.width(), frame.height(), region)?;
    Ok(imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image())
}

/// `crop` for grayscale rasters (the binarized counter strip).
pub fn crop_gray(strip: &GrayImage, region: Region) -> Result<GrayImage, VisionError> {
    check_bounds(strip.width(), strip.height(), region)?;
    Ok(imageops::crop_imm(strip, region.x, region.y, region.width, region.height).to_image())
}

fn check_bounds(width: u32, height: u32, region: Region) -> Result<(), VisionError> {
    if region.fits_within(width, height) {
        Ok(())
    } else {
        Err(VisionError::OutOfBounds {
            region,
            width,
            height,
        })
    }
}

/// Convert to grayscale and map every pixel to pure white above the luminance
/// threshold, pure black otherwise. The threshold comes from the layout
/// profile and is not recomputed per frame.
pub fn binarize(frame: &RgbaImage, threshold: u8) -> GrayImage {
    let gray = imageops::grayscale(frame);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            image::Luma([255u8])
        } else {
            image::Luma([0u8])
        }
    })
}
