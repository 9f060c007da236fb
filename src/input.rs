//! Loading masks, grayscale images and OCR detections from disk.

use anyhow::{Context, Result};
use image::GrayImage;
use std::fs;
use std::path::Path;

use crate::ocr::OcrDetection;

/// Loads a key mask. Any non-zero pixel is key material; `invert` flips the
/// image first for masks drawn with dark keys on a light background.
pub fn load_mask(path: &Path, invert: bool) -> Result<GrayImage> {
    let mut mask = load_gray(path)?;
    if invert {
        image::imageops::invert(&mut mask);
    }
    Ok(mask)
}

/// Loads any image as 8-bit grayscale.
pub fn load_gray(path: &Path) -> Result<GrayImage> {
    let img = image::open(path).context(format!("Failed to open image: {}", path.display()))?;
    Ok(img.to_luma8())
}

/// Loads OCR detections from a JSON array of `{text, confidence, x_center, y_center}`.
pub fn load_detections(path: &Path) -> Result<Vec<OcrDetection>> {
    let contents = fs::read_to_string(path)
        .context(format!("Failed to read OCR file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .context(format!("Failed to parse OCR detections: {}", path.display()))
}
