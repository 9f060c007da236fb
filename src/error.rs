//! Error type for caller contract violations.
//!
//! Routine "not enough signal" situations (too few regions, missing landmarks,
//! ambiguous axes) are not errors: they are reported as [`crate::pipeline::Issue`]
//! values inside an otherwise successful analysis report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Key mask has zero dimensions ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Grayscale image is {gray_width}x{gray_height} but the mask is {mask_width}x{mask_height}")]
    DimensionMismatch {
        mask_width: u32,
        mask_height: u32,
        gray_width: u32,
        gray_height: u32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not enough calibration data: {0}")]
    InsufficientCalibrationData(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, DetectError>;
