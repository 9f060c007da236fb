//! Keyboard Layout Detector
//!
//! Classifies a photographed keyboard from a binary key mask (and optionally a
//! grayscale image and OCR detections) along three axes: physical form factor
//! (ISO/ANSI), platform (Mac/Windows) and character layout family
//! (AZERTY/QWERTY/QWERTZ), with a regional variant when OCR evidence allows.

pub mod batch;
pub mod calibration;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod input;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod region;
pub mod stats;
pub mod zoning;

#[cfg(test)]
mod test_support;

pub use classify::{FormFactor, Layout, Platform, Verdict};
pub use config::{load_config, DetectorConfig};
pub use error::{DetectError, Result};
pub use pipeline::{analyze, AnalysisInput, AnalysisReport, Issue};
