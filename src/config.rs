//! Configuration types for the detector.
//!
//! Every threshold used by extraction, zoning and classification lives here as
//! a named field, so recalibration only edits `config.json`. Values marked
//! `_hr` are multiples of the reference key height `h_ref`, measured upward
//! from the space bar centroid. Values marked `_px` are absolute pixels.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DetectError, Result};

/// Bounds used by the region extractor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Smallest accepted region, in pixels (function keys, arrows)
    pub area_min: u32,
    /// Largest accepted region, in pixels (must still admit the space bar)
    pub area_max: u32,
    /// Minimum width/height ratio; 0.0 disables the check
    pub ratio_min: f64,
    /// Maximum width/height ratio (space bar is around 6.5)
    pub ratio_max: f64,
    /// Minimum solidity (area / convex hull area); 0.0 disables the check
    pub solidity_min: f64,
    /// Minimum extent (area / bounding box area); 0.0 disables the check
    pub extent_min: f64,
    /// Maximum vertical distance in pixels from the mean key centroid row
    pub y_proximity_threshold: f64,
    /// Fewer surviving regions than this aborts zoning
    pub min_regions: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            area_min: 2000,
            area_max: 400_000,
            ratio_min: 0.0,
            ratio_max: 8.0,
            solidity_min: 0.0,
            extent_min: 0.0,
            y_proximity_threshold: 1000.0,
            min_regions: 10,
        }
    }
}

/// Corridor definitions for the landmark search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoningConfig {
    /// OS key: max |dy| from the space bar, in h_ref
    pub os_dy_tolerance: f64,
    /// OS key: how far left of the space bar's left edge to look, in pixels
    pub os_dx_margin_px: f64,
    /// OS key: fraction of the space half-width the candidate must clear
    pub os_dx_min_fraction: f64,
    /// Left shift: nearest row offset above space, in h_ref
    pub shift_y_min_hr: f64,
    /// Left shift: farthest row offset above space, in h_ref (Caps Lock sits near 2.2)
    pub shift_y_max_hr: f64,
    /// Top-left letter: nearest row offset above space, in h_ref
    pub tl_letter_y_min_hr: f64,
    /// Top-left letter: farthest row offset above space, in h_ref
    pub tl_letter_y_max_hr: f64,
    /// Leftmost corridor key wider than this (w/h) is treated as Tab
    pub tab_ratio_min: f64,
    /// Whether to look for the Enter key at all
    pub detect_enter: bool,
    /// Enter: expected centroid offset above space, in h_ref
    pub enter_y_target_hr: f64,
    /// Enter: allowed deviation from the target, in h_ref
    pub enter_y_tolerance_hr: f64,
}

impl Default for ZoningConfig {
    fn default() -> Self {
        Self {
            os_dy_tolerance: 0.8,
            os_dx_margin_px: 250.0,
            os_dx_min_fraction: 0.1,
            shift_y_min_hr: 0.5,
            shift_y_max_hr: 2.0,
            tl_letter_y_min_hr: 2.5,
            tl_letter_y_max_hr: 3.8,
            tab_ratio_min: 1.2,
            detect_enter: true,
            enter_y_target_hr: 2.2,
            enter_y_tolerance_hr: 0.6,
        }
    }
}

/// Decision thresholds of the geometric classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Shift width/height below this is ISO
    pub threshold_shift_ratio_iso: f64,
    /// Enter height/width above this is an ISO-shaped Enter
    pub threshold_enter_ratio_h_l_iso: f64,
    /// Enter height/width below this is an ANSI-shaped Enter
    pub threshold_enter_ratio_h_l_ansi: f64,
    /// OS glyph Euler number at or below this is the Command glyph
    pub threshold_euler_mac: i64,
    /// OS glyph Euler number at or above this is the Windows glyph
    pub threshold_euler_win: i64,
    /// Top-left letter normalized centroid row above this leans AZERTY
    pub threshold_tl_center_y_azerty: f64,
    /// Top-left letter extent below this leans AZERTY
    pub threshold_tl_extent_azerty: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            threshold_shift_ratio_iso: 2.1,
            threshold_enter_ratio_h_l_iso: 1.0,
            threshold_enter_ratio_h_l_ansi: 0.7,
            threshold_euler_mac: -1,
            threshold_euler_win: 1,
            threshold_tl_center_y_azerty: 0.53,
            threshold_tl_extent_azerty: 0.80,
        }
    }
}

/// Row clustering strategy for the OCR path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringMethod {
    #[default]
    Kmeans,
    GaussianMixture,
}

/// Points awarded or removed by the OCR row scorer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub row_match: i32,
    pub indicator_bonus: i32,
    /// Removed once per contradicting letter (Q on top for AZERTY, ...)
    pub contradiction_penalty: i32,
    /// Bonus for QWERTZ when Y is seen on the bottom row
    pub qwertz_y_bonus: i32,
    /// Penalty for QWERTY when Y is seen on the bottom row
    pub qwerty_y_penalty: i32,
    pub base_confidence: f64,
    pub max_confidence: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            row_match: 10,
            indicator_bonus: 15,
            // 3 x (50, 40, 20): each rule fires once per reference layout
            contradiction_penalty: 150,
            qwertz_y_bonus: 120,
            qwerty_y_penalty: 60,
            base_confidence: 50.0,
            max_confidence: 100.0,
        }
    }
}

/// Gates and weights for the OCR-assisted classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Raw OCR detections below this confidence (0.0-1.0) are ignored
    pub min_detection_confidence: f32,
    /// Distinct characters required before clustering rows
    pub min_characters: usize,
    /// OCR layout verdicts below this confidence (0-100) do not override geometry
    pub min_layout_confidence: f64,
    pub clustering: ClusteringMethod,
    pub max_iterations: usize,
    pub weights: ScoringWeights,
    /// Regional variant matches below this score are discarded
    pub variant_min_score: f64,
    /// Added to a variant whose ISO/ANSI type matches the geometric verdict
    pub variant_iso_bonus: f64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.3,
            min_characters: 5,
            min_layout_confidence: 60.0,
            clustering: ClusteringMethod::default(),
            max_iterations: 100,
            weights: ScoringWeights::default(),
            variant_min_score: 0.3,
            variant_iso_bonus: 0.1,
        }
    }
}

/// Complete detector configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub extraction: ExtractionConfig,
    pub zoning: ZoningConfig,
    pub classification: ClassificationConfig,
    pub ocr: OcrConfig,
}

fn invalid(msg: impl Into<String>) -> DetectError {
    DetectError::InvalidConfig(msg.into())
}

impl DetectorConfig {
    /// Checks that the values are mutually consistent.
    pub fn validate(&self) -> Result<()> {
        let e = &self.extraction;
        if e.area_min > e.area_max {
            return Err(invalid(format!(
                "area_min ({}) exceeds area_max ({})",
                e.area_min, e.area_max
            )));
        }
        if e.ratio_max <= 0.0 || e.ratio_min < 0.0 || e.ratio_min > e.ratio_max {
            return Err(invalid(format!(
                "ratio bounds [{}, {}] are not a valid range",
                e.ratio_min, e.ratio_max
            )));
        }
        if !(0.0..=1.0).contains(&e.solidity_min) || !(0.0..=1.0).contains(&e.extent_min) {
            return Err(invalid("solidity_min and extent_min must lie in [0, 1]"));
        }
        if e.y_proximity_threshold <= 0.0 {
            return Err(invalid("y_proximity_threshold must be positive"));
        }

        let z = &self.zoning;
        if z.os_dy_tolerance <= 0.0 || z.os_dx_margin_px < 0.0 || z.os_dx_min_fraction < 0.0 {
            return Err(invalid("OS key corridor values must be positive"));
        }
        if z.shift_y_min_hr < 0.0 || z.shift_y_min_hr >= z.shift_y_max_hr {
            return Err(invalid(format!(
                "shift corridor [{}, {}] h_ref is empty",
                z.shift_y_min_hr, z.shift_y_max_hr
            )));
        }
        if z.tl_letter_y_min_hr < 0.0 || z.tl_letter_y_min_hr >= z.tl_letter_y_max_hr {
            return Err(invalid(format!(
                "top-left letter corridor [{}, {}] h_ref is empty",
                z.tl_letter_y_min_hr, z.tl_letter_y_max_hr
            )));
        }
        if z.tab_ratio_min <= 0.0 {
            return Err(invalid("tab_ratio_min must be positive"));
        }
        if z.enter_y_tolerance_hr <= 0.0 {
            return Err(invalid("enter_y_tolerance_hr must be positive"));
        }

        let c = &self.classification;
        if c.threshold_shift_ratio_iso <= 0.0 {
            return Err(invalid("threshold_shift_ratio_iso must be positive"));
        }
        if c.threshold_enter_ratio_h_l_ansi > c.threshold_enter_ratio_h_l_iso {
            return Err(invalid(
                "threshold_enter_ratio_h_l_ansi must not exceed threshold_enter_ratio_h_l_iso",
            ));
        }
        if c.threshold_euler_mac >= c.threshold_euler_win {
            return Err(invalid(format!(
                "threshold_euler_mac ({}) must be below threshold_euler_win ({})",
                c.threshold_euler_mac, c.threshold_euler_win
            )));
        }
        if !(0.0..=1.0).contains(&c.threshold_tl_center_y_azerty)
            || !(0.0..=1.0).contains(&c.threshold_tl_extent_azerty)
        {
            return Err(invalid("top-left letter thresholds must lie in [0, 1]"));
        }

        let o = &self.ocr;
        if o.min_characters < 3 {
            return Err(invalid("min_characters must be at least 3 (one per row)"));
        }
        if o.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive"));
        }
        if o.weights.max_confidence < 0.0 {
            return Err(invalid("max_confidence must not be negative"));
        }

        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: DetectorConfig =
            serde_json::from_str(contents).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }
}

/// Loads configuration from `path`, or from `config.json` next to the
/// executable when no path is given. Falls back to defaults when the file is
/// missing or invalid.
pub fn load_config(path: Option<&Path>) -> DetectorConfig {
    let config_path: PathBuf = match path {
        Some(p) => p.to_path_buf(),
        None => crate::paths::get_default_config_path(),
    };

    tracing::info!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        tracing::info!("{} not found. Using default config.", config_path.display());
        return DetectorConfig::default();
    }

    match DetectorConfig::from_json_file(&config_path) {
        Ok(config) => {
            tracing::info!("Config loaded from {}", config_path.display());
            config
        }
        Err(e) => {
            tracing::warn!("{}. Using defaults.", e);
            DetectorConfig::default()
        }
    }
}
