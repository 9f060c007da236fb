//! Per-region feature records and heuristic shape hints, used when inspecting
//! a mask key by key.

use serde::Serialize;

use super::KeyRegion;
use crate::config::ClassificationConfig;

/// Regions above this area are probably the space bar
const SPACE_AREA_MIN: u64 = 50_000;
/// Regions wider than this (w/h) are probably the space bar
const SPACE_RATIO_MIN: f64 = 4.0;
/// Shift-like width/height range
const SHIFT_RATIO_MIN: f64 = 1.3;
const SHIFT_RATIO_MAX: f64 = 4.0;
/// Near-square range of standard letter keys
const STANDARD_RATIO_MIN: f64 = 0.7;
const STANDARD_RATIO_MAX: f64 = 1.3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionFeatures {
    pub center_row: f64,
    pub center_col: f64,
    pub width: u32,
    pub height: u32,
    pub area: u64,
    /// width / height
    pub ratio_w_h: f64,
    /// height / width
    pub ratio_h_w: f64,
    pub extent: f64,
    pub solidity: f64,
    pub euler_number: i64,
    /// Centroid row within the box, 0.0 top to 1.0 bottom
    pub centroid_norm: f64,
}

impl RegionFeatures {
    pub fn from_region(region: &KeyRegion) -> Self {
        let (width, height) = (region.width(), region.height());
        Self {
            center_row: region.center_row(),
            center_col: region.center_col(),
            width,
            height,
            area: region.area,
            ratio_w_h: region.aspect_ratio(),
            ratio_h_w: if width > 0 {
                height as f64 / width as f64
            } else {
                0.0
            },
            extent: region.extent,
            solidity: region.solidity,
            euler_number: region.euler_number,
            centroid_norm: region.normalized_center_row(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeHint {
    LikelySpace,
    IsoShift,
    AnsiShift,
    StandardKey,
    IsoEnter,
    AnsiEnter,
    CommandGlyph,
    WindowsGlyph,
    AzertyLetter,
    QwertyLetter,
}

/// Lists every landmark role the features are compatible with.
///
/// Hints are independent guesses for a human reading the output; zoning does
/// not use them.
pub fn diagnose(features: &RegionFeatures, config: &ClassificationConfig) -> Vec<ShapeHint> {
    let mut hints = Vec::new();

    if features.area > SPACE_AREA_MIN || features.ratio_w_h > SPACE_RATIO_MIN {
        hints.push(ShapeHint::LikelySpace);
    } else if features.ratio_w_h > SHIFT_RATIO_MIN && features.ratio_w_h < SHIFT_RATIO_MAX {
        if features.ratio_w_h < config.threshold_shift_ratio_iso {
            hints.push(ShapeHint::IsoShift);
        } else {
            hints.push(ShapeHint::AnsiShift);
        }
    } else if features.ratio_w_h > STANDARD_RATIO_MIN && features.ratio_w_h < STANDARD_RATIO_MAX {
        hints.push(ShapeHint::StandardKey);
    }

    if features.ratio_h_w > config.threshold_enter_ratio_h_l_iso {
        hints.push(ShapeHint::IsoEnter);
    } else if features.ratio_h_w < config.threshold_enter_ratio_h_l_ansi {
        hints.push(ShapeHint::AnsiEnter);
    }

    if features.euler_number <= config.threshold_euler_mac {
        hints.push(ShapeHint::CommandGlyph);
    } else if features.euler_number >= config.threshold_euler_win {
        hints.push(ShapeHint::WindowsGlyph);
    }

    if features.centroid_norm > config.threshold_tl_center_y_azerty {
        if features.extent < config.threshold_tl_extent_azerty {
            hints.push(ShapeHint::AzertyLetter);
        } else {
            hints.push(ShapeHint::QwertyLetter);
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rect_region;

    #[test]
    fn test_features_of_rectangle() {
        let features = RegionFeatures::from_region(&rect_region(100, 40, 50, 100));
        assert_eq!(features.width, 100);
        assert_eq!(features.height, 50);
        assert!((features.ratio_w_h - 2.0).abs() < 1e-9);
        assert!((features.ratio_h_w - 0.5).abs() < 1e-9);
        assert!((features.centroid_norm - 0.49).abs() < 1e-9);
    }

    #[test]
    fn test_space_bar_hint() {
        let config = ClassificationConfig::default();
        let features = RegionFeatures::from_region(&rect_region(0, 0, 50, 300));
        assert!(diagnose(&features, &config).contains(&ShapeHint::LikelySpace));
    }

    #[test]
    fn test_shift_hints() {
        let config = ClassificationConfig::default();
        let iso = RegionFeatures::from_region(&rect_region(0, 0, 50, 90));
        let ansi = RegionFeatures::from_region(&rect_region(0, 0, 50, 115));
        assert!(diagnose(&iso, &config).contains(&ShapeHint::IsoShift));
        assert!(diagnose(&ansi, &config).contains(&ShapeHint::AnsiShift));
    }

    #[test]
    fn test_enter_hints() {
        let config = ClassificationConfig::default();
        let tall = RegionFeatures::from_region(&rect_region(0, 0, 110, 75));
        let wide = RegionFeatures::from_region(&rect_region(0, 0, 50, 110));
        assert!(diagnose(&tall, &config).contains(&ShapeHint::IsoEnter));
        assert!(diagnose(&wide, &config).contains(&ShapeHint::AnsiEnter));
    }

    #[test]
    fn test_glyph_hints() {
        let config = ClassificationConfig::default();
        let mut features = RegionFeatures::from_region(&rect_region(0, 0, 50, 50));
        features.euler_number = -3;
        assert!(diagnose(&features, &config).contains(&ShapeHint::CommandGlyph));
        features.euler_number = 4;
        assert!(diagnose(&features, &config).contains(&ShapeHint::WindowsGlyph));
    }

    #[test]
    fn test_letter_hints() {
        let config = ClassificationConfig::default();
        let mut features = RegionFeatures::from_region(&rect_region(0, 0, 50, 50));
        features.centroid_norm = 0.6;
        features.extent = 0.7;
        assert!(diagnose(&features, &config).contains(&ShapeHint::AzertyLetter));
        features.extent = 0.95;
        assert!(diagnose(&features, &config).contains(&ShapeHint::QwertyLetter));
    }
}
