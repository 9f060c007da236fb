//! Region extraction: connected components of the key mask, filtered by size,
//! shape and vertical proximity to the keyboard body.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::{BoundingBox, KeyRegion};
use crate::config::ExtractionConfig;
use crate::error::{DetectError, Result};

/// Why candidate components were dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Connected components found in the mask
    pub components: usize,
    pub rejected_area: usize,
    pub rejected_ratio: usize,
    /// Below the solidity or extent floor
    pub rejected_quality: usize,
    /// Too far from the mean key row (trackpad, palm rest)
    pub rejected_spatial: usize,
}

/// Output of the region extractor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Extraction {
    pub regions: Vec<KeyRegion>,
    /// Mean centroid row of the size-filtered candidates (0.0 when there were none)
    pub mean_row: f64,
    /// Accepted centroid row band, for visualization only
    pub y_min: f64,
    pub y_max: f64,
    pub stats: ExtractionStats,
}

impl Extraction {
    fn empty(stats: ExtractionStats) -> Self {
        Self {
            regions: Vec::new(),
            mean_row: 0.0,
            y_min: 0.0,
            y_max: 0.0,
            stats,
        }
    }
}

/// Extracts candidate key regions from a binary mask.
///
/// Non-zero pixels are key material. Components are 8-connected. Regions are
/// returned in label order (raster order of their first pixel), so repeated
/// runs on the same mask give identical output.
pub fn extract_regions(mask: &GrayImage, config: &ExtractionConfig) -> Result<Extraction> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::EmptyImage { width, height });
    }

    // Labelling groups equal pixel values, so collapse the mask to two levels first
    let binary = GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut components: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        if label[0] == 0 {
            continue;
        }
        components.entry(label[0]).or_default().push((y, x));
    }

    let mut stats = ExtractionStats {
        components: components.len(),
        ..Default::default()
    };

    let mut candidates = Vec::new();
    for pixels in components.values() {
        let Some(bbox) = BoundingBox::enclosing(pixels) else {
            continue;
        };
        if bbox.height() == 0 {
            continue;
        }

        let area = pixels.len() as u64;
        if area < config.area_min as u64 || area > config.area_max as u64 {
            stats.rejected_area += 1;
            continue;
        }

        let ratio = bbox.width() as f64 / bbox.height() as f64;
        if ratio < config.ratio_min || ratio > config.ratio_max {
            stats.rejected_ratio += 1;
            continue;
        }

        let Some(region) = KeyRegion::from_pixels(pixels) else {
            continue;
        };
        if region.solidity < config.solidity_min || region.extent < config.extent_min {
            stats.rejected_quality += 1;
            continue;
        }

        candidates.push(region);
    }

    if candidates.is_empty() {
        debug!(
            "No candidate regions among {} components (area: {}, ratio: {}, quality: {})",
            stats.components, stats.rejected_area, stats.rejected_ratio, stats.rejected_quality
        );
        return Ok(Extraction::empty(stats));
    }

    let mean_row =
        candidates.iter().map(|r| r.center_row()).sum::<f64>() / candidates.len() as f64;
    let y_min = mean_row - config.y_proximity_threshold;
    let y_max = mean_row + config.y_proximity_threshold;

    let before = candidates.len();
    candidates.retain(|r| (y_min..=y_max).contains(&r.center_row()));
    stats.rejected_spatial = before - candidates.len();

    debug!(
        "Extracted {} regions from {} components (mean row {:.1}, band [{:.1}, {:.1}], rejected area/ratio/quality/spatial: {}/{}/{}/{})",
        candidates.len(),
        stats.components,
        mean_row,
        y_min,
        y_max,
        stats.rejected_area,
        stats.rejected_ratio,
        stats.rejected_quality,
        stats.rejected_spatial
    );

    Ok(Extraction {
        regions: candidates,
        mean_row,
        y_min,
        y_max,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draw_rect, fill_rect, synthetic_keyboard};

    fn small_config() -> ExtractionConfig {
        ExtractionConfig {
            area_min: 20,
            area_max: 10_000,
            y_proximity_threshold: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_dimension_mask_is_error() {
        let mask = GrayImage::new(0, 10);
        let result = extract_regions(&mask, &ExtractionConfig::default());
        assert!(matches!(result, Err(DetectError::EmptyImage { .. })));
    }

    #[test]
    fn test_empty_mask_gives_sentinel_statistics() {
        let mask = GrayImage::new(50, 50);
        let extraction = extract_regions(&mask, &ExtractionConfig::default()).unwrap();
        assert!(extraction.regions.is_empty());
        assert_eq!(extraction.mean_row, 0.0);
        assert_eq!(extraction.y_min, 0.0);
        assert_eq!(extraction.y_max, 0.0);
        assert_eq!(extraction.stats.components, 0);
    }

    #[test]
    fn test_area_and_ratio_filters() {
        let mut mask = GrayImage::new(200, 60);
        draw_rect(&mut mask, 10, 10, 10, 10); // 100 px, kept
        draw_rect(&mut mask, 10, 30, 2, 2); // 4 px, too small
        draw_rect(&mut mask, 30, 10, 3, 60); // ratio 20, too wide
        let extraction = extract_regions(&mask, &small_config()).unwrap();
        assert_eq!(extraction.regions.len(), 1);
        assert_eq!(extraction.stats.components, 3);
        assert_eq!(extraction.stats.rejected_area, 1);
        assert_eq!(extraction.stats.rejected_ratio, 1);
    }

    #[test]
    fn test_diagonal_pixels_join_one_component() {
        let mut mask = GrayImage::new(20, 20);
        draw_rect(&mut mask, 0, 0, 5, 5);
        draw_rect(&mut mask, 5, 5, 5, 5);
        let config = ExtractionConfig { area_min: 1, ..small_config() };
        let extraction = extract_regions(&mask, &config).unwrap();
        assert_eq!(extraction.regions.len(), 1);
        assert_eq!(extraction.regions[0].area, 50);
    }

    #[test]
    fn test_spatial_filter_drops_far_region() {
        let mut mask = GrayImage::new(100, 1000);
        for i in 0..5 {
            draw_rect(&mut mask, 100, 5 + i * 15, 10, 10);
        }
        // Trackpad-like outlier far below the keys
        draw_rect(&mut mask, 900, 10, 10, 10);
        let config = ExtractionConfig { y_proximity_threshold: 300.0, ..small_config() };
        let extraction = extract_regions(&mask, &config).unwrap();
        assert_eq!(extraction.regions.len(), 5);
        assert_eq!(extraction.stats.rejected_spatial, 1);
        assert!(extraction.regions.iter().all(|r| r.center_row() < 200.0));
        assert!(extraction.y_min < extraction.mean_row && extraction.mean_row < extraction.y_max);
    }

    #[test]
    fn test_quality_floor() {
        let mut mask = GrayImage::new(60, 60);
        draw_rect(&mut mask, 5, 5, 10, 10);
        // Hollow square: low extent
        draw_rect(&mut mask, 30, 30, 20, 20);
        fill_rect(&mut mask, 32, 32, 16, 16, 0);
        let config = ExtractionConfig { extent_min: 0.5, ..small_config() };
        let extraction = extract_regions(&mask, &config).unwrap();
        assert_eq!(extraction.regions.len(), 1);
        assert_eq!(extraction.stats.rejected_quality, 1);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let keyboard = synthetic_keyboard();
        let config = ExtractionConfig::default();
        let first = extract_regions(&keyboard.mask, &config).unwrap();
        let second = extract_regions(&keyboard.mask, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.regions.len(), 40);
    }
}
