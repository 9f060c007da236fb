//! Candidate key regions extracted from a binary key mask.
//!
//! This module provides:
//! - `KeyRegion`, the per-component shape record used by zoning and classification
//! - Connected-component extraction with dimensional and spatial filtering
//! - Shape descriptors (Euler number, convex hull area, local Otsu glyph)
//! - Per-region diagnostic features and heuristic shape hints

pub mod extract;
pub mod features;
pub mod shape;

pub use extract::{extract_regions, Extraction, ExtractionStats};
pub use features::{diagnose, RegionFeatures, ShapeHint};

use serde::Serialize;

/// Axis-aligned bounding box in (row, col) coordinates.
///
/// `max_row` and `max_col` are exclusive, so `height()` and `width()` are
/// pixel counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

impl BoundingBox {
    /// Smallest box containing every `(row, col)` pixel. Returns None for an empty set.
    pub fn enclosing(pixels: &[(u32, u32)]) -> Option<Self> {
        let (&(r0, c0), rest) = pixels.split_first()?;
        let mut bbox = BoundingBox {
            min_row: r0,
            min_col: c0,
            max_row: r0 + 1,
            max_col: c0 + 1,
        };
        for &(r, c) in rest {
            bbox.min_row = bbox.min_row.min(r);
            bbox.min_col = bbox.min_col.min(c);
            bbox.max_row = bbox.max_row.max(r + 1);
            bbox.max_col = bbox.max_col.max(c + 1);
        }
        Some(bbox)
    }

    pub fn height(&self) -> u32 {
        self.max_row - self.min_row
    }

    pub fn width(&self) -> u32 {
        self.max_col - self.min_col
    }

    pub fn area(&self) -> u64 {
        self.height() as u64 * self.width() as u64
    }
}

/// A candidate key: one connected component of key material.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyRegion {
    pub bbox: BoundingBox,
    /// Pixel count
    pub area: u64,
    /// Centroid as (row, col)
    pub centroid: (f64, f64),
    /// area / bounding box area
    pub extent: f64,
    /// area / convex hull area
    pub solidity: f64,
    /// Components minus holes, 8-connected foreground
    pub euler_number: i64,
}

impl KeyRegion {
    /// Builds the full shape record of a component from its `(row, col)` pixels.
    pub fn from_pixels(pixels: &[(u32, u32)]) -> Option<Self> {
        let bbox = BoundingBox::enclosing(pixels)?;
        let area = pixels.len() as u64;

        let (sum_row, sum_col) = pixels.iter().fold((0u64, 0u64), |(sr, sc), &(r, c)| {
            (sr + r as u64, sc + c as u64)
        });
        let centroid = (sum_row as f64 / area as f64, sum_col as f64 / area as f64);

        let extent = area as f64 / bbox.area() as f64;

        let hull_area = shape::convex_hull_area(pixels);
        let solidity = if hull_area > 0.0 {
            (area as f64 / hull_area).min(1.0)
        } else {
            1.0
        };

        let euler_number = shape::euler_number(&shape::rasterize(pixels, &bbox));

        Some(KeyRegion {
            bbox,
            area,
            centroid,
            extent,
            solidity,
            euler_number,
        })
    }

    pub fn height(&self) -> u32 {
        self.bbox.height()
    }

    pub fn width(&self) -> u32 {
        self.bbox.width()
    }

    pub fn center_row(&self) -> f64 {
        self.centroid.0
    }

    pub fn center_col(&self) -> f64 {
        self.centroid.1
    }

    /// Width over height. Zero-height boxes report 0.0.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height() == 0 {
            0.0
        } else {
            self.width() as f64 / self.height() as f64
        }
    }

    /// Centroid row relative to the box: 0.0 at the top edge, 1.0 at the bottom.
    pub fn normalized_center_row(&self) -> f64 {
        if self.height() == 0 {
            return 0.0;
        }
        (self.centroid.0 - self.bbox.min_row as f64) / self.height() as f64
    }
}
