//! Shape descriptors for key regions and key glyphs.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use std::collections::BTreeMap;

use super::BoundingBox;

/// Paints `(row, col)` pixels into a mask the size of `bbox` (255 = foreground).
pub fn rasterize(pixels: &[(u32, u32)], bbox: &BoundingBox) -> GrayImage {
    let mut mask = GrayImage::new(bbox.width(), bbox.height());
    for &(r, c) in pixels {
        mask.put_pixel(c - bbox.min_col, r - bbox.min_row, Luma([255]));
    }
    mask
}

/// Euler number (components minus holes) of the non-zero pixels of `mask`,
/// with 8-connected foreground and 4-connected background.
///
/// Counts 2x2 bit-quads over the zero-padded image:
/// E = (Q1 - Q3 - 2 * QD) / 4
pub fn euler_number(mask: &GrayImage) -> i64 {
    let (w, h) = mask.dimensions();
    let (w, h) = (w as i64, h as i64);
    let at = |x: i64, y: i64| -> u8 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0
        } else {
            (mask.get_pixel(x as u32, y as u32)[0] > 0) as u8
        }
    };

    let (mut q1, mut q3, mut qd) = (0i64, 0i64, 0i64);
    for y in -1..h {
        for x in -1..w {
            let a = at(x, y);
            let b = at(x + 1, y);
            let c = at(x, y + 1);
            let d = at(x + 1, y + 1);
            match a + b + c + d {
                1 => q1 += 1,
                3 => q3 += 1,
                // Two set pixels on a diagonal: either a and d, or b and c
                2 if a == d => qd += 1,
                _ => {}
            }
        }
    }

    (q1 - q3 - 2 * qd) / 4
}

/// Area of the convex hull of a pixel set, treating every pixel as a unit square.
pub fn convex_hull_area(pixels: &[(u32, u32)]) -> f64 {
    // Only the leftmost and rightmost pixel of each row can touch the hull
    let mut row_extremes: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
    for &(r, c) in pixels {
        row_extremes
            .entry(r)
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(c);
                *hi = (*hi).max(c);
            })
            .or_insert((c, c));
    }

    let mut corners: Vec<Point<i64>> = Vec::with_capacity(row_extremes.len() * 4);
    for (&r, &(lo, hi)) in &row_extremes {
        let (r, lo, hi) = (r as i64, lo as i64, hi as i64 + 1);
        corners.push(Point::new(lo, r));
        corners.push(Point::new(lo, r + 1));
        corners.push(Point::new(hi, r));
        corners.push(Point::new(hi, r + 1));
    }

    let hull = convex_hull(corners.as_slice());
    polygon_area(&hull)
}

/// Shoelace area of a simple polygon.
fn polygon_area(vertices: &[Point<i64>]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let twice: i64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(p, q)| p.x * q.y - q.x * p.y)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Crops the bounding box out of a grayscale image, clamped to its bounds.
pub fn crop(gray: &GrayImage, bbox: &BoundingBox) -> GrayImage {
    let (w, h) = gray.dimensions();
    let x0 = bbox.min_col.min(w);
    let y0 = bbox.min_row.min(h);
    let cw = bbox.width().min(w - x0);
    let ch = bbox.height().min(h - y0);
    image::imageops::crop_imm(gray, x0, y0, cw, ch).to_image()
}

/// Re-thresholds a key crop with its own Otsu level and keeps the dark class
/// (the printed glyph) as foreground.
///
/// A crop with a single gray level has no glyph and yields an empty mask.
pub fn binarize_glyph(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if w == 0 || h == 0 || lo == hi {
        return GrayImage::new(w, h);
    }

    // Otsu puts pixels <= level in the dark class
    let level = otsu_level(gray);
    GrayImage::from_fn(w, h, |x, y| {
        if gray.get_pixel(x, y)[0] <= level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> GrayImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        GrayImage::from_fn(w, h, |x, y| {
            if rows[y as usize].as_bytes()[x as usize] == b'#' {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_euler_single_blob() {
        let mask = mask_from_rows(&["....", ".##.", ".##.", "...."]);
        assert_eq!(euler_number(&mask), 1);
    }

    #[test]
    fn test_euler_diagonal_pixels_are_connected() {
        let mask = mask_from_rows(&["#.", ".#"]);
        assert_eq!(euler_number(&mask), 1);
    }

    #[test]
    fn test_euler_ring() {
        let mask = mask_from_rows(&["###", "#.#", "###"]);
        assert_eq!(euler_number(&mask), 0);
    }

    #[test]
    fn test_euler_three_holes() {
        let mask = mask_from_rows(&[
            "#########",
            "#.#.#.###",
            "#########",
        ]);
        assert_eq!(euler_number(&mask), -2);
    }

    #[test]
    fn test_euler_four_separate_squares() {
        let mask = mask_from_rows(&[
            "##..##",
            "##..##",
            "......",
            "##..##",
            "##..##",
        ]);
        assert_eq!(euler_number(&mask), 4);
    }

    #[test]
    fn test_euler_empty() {
        assert_eq!(euler_number(&GrayImage::new(5, 5)), 0);
        assert_eq!(euler_number(&GrayImage::new(0, 0)), 0);
    }

    #[test]
    fn test_hull_area_rectangle() {
        let pixels: Vec<(u32, u32)> = (0..4).flat_map(|r| (0..6).map(move |c| (r, c))).collect();
        assert!((convex_hull_area(&pixels) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_hull_area_single_pixel() {
        assert!((convex_hull_area(&[(3, 7)]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_crop_clamps() {
        let gray = GrayImage::from_fn(20, 10, |x, y| Luma([(x + y) as u8]));
        let bbox = BoundingBox { min_row: 5, min_col: 15, max_row: 15, max_col: 30 };
        let cropped = crop(&gray, &bbox);
        assert_eq!(cropped.dimensions(), (5, 5));
        assert_eq!(cropped.get_pixel(0, 0)[0], 20);
    }

    #[test]
    fn test_binarize_glyph_keeps_dark_pixels() {
        let mut gray = GrayImage::from_pixel(10, 10, Luma([220]));
        gray.put_pixel(4, 4, Luma([30]));
        gray.put_pixel(5, 4, Luma([30]));
        let glyph = binarize_glyph(&gray);
        assert_eq!(glyph.get_pixel(4, 4)[0], 255);
        assert_eq!(glyph.get_pixel(5, 4)[0], 255);
        assert_eq!(glyph.get_pixel(0, 0)[0], 0);
        assert_eq!(euler_number(&glyph), 1);
    }

    #[test]
    fn test_binarize_uniform_crop_is_empty() {
        let gray = GrayImage::from_pixel(8, 8, Luma([128]));
        let glyph = binarize_glyph(&gray);
        assert!(glyph.pixels().all(|p| p[0] == 0));
    }
}
