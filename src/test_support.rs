//! Synthetic masks and regions shared by the unit tests.

use image::{GrayImage, Luma};

use crate::region::{BoundingBox, KeyRegion};

/// Sets a rectangle of `img` to `value`, clipped to the image.
pub fn fill_rect(img: &mut GrayImage, min_row: u32, min_col: u32, height: u32, width: u32, value: u8) {
    let (w, h) = img.dimensions();
    for y in min_row..(min_row + height).min(h) {
        for x in min_col..(min_col + width).min(w) {
            img.put_pixel(x, y, Luma([value]));
        }
    }
}

/// Marks a rectangle of `img` as key material.
pub fn draw_rect(img: &mut GrayImage, min_row: u32, min_col: u32, height: u32, width: u32) {
    fill_rect(img, min_row, min_col, height, width, 255);
}

/// A solid rectangular region with the descriptors extraction would compute.
pub fn rect_region(min_row: u32, min_col: u32, height: u32, width: u32) -> KeyRegion {
    KeyRegion {
        bbox: BoundingBox {
            min_row,
            min_col,
            max_row: min_row + height,
            max_col: min_col + width,
        },
        area: height as u64 * width as u64,
        centroid: (
            min_row as f64 + (height as f64 - 1.0) / 2.0,
            min_col as f64 + (width as f64 - 1.0) / 2.0,
        ),
        extent: 1.0,
        solidity: 1.0,
        euler_number: 1,
    }
}

/// Glyph printed on the OS key of the synthetic grayscale image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OsGlyph {
    /// Four separate squares, Euler number 4
    Windows,
    /// One bar with three holes, Euler number -2
    Command,
}

pub struct SyntheticKey {
    pub name: &'static str,
    pub bbox: BoundingBox,
}

pub struct SyntheticKeyboard {
    pub mask: GrayImage,
    pub gray: GrayImage,
    pub keys: Vec<SyntheticKey>,
}

impl SyntheticKeyboard {
    pub fn key(&self, name: &str) -> BoundingBox {
        self.keys
            .iter()
            .find(|k| k.name == name)
            .map(|k| k.bbox)
            .unwrap_or_else(|| panic!("no synthetic key named {name}"))
    }
}

pub const KEY_HEIGHT: u32 = 50;
const ROW_TOPS: [u32; 4] = [400, 340, 280, 220];

/// 40-key ANSI-shaped keyboard, four rows, 50 px keys with 10 px gaps.
///
/// Row 0 (space row) to row 3 (Tab/Q row) sit 60 px apart, i.e. 1.2 key
/// heights. The key left of the space bar carries a Windows glyph.
pub fn synthetic_keyboard() -> SyntheticKeyboard {
    synthetic_keyboard_with_glyph(OsGlyph::Windows)
}

pub fn synthetic_keyboard_with_glyph(glyph: OsGlyph) -> SyntheticKeyboard {
    let mut keys: Vec<SyntheticKey> = Vec::new();
    let mut add = |name: &'static str, row: usize, min_col: u32, width: u32| {
        keys.push(SyntheticKey {
            name,
            bbox: BoundingBox {
                min_row: ROW_TOPS[row],
                min_col,
                max_row: ROW_TOPS[row] + KEY_HEIGHT,
                max_col: min_col + width,
            },
        });
    };

    const Q_ROW: [&str; 10] = ["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P"];
    const A_ROW: [&str; 9] = ["A", "S", "D", "F", "G", "H", "J", "K", "L"];
    const Z_ROW: [&str; 8] = ["Z", "X", "C", "V", "B", "N", "M", ","];

    add("tab", 3, 100, 80);
    for (i, &name) in Q_ROW.iter().enumerate() {
        add(name, 3, 190 + 60 * i as u32, 50);
    }

    add("caps", 2, 100, 95);
    for (i, &name) in A_ROW.iter().enumerate() {
        add(name, 2, 205 + 60 * i as u32, 50);
    }
    add("enter", 2, 745, 110);

    add("lshift", 1, 100, 115);
    for (i, &name) in Z_ROW.iter().enumerate() {
        add(name, 1, 225 + 60 * i as u32, 50);
    }
    add("rshift", 1, 705, 110);

    add("fn", 0, 100, 50);
    add("lctrl", 0, 160, 60);
    add("lalt", 0, 230, 60);
    add("os", 0, 300, 70);
    add("space", 0, 380, 300);
    add("ros", 0, 690, 70);
    add("ralt", 0, 770, 60);
    add("left", 0, 840, 50);

    let mut mask = GrayImage::new(950, 500);
    let mut gray = GrayImage::from_pixel(950, 500, Luma([40]));
    for key in &keys {
        let b = key.bbox;
        draw_rect(&mut mask, b.min_row, b.min_col, b.height(), b.width());
        fill_rect(&mut gray, b.min_row, b.min_col, b.height(), b.width(), 220);
    }

    let os = keys
        .iter()
        .find(|k| k.name == "os")
        .map(|k| k.bbox)
        .unwrap_or_else(|| panic!("os key missing"));
    draw_glyph(&mut gray, os.min_row, os.min_col, glyph);

    SyntheticKeyboard { mask, gray, keys }
}

/// Draws an OS glyph in dark ink relative to the key's top-left corner.
pub fn draw_glyph(gray: &mut GrayImage, top: u32, left: u32, glyph: OsGlyph) {
    match glyph {
        OsGlyph::Windows => {
            for (dr, dc) in [(13, 21), (13, 33), (25, 21), (25, 33)] {
                fill_rect(gray, top + dr, left + dc, 8, 8, 30);
            }
        }
        OsGlyph::Command => {
            fill_rect(gray, top + 18, left + 20, 14, 30, 30);
            for dc in [24, 33, 42] {
                fill_rect(gray, top + 23, left + dc, 4, 4, 220);
            }
        }
    }
}
