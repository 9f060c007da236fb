//! Classification axes, the per-image verdict and its audit metrics.

pub mod geometry;

pub use geometry::{
    classify_geometry, decide_enter_shape, decide_form_factor, decide_layout, decide_platform,
    os_glyph_euler, GeometryClassification,
};

use serde::Serialize;
use std::collections::BTreeMap;

/// Physical form factor, decided from the left Shift key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FormFactor {
    #[serde(rename = "ISO")]
    Iso,
    #[serde(rename = "ANSI")]
    Ansi,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Target platform, decided from the OS key glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Platform {
    Mac,
    Windows,
    /// Glyph topology between the two thresholds
    #[serde(rename = "uncertain_lean_mac")]
    UncertainLeanMac,
    /// No OS key or no grayscale image to read it from
    #[serde(rename = "uncertain")]
    Uncertain,
}

/// Letter layout family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Layout {
    #[serde(rename = "AZERTY")]
    Azerty,
    #[serde(rename = "QWERTY")]
    Qwerty,
    #[serde(rename = "QWERTZ")]
    Qwertz,
    /// Geometry alone cannot separate these two
    #[serde(rename = "QWERTY/QWERTZ")]
    QwertyOrQwertz,
    #[serde(rename = "unknown")]
    Unknown,
}

impl FormFactor {
    pub fn is_definite(self) -> bool {
        self != FormFactor::Unknown
    }
}

impl Platform {
    pub fn is_definite(self) -> bool {
        matches!(self, Platform::Mac | Platform::Windows)
    }
}

impl Layout {
    pub fn is_definite(self) -> bool {
        self != Layout::Unknown
    }
}

impl std::fmt::Display for FormFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FormFactor::Iso => "ISO",
            FormFactor::Ansi => "ANSI",
            FormFactor::Unknown => "unknown",
        })
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Platform::Mac => "Mac",
            Platform::Windows => "Windows",
            Platform::UncertainLeanMac => "uncertain (lean Mac)",
            Platform::Uncertain => "uncertain",
        })
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Layout::Azerty => "AZERTY",
            Layout::Qwerty => "QWERTY",
            Layout::Qwertz => "QWERTZ",
            Layout::QwertyOrQwertz => "QWERTY/QWERTZ",
            Layout::Unknown => "unknown",
        })
    }
}

/// Which path produced the final layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSource {
    Geometry,
    Ocr,
}

/// Final answer for one image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Verdict {
    #[serde(rename = "ISO_ANSI")]
    pub form_factor: FormFactor,
    #[serde(rename = "MAC_WIN")]
    pub platform: Platform,
    #[serde(rename = "LAYOUT")]
    pub layout: Layout,
    /// Regional variant such as `QWERTY_UK`, when the OCR rows allowed one
    #[serde(rename = "VARIANT", skip_serializing_if = "Option::is_none")]
    pub variant: Option<&'static str>,
    pub layout_source: LayoutSource,
}

impl Verdict {
    pub fn unknown() -> Self {
        Self {
            form_factor: FormFactor::Unknown,
            platform: Platform::Uncertain,
            layout: Layout::Unknown,
            variant: None,
            layout_source: LayoutSource::Geometry,
        }
    }

    pub fn is_fully_definite(&self) -> bool {
        self.form_factor.is_definite() && self.platform.is_definite() && self.layout.is_definite()
    }
}

/// Every raw value a decision was taken from. Absent values mean the
/// landmark or input behind them was missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DiagnosticMetrics {
    pub h_ref: Option<f64>,
    pub landmarks_found: usize,
    /// Shift width / height
    pub shift_ratio: Option<f64>,
    /// Enter height / width
    pub enter_ratio_h_w: Option<f64>,
    /// Form factor suggested by the Enter shape, when outside the dead band
    pub enter_shape: Option<FormFactor>,
    /// Whether the Enter shape agrees with the Shift verdict
    pub enter_agrees: Option<bool>,
    pub os_euler: Option<i64>,
    /// Top-left letter centroid row normalized within its box
    pub tl_center_y: Option<f64>,
    pub tl_extent: Option<f64>,
    /// Top-left letter came from the north-west fallback
    pub tl_approximate: bool,
    pub tab_skipped: bool,
    /// Layout confidence of the OCR path, 0-100
    pub ocr_confidence: Option<f64>,
    pub ocr_characters: Option<usize>,
    pub variant_score: Option<f64>,
}

impl DiagnosticMetrics {
    /// Flattens the metrics into a name -> number map. Absent values are skipped;
    /// flags become 0.0 / 1.0.
    pub fn to_numeric_map(&self) -> BTreeMap<&'static str, f64> {
        let mut map = BTreeMap::new();
        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        map.insert("landmarks_found", self.landmarks_found as f64);
        map.insert("tl_approximate", flag(self.tl_approximate));
        map.insert("tab_skipped", flag(self.tab_skipped));

        let optional = [
            ("h_ref", self.h_ref),
            ("shift_ratio", self.shift_ratio),
            ("enter_ratio_h_w", self.enter_ratio_h_w),
            ("enter_agrees", self.enter_agrees.map(flag)),
            ("os_euler", self.os_euler.map(|e| e as f64)),
            ("tl_center_y", self.tl_center_y),
            ("tl_extent", self.tl_extent),
            ("ocr_confidence", self.ocr_confidence),
            ("ocr_characters", self.ocr_characters.map(|n| n as f64)),
            ("variant_score", self.variant_score),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                map.insert(name, v);
            }
        }
        map
    }
}
