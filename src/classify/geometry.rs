//! Geometric classifier: ISO/ANSI from the Shift key, Mac/Windows from the OS
//! key glyph, AZERTY vs QWERTY/QWERTZ from the top-left letter.
//!
//! Each axis is decided on its own and degrades to unknown/uncertain when its
//! landmark is missing.

use image::GrayImage;
use tracing::debug;

use super::{DiagnosticMetrics, FormFactor, Layout, LayoutSource, Platform, Verdict};
use crate::config::ClassificationConfig;
use crate::region::shape::{binarize_glyph, crop, euler_number};
use crate::region::BoundingBox;
use crate::zoning::LandmarkMap;

/// Shift width/height below the ISO threshold means the short ISO Shift.
pub fn decide_form_factor(shift_ratio: f64, config: &ClassificationConfig) -> FormFactor {
    if shift_ratio < config.threshold_shift_ratio_iso {
        FormFactor::Iso
    } else {
        FormFactor::Ansi
    }
}

/// Form factor suggested by the Enter key's height/width, or None inside the
/// band between the two thresholds.
pub fn decide_enter_shape(ratio_h_w: f64, config: &ClassificationConfig) -> Option<FormFactor> {
    if ratio_h_w > config.threshold_enter_ratio_h_l_iso {
        Some(FormFactor::Iso)
    } else if ratio_h_w < config.threshold_enter_ratio_h_l_ansi {
        Some(FormFactor::Ansi)
    } else {
        None
    }
}

pub fn decide_platform(euler: i64, config: &ClassificationConfig) -> Platform {
    if euler <= config.threshold_euler_mac {
        Platform::Mac
    } else if euler >= config.threshold_euler_win {
        Platform::Windows
    } else {
        Platform::UncertainLeanMac
    }
}

/// The AZERTY "A" sits lower in its cell and fills less of it than the QWERTY "Q".
pub fn decide_layout(tl_center_y: f64, tl_extent: f64, config: &ClassificationConfig) -> Layout {
    if tl_center_y > config.threshold_tl_center_y_azerty
        && tl_extent < config.threshold_tl_extent_azerty
    {
        Layout::Azerty
    } else {
        Layout::QwertyOrQwertz
    }
}

/// Euler number of the glyph printed inside `bbox`, re-binarized locally.
pub fn os_glyph_euler(gray: &GrayImage, bbox: &BoundingBox) -> i64 {
    let key = crop(gray, bbox);
    euler_number(&binarize_glyph(&key))
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeometryClassification {
    pub verdict: Verdict,
    pub metrics: DiagnosticMetrics,
}

/// Classifies all three axes from the landmark map.
///
/// `gray` is only needed for the OS glyph; without it the platform axis is
/// uncertain.
pub fn classify_geometry(
    map: &LandmarkMap,
    gray: Option<&GrayImage>,
    config: &ClassificationConfig,
) -> GeometryClassification {
    let mut metrics = DiagnosticMetrics {
        h_ref: Some(map.h_ref),
        landmarks_found: map.found_count(),
        tl_approximate: map.tl_letter_approximate,
        tab_skipped: map.tab_skipped,
        ..Default::default()
    };

    let form_factor = match &map.shift {
        Some(shift) => {
            let ratio = shift.aspect_ratio();
            metrics.shift_ratio = Some(ratio);
            decide_form_factor(ratio, config)
        }
        None => FormFactor::Unknown,
    };

    // Enter shape is recorded but never overrides the Shift verdict
    if let Some(enter) = &map.enter_key {
        let ratio_h_w = enter.height() as f64 / enter.width().max(1) as f64;
        metrics.enter_ratio_h_w = Some(ratio_h_w);
        metrics.enter_shape = decide_enter_shape(ratio_h_w, config);
        if let Some(shape) = metrics.enter_shape {
            if form_factor.is_definite() {
                metrics.enter_agrees = Some(shape == form_factor);
            }
        }
    }

    let platform = match (&map.os_key, gray) {
        (Some(os), Some(gray)) => {
            let euler = os_glyph_euler(gray, &os.bbox);
            metrics.os_euler = Some(euler);
            decide_platform(euler, config)
        }
        _ => Platform::Uncertain,
    };

    let layout = match &map.tl_letter {
        Some(letter) => {
            let center_y = letter.normalized_center_row();
            metrics.tl_center_y = Some(center_y);
            metrics.tl_extent = Some(letter.extent);
            decide_layout(center_y, letter.extent, config)
        }
        None => Layout::Unknown,
    };

    debug!(
        "Geometry: {} (shift ratio {:?}), {} (euler {:?}), {} (tl cy {:?}, extent {:?})",
        form_factor,
        metrics.shift_ratio,
        platform,
        metrics.os_euler,
        layout,
        metrics.tl_center_y,
        metrics.tl_extent
    );

    GeometryClassification {
        verdict: Verdict {
            form_factor,
            platform,
            layout,
            variant: None,
            layout_source: LayoutSource::Geometry,
        },
        metrics,
    }
}
