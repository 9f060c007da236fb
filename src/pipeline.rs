//! One-image analysis: extraction, zoning, geometric classification and the
//! optional OCR override, collected into a single report.

use image::GrayImage;
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{classify_geometry, DiagnosticMetrics, LayoutSource, Verdict};
use crate::config::DetectorConfig;
use crate::error::{DetectError, Result};
use crate::ocr::{classify_detections, refine_variant, OcrAnalysis, OcrDetection, OcrOutcome, VariantMatch};
use crate::region::{extract_regions, ExtractionStats};
use crate::zoning::{locate_landmarks, Landmark, LandmarkMap};

/// Classification axis of the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    FormFactor,
    Platform,
    Layout,
}

/// A recoverable shortfall in the input. Issues never abort the analysis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    InsufficientRegions { found: usize, required: usize },
    MissingLandmark { landmark: Landmark },
    /// The axis could not be resolved and is reported as unknown/uncertain
    Ambiguous { axis: Axis },
    OcrInputInvalid { distinct: usize, required: usize },
    /// Found by a fallback rather than its corridor
    ApproximateLandmark { landmark: Landmark },
}

/// Everything one analysis consumes. Only the mask is required.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisInput<'a> {
    /// Binary key mask, non-zero = key material
    pub mask: &'a GrayImage,
    /// Grayscale image of the same size, for the OS key glyph
    pub gray: Option<&'a GrayImage>,
    /// Raw OCR detections of the same image
    pub ocr: Option<&'a [OcrDetection]>,
}

impl<'a> AnalysisInput<'a> {
    pub fn new(mask: &'a GrayImage) -> Self {
        Self { mask, gray: None, ocr: None }
    }

    pub fn with_gray(mut self, gray: &'a GrayImage) -> Self {
        self.gray = Some(gray);
        self
    }

    pub fn with_ocr(mut self, detections: &'a [OcrDetection]) -> Self {
        self.ocr = Some(detections);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub verdict: Verdict,
    pub metrics: DiagnosticMetrics,
    pub issues: Vec<Issue>,
    pub region_count: usize,
    pub extraction: ExtractionStats,
    pub landmarks: Option<LandmarkMap>,
    pub ocr: Option<OcrAnalysis>,
    pub variant: Option<VariantMatch>,
}

/// Runs the full analysis of one image.
///
/// Errors only on contract violations (zero-size mask, grayscale of another
/// size). Missing signal is reported through `issues` and
/// unknown/uncertain axes.
pub fn analyze(input: &AnalysisInput<'_>, config: &DetectorConfig) -> Result<AnalysisReport> {
    let mask = input.mask;
    if let Some(gray) = input.gray {
        if gray.dimensions() != mask.dimensions() {
            return Err(DetectError::DimensionMismatch {
                mask_width: mask.width(),
                mask_height: mask.height(),
                gray_width: gray.width(),
                gray_height: gray.height(),
            });
        }
    }

    let extraction = extract_regions(mask, &config.extraction)?;
    let mut issues = Vec::new();

    let region_count = extraction.regions.len();
    let landmarks = if region_count < config.extraction.min_regions {
        warn!(
            "Only {} regions extracted ({} required), skipping geometry",
            region_count, config.extraction.min_regions
        );
        issues.push(Issue::InsufficientRegions {
            found: region_count,
            required: config.extraction.min_regions,
        });
        None
    } else {
        let map = locate_landmarks(&extraction.regions, &config.zoning);
        if map.is_none() {
            issues.push(Issue::MissingLandmark { landmark: Landmark::Space });
        }
        map
    };

    let (mut verdict, mut metrics) = match &landmarks {
        Some(map) => {
            for landmark in map.missing() {
                if landmark == Landmark::EnterKey && !config.zoning.detect_enter {
                    continue;
                }
                issues.push(Issue::MissingLandmark { landmark });
            }
            if map.tl_letter_approximate {
                issues.push(Issue::ApproximateLandmark { landmark: Landmark::TlLetter });
            }
            let geometry = classify_geometry(map, input.gray, &config.classification);
            (geometry.verdict, geometry.metrics)
        }
        None => (Verdict::unknown(), DiagnosticMetrics::default()),
    };

    let mut ocr = None;
    let mut variant = None;
    if let Some(detections) = input.ocr {
        match classify_detections(detections, &config.ocr)? {
            OcrOutcome::Insufficient(insufficient) => {
                issues.push(Issue::OcrInputInvalid {
                    distinct: insufficient.distinct,
                    required: insufficient.required,
                });
            }
            OcrOutcome::Classified(analysis) => {
                let classification = &analysis.classification;
                metrics.ocr_confidence = Some(classification.confidence);
                metrics.ocr_characters = Some(classification.characters);

                match classification.confident_family(config.ocr.min_layout_confidence) {
                    Some(family) => {
                        info!(
                            "OCR layout {} (confidence {:.0}) overrides geometric {}",
                            family, classification.confidence, verdict.layout
                        );
                        verdict.layout = family.layout();
                        verdict.layout_source = LayoutSource::Ocr;

                        variant = refine_variant(
                            family,
                            &analysis.assignment,
                            verdict.form_factor,
                            &config.ocr,
                        );
                        if let Some(found) = &variant {
                            verdict.variant = Some(found.name);
                            metrics.variant_score = Some(found.score);
                        }
                    }
                    None => {
                        info!(
                            "OCR verdict {:?} (confidence {:.0}) below {:.0}, keeping geometric {}",
                            classification.decision,
                            classification.confidence,
                            config.ocr.min_layout_confidence,
                            verdict.layout
                        );
                    }
                }
                ocr = Some(analysis);
            }
        }
    }

    if !verdict.form_factor.is_definite() {
        issues.push(Issue::Ambiguous { axis: Axis::FormFactor });
    }
    if !verdict.platform.is_definite() {
        issues.push(Issue::Ambiguous { axis: Axis::Platform });
    }
    if !verdict.layout.is_definite() {
        issues.push(Issue::Ambiguous { axis: Axis::Layout });
    }

    info!(
        "Verdict: {} / {} / {}{} ({} issues)",
        verdict.form_factor,
        verdict.platform,
        verdict.layout,
        verdict.variant.map(|v| format!(" [{}]", v)).unwrap_or_default(),
        issues.len()
    );

    Ok(AnalysisReport {
        verdict,
        metrics,
        issues,
        region_count,
        extraction: extraction.stats,
        landmarks,
        ocr,
        variant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FormFactor, Layout, Platform};
    use crate::test_support::{draw_rect, fill_rect, synthetic_keyboard};

    /// OCR detections laid out as three rows of letters
    fn detections(rows: [&str; 3]) -> Vec<OcrDetection> {
        let mut out = Vec::new();
        for (r, letters) in rows.iter().enumerate() {
            for (i, c) in letters.chars().enumerate() {
                out.push(OcrDetection {
                    text: c.to_string(),
                    confidence: 0.9,
                    x_center: 210.0 + 60.0 * i as f64 + 20.0 * r as f64,
                    y_center: 245.0 + 60.0 * r as f64,
                });
            }
        }
        out
    }

    #[test]
    fn test_synthetic_keyboard_is_fully_classified() {
        let kb = synthetic_keyboard();
        let input = AnalysisInput::new(&kb.mask).with_gray(&kb.gray);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();

        assert_eq!(report.region_count, 40);
        assert!(report.issues.is_empty(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.landmarks.as_ref().unwrap().found_count(), 5);
        assert!(report.verdict.is_fully_definite());
        assert_eq!(report.verdict.form_factor, FormFactor::Ansi);
        assert_eq!(report.verdict.platform, Platform::Windows);
        assert_eq!(report.verdict.layout, Layout::QwertyOrQwertz);
        assert_eq!(report.verdict.layout_source, LayoutSource::Geometry);
    }

    #[test]
    fn test_too_few_regions_is_reported_not_raised() {
        let mut mask = GrayImage::new(400, 200);
        for i in 0..3 {
            draw_rect(&mut mask, 50, 20 + 120 * i, 50, 100);
        }
        let report = analyze(&AnalysisInput::new(&mask), &DetectorConfig::default()).unwrap();

        assert_eq!(report.region_count, 3);
        assert!(report.landmarks.is_none());
        assert_eq!(report.verdict, Verdict::unknown());
        assert_eq!(
            report.issues[0],
            Issue::InsufficientRegions { found: 3, required: 10 }
        );
        assert!(report.issues.contains(&Issue::Ambiguous { axis: Axis::Layout }));
    }

    #[test]
    fn test_zero_size_mask_is_error() {
        let mask = GrayImage::new(0, 0);
        let result = analyze(&AnalysisInput::new(&mask), &DetectorConfig::default());
        assert!(matches!(result, Err(DetectError::EmptyImage { .. })));
    }

    #[test]
    fn test_gray_size_mismatch_is_error() {
        let kb = synthetic_keyboard();
        let gray = GrayImage::new(10, 10);
        let input = AnalysisInput::new(&kb.mask).with_gray(&gray);
        let result = analyze(&input, &DetectorConfig::default());
        assert!(matches!(result, Err(DetectError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_missing_os_key_degrades_platform_only() {
        let kb = synthetic_keyboard();
        let mut mask = kb.mask.clone();
        // Clear every key the OS corridor could reach
        for name in ["lctrl", "lalt", "os"] {
            let b = kb.key(name);
            fill_rect(&mut mask, b.min_row, b.min_col, b.height(), b.width(), 0);
        }

        let input = AnalysisInput::new(&mask).with_gray(&kb.gray);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();
        assert_eq!(report.verdict.platform, Platform::Uncertain);
        assert_eq!(report.verdict.form_factor, FormFactor::Ansi);
        assert!(report.issues.contains(&Issue::MissingLandmark { landmark: Landmark::OsKey }));
        assert!(report.issues.contains(&Issue::Ambiguous { axis: Axis::Platform }));
    }

    #[test]
    fn test_confident_ocr_overrides_geometric_layout() {
        let kb = synthetic_keyboard();
        let ocr = detections(["AZERTYUIOP", "QSDFGHJKLM", "WXCVBN"]);
        let input = AnalysisInput::new(&kb.mask).with_gray(&kb.gray).with_ocr(&ocr);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();

        assert_eq!(report.verdict.layout, Layout::Azerty);
        assert_eq!(report.verdict.layout_source, LayoutSource::Ocr);
        assert_eq!(report.verdict.variant, Some("AZERTY_FR"));
        assert_eq!(report.metrics.ocr_confidence, Some(100.0));
        // Other axes still come from geometry
        assert_eq!(report.verdict.platform, Platform::Windows);
    }

    #[test]
    fn test_qwertz_ocr_separates_qwerty_family() {
        let kb = synthetic_keyboard();
        let ocr = detections(["QWERTZUIOP", "ASDFGHJKL", "YXCVBNM"]);
        let input = AnalysisInput::new(&kb.mask).with_ocr(&ocr);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();
        assert_eq!(report.verdict.layout, Layout::Qwertz);
        assert_eq!(report.verdict.variant, Some("QWERTZ_DE"));
    }

    #[test]
    fn test_weak_ocr_keeps_geometry() {
        let kb = synthetic_keyboard();
        // Scores tie between QWERTY and QWERTZ: confidence 50
        let ocr = detections(["DXQ", "VTWZ", "AEGMRSCF"]);
        let input = AnalysisInput::new(&kb.mask).with_gray(&kb.gray).with_ocr(&ocr);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();

        assert_eq!(report.verdict.layout, Layout::QwertyOrQwertz);
        assert_eq!(report.verdict.layout_source, LayoutSource::Geometry);
        assert_eq!(report.metrics.ocr_confidence, Some(50.0));
        assert!(report.verdict.variant.is_none());
    }

    #[test]
    fn test_sparse_ocr_is_reported() {
        let kb = synthetic_keyboard();
        let ocr = detections(["Q", "A", ""]);
        let input = AnalysisInput::new(&kb.mask).with_ocr(&ocr);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();
        assert!(report.issues.contains(&Issue::OcrInputInvalid { distinct: 2, required: 5 }));
        assert_eq!(report.verdict.layout, Layout::QwertyOrQwertz);
    }

    #[test]
    fn test_report_serializes() {
        let kb = synthetic_keyboard();
        let input = AnalysisInput::new(&kb.mask).with_gray(&kb.gray);
        let report = analyze(&input, &DetectorConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"]["ISO_ANSI"], "ANSI");
        assert_eq!(json["verdict"]["MAC_WIN"], "Windows");
        assert_eq!(json["landmarks"]["h_ref"], 50.0);
    }
}
