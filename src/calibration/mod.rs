//! Offline calibration of the geometric AZERTY thresholds.
//!
//! Takes top-left letter measurements from images whose layout is known,
//! places each threshold midway between the AZERTY mean and the QWERTY (or
//! QWERTZ) mean, and checks how well the new thresholds separate the samples.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::{decide_layout, Layout};
use crate::config::ClassificationConfig;
use crate::error::{DetectError, Result};
use crate::ocr::Family;
use crate::pipeline::AnalysisReport;
use crate::stats;

/// Accuracy below this (percent) means geometry alone is not reliable enough
pub const LOW_ACCURACY_PERCENT: f64 = 70.0;

/// Top-left letter measurements of one labeled image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub name: String,
    pub family: Family,
    pub tl_center_y: f64,
    pub tl_extent: f64,
}

impl CalibrationSample {
    /// Takes the measurements from an analysis, if its top-left letter was found.
    pub fn from_report(name: impl Into<String>, family: Family, report: &AnalysisReport) -> Option<Self> {
        Some(Self {
            name: name.into(),
            family,
            tl_center_y: report.metrics.tl_center_y?,
            tl_extent: report.metrics.tl_extent?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FamilyStats {
    pub family: Family,
    pub count: usize,
    pub center_y_mean: f64,
    pub center_y_std: f64,
    pub extent_mean: f64,
    pub extent_std: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleCheck {
    pub name: String,
    pub actual: Family,
    pub predicted: Layout,
    pub correct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub stats: Vec<FamilyStats>,
    pub threshold_tl_center_y_azerty: f64,
    pub threshold_tl_extent_azerty: f64,
    pub checks: Vec<SampleCheck>,
    /// Percent of samples the new thresholds classify correctly
    pub accuracy: f64,
    pub low_accuracy: bool,
}

impl CalibrationReport {
    /// Writes the suggested thresholds into a classification config.
    pub fn apply(&self, config: &mut ClassificationConfig) {
        config.threshold_tl_center_y_azerty = self.threshold_tl_center_y_azerty;
        config.threshold_tl_extent_azerty = self.threshold_tl_extent_azerty;
    }
}

fn family_stats(family: Family, samples: &[&CalibrationSample]) -> FamilyStats {
    let center_y: Vec<f64> = samples.iter().map(|s| s.tl_center_y).collect();
    let extent: Vec<f64> = samples.iter().map(|s| s.tl_extent).collect();
    FamilyStats {
        family,
        count: samples.len(),
        center_y_mean: stats::mean(&center_y),
        center_y_std: stats::std_dev(&center_y),
        extent_mean: stats::mean(&extent),
        extent_std: stats::std_dev(&extent),
    }
}

/// Is the prediction right? QWERTY and QWERTZ both count as QWERTY/QWERTZ.
fn is_correct(actual: Family, predicted: Layout) -> bool {
    match actual {
        Family::Azerty => predicted == Layout::Azerty,
        Family::Qwerty | Family::Qwertz => predicted == Layout::QwertyOrQwertz,
    }
}

/// Suggests AZERTY thresholds from labeled samples.
///
/// Needs at least two samples, including one AZERTY and one QWERTY or QWERTZ.
pub fn calibrate(samples: &[CalibrationSample]) -> Result<CalibrationReport> {
    if samples.len() < 2 {
        return Err(DetectError::InsufficientCalibrationData(format!(
            "{} sample(s), at least 2 required",
            samples.len()
        )));
    }

    let stats: Vec<FamilyStats> = Family::ALL
        .iter()
        .filter_map(|&family| {
            let members: Vec<&CalibrationSample> =
                samples.iter().filter(|s| s.family == family).collect();
            (!members.is_empty()).then(|| family_stats(family, &members))
        })
        .collect();
    let find = |family: Family| stats.iter().find(|s| s.family == family);

    let azerty = find(Family::Azerty).ok_or_else(|| {
        DetectError::InsufficientCalibrationData("no AZERTY sample".to_string())
    })?;
    let qwerty = find(Family::Qwerty)
        .or_else(|| find(Family::Qwertz))
        .ok_or_else(|| {
            DetectError::InsufficientCalibrationData("no QWERTY or QWERTZ sample".to_string())
        })?;

    let threshold_tl_center_y_azerty = (azerty.center_y_mean + qwerty.center_y_mean) / 2.0;
    let threshold_tl_extent_azerty = (azerty.extent_mean + qwerty.extent_mean) / 2.0;

    let config = ClassificationConfig {
        threshold_tl_center_y_azerty,
        threshold_tl_extent_azerty,
        ..Default::default()
    };
    let checks: Vec<SampleCheck> = samples
        .iter()
        .map(|s| {
            let predicted = decide_layout(s.tl_center_y, s.tl_extent, &config);
            SampleCheck {
                name: s.name.clone(),
                actual: s.family,
                predicted,
                correct: is_correct(s.family, predicted),
            }
        })
        .collect();

    let correct = checks.iter().filter(|c| c.correct).count();
    let accuracy = correct as f64 / checks.len() as f64 * 100.0;
    let low_accuracy = accuracy < LOW_ACCURACY_PERCENT;

    info!(
        "Calibrated thresholds: center_y={:.3}, extent={:.3} ({}/{} correct, {:.1}%)",
        threshold_tl_center_y_azerty,
        threshold_tl_extent_azerty,
        correct,
        checks.len(),
        accuracy
    );
    if low_accuracy {
        warn!(
            "Accuracy below {:.0}%: geometry alone does not separate these layouts, rely on OCR",
            LOW_ACCURACY_PERCENT
        );
    }

    Ok(CalibrationReport {
        stats,
        threshold_tl_center_y_azerty,
        threshold_tl_extent_azerty,
        checks,
        accuracy,
        low_accuracy,
    })
}
