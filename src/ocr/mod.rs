pub mod cluster;
pub mod observe;
pub mod score;
pub mod variants;

pub use cluster::{cluster_rows, InsufficientObservations, Row, RowAssignment, RowClusterer};
pub use observe::{aggregate_detections, CharacterObservation, OcrDetection};
pub use score::{score_layout, Family, OcrClassification, OcrDecision};
pub use variants::{refine_variant, VariantMatch};

use serde::Serialize;
use tracing::info;

use crate::config::OcrConfig;
use crate::error::Result;

/// Letters, their rows and the family scores for one image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OcrAnalysis {
    pub observations: Vec<CharacterObservation>,
    pub assignment: RowAssignment,
    pub classification: OcrClassification,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OcrOutcome {
    Classified(OcrAnalysis),
    /// Not enough letters to cluster rows; the geometric verdict stands
    Insufficient(InsufficientObservations),
}

/// High-level function: raw OCR detections → layout family scores.
///
/// Cleans and aggregates the detections, clusters their heights into three
/// rows and scores each layout family on the result.
pub fn classify_detections(detections: &[OcrDetection], config: &OcrConfig) -> Result<OcrOutcome> {
    let observations = aggregate_detections(detections, config.min_detection_confidence)?;

    let assignment = match cluster_rows(&observations, config) {
        Ok(assignment) => assignment,
        Err(insufficient) => {
            info!(
                "OCR: {} distinct values, {} required; skipping row classification",
                insufficient.distinct, insufficient.required
            );
            return Ok(OcrOutcome::Insufficient(insufficient));
        }
    };

    let classification = score_layout(&assignment.rows, &config.weights);
    info!(
        "OCR: {:?} with confidence {:.0} from {} letters",
        classification.decision, classification.confidence, classification.characters
    );

    Ok(OcrOutcome::Classified(OcrAnalysis {
        observations,
        assignment,
        classification,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detections_for(rows: [&str; 3]) -> Vec<OcrDetection> {
        let mut out = Vec::new();
        for (r, letters) in rows.iter().enumerate() {
            for (i, c) in letters.chars().enumerate() {
                // Two preprocessing passes per letter, slightly apart
                for pass in 0..2 {
                    out.push(OcrDetection {
                        text: c.to_string(),
                        confidence: 0.8,
                        x_center: 100.0 + 60.0 * i as f64 + 15.0 * r as f64 + pass as f64,
                        y_center: 40.0 + 60.0 * r as f64 + pass as f64,
                    });
                }
            }
        }
        out
    }

    #[test]
    fn test_azerty_detections() {
        let detections = detections_for(["AZERTYUIOP", "QSDFGHJKLM", "WXCVBN"]);
        let outcome = classify_detections(&detections, &OcrConfig::default()).unwrap();
        let OcrOutcome::Classified(analysis) = outcome else {
            panic!("expected a classification");
        };
        assert_eq!(analysis.classification.decision, OcrDecision::Family(Family::Azerty));
        assert_eq!(analysis.observations.len(), 26);
        assert!(analysis.observations.iter().all(|o| o.count == 2));
        assert_eq!(
            analysis.assignment.sequence(Row::Top),
            "AZERTYUIOP".chars().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_qwertz_detections_with_digit_confusions() {
        // "2" is read for Z and "0" for O
        let detections = detections_for(["QWERT2UI0P", "ASDFGHJKL", "YXCVBNM"]);
        let outcome = classify_detections(&detections, &OcrConfig::default()).unwrap();
        let OcrOutcome::Classified(analysis) = outcome else {
            panic!("expected a classification");
        };
        assert_eq!(analysis.classification.decision, OcrDecision::Family(Family::Qwertz));
        assert_eq!(analysis.assignment.row_of('Z'), Some(Row::Top));
    }

    #[test]
    fn test_too_few_letters_is_insufficient() {
        let detections = detections_for(["AZ", "Q", ""]);
        let outcome = classify_detections(&detections, &OcrConfig::default()).unwrap();
        assert_eq!(
            outcome,
            OcrOutcome::Insufficient(InsufficientObservations { distinct: 3, required: 5 })
        );
    }

    #[test]
    fn test_low_confidence_detections_are_ignored() {
        let mut detections = detections_for(["AZERTYUIOP", "QSDFGHJKLM", "WXCVBN"]);
        for d in &mut detections {
            d.confidence = 0.1;
        }
        let outcome = classify_detections(&detections, &OcrConfig::default()).unwrap();
        assert!(matches!(outcome, OcrOutcome::Insufficient(_)));
    }
}
