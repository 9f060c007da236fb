//! Row-evidence scoring of the three layout families.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::cluster::Row;
use crate::classify::Layout;
use crate::config::ScoringWeights;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Family {
    #[serde(rename = "AZERTY")]
    Azerty,
    #[serde(rename = "QWERTY")]
    Qwerty,
    #[serde(rename = "QWERTZ")]
    Qwertz,
}

impl Family {
    /// Scoring order; the first family reaching the best score wins ties
    pub const ALL: [Family; 3] = [Family::Azerty, Family::Qwerty, Family::Qwertz];

    pub fn layout(self) -> Layout {
        match self {
            Family::Azerty => Layout::Azerty,
            Family::Qwerty => Layout::Qwerty,
            Family::Qwertz => Layout::Qwertz,
        }
    }

    /// Letters expected on the top, middle and bottom rows.
    fn expected(self, row: Row) -> &'static [char] {
        match (self, row) {
            (Family::Azerty, Row::Top) => &['A', 'Z', 'E', 'R', 'T'],
            (Family::Azerty, Row::Middle) => &['Q', 'S', 'D', 'F', 'G', 'M'],
            (Family::Azerty, Row::Bottom) => &['W', 'X', 'C', 'V'],
            (Family::Qwerty, Row::Top) => &['Q', 'W', 'E', 'R', 'T', 'Y'],
            (Family::Qwerty, Row::Middle) => &['A', 'S', 'D', 'F', 'G'],
            (Family::Qwerty, Row::Bottom) => &['Z', 'X', 'C', 'V'],
            (Family::Qwertz, Row::Top) => &['Q', 'W', 'E', 'R', 'T', 'Z'],
            (Family::Qwertz, Row::Middle) => &['A', 'S', 'D', 'F', 'G'],
            (Family::Qwertz, Row::Bottom) => &['Y', 'X', 'C', 'V'],
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.layout().fmt(f)
    }
}

/// Letters whose row placement separates the families.
fn is_indicator(character: char, row: Row) -> bool {
    match row {
        Row::Top => matches!(character, 'A' | 'Q' | 'Z' | 'W'),
        Row::Middle => matches!(character, 'A' | 'Q' | 'M'),
        Row::Bottom => matches!(character, 'W' | 'Z' | 'Y' | 'M'),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrDecision {
    Family(Family),
    /// No letters to score
    Unknown,
    /// Best score was zero or negative
    Uncertain,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OcrClassification {
    pub decision: OcrDecision,
    /// 0 to `max_confidence`
    pub confidence: f64,
    pub scores: BTreeMap<Family, i32>,
    pub characters: usize,
}

impl OcrClassification {
    /// The decided family, if the confidence clears `min_confidence`.
    pub fn confident_family(&self, min_confidence: f64) -> Option<Family> {
        match self.decision {
            OcrDecision::Family(family) if self.confidence >= min_confidence => Some(family),
            _ => None,
        }
    }
}

/// Raw per-family scores for a letter-to-row assignment.
pub fn family_scores(rows: &BTreeMap<char, Row>, weights: &ScoringWeights) -> BTreeMap<Family, i32> {
    let mut scores: BTreeMap<Family, i32> = Family::ALL.iter().map(|&f| (f, 0)).collect();

    for (&character, &row) in rows {
        for family in Family::ALL {
            if family.expected(row).contains(&character) {
                let mut points = weights.row_match;
                if is_indicator(character, row) {
                    points += weights.indicator_bonus;
                }
                *scores.entry(family).or_default() += points;
            }
        }

        // Placements that rule a family out
        let mut adjust = |family: Family, delta: i32| *scores.entry(family).or_default() += delta;
        match (row, character) {
            (Row::Top, 'Q') => adjust(Family::Azerty, -weights.contradiction_penalty),
            (Row::Top, 'A') => {
                adjust(Family::Qwerty, -weights.contradiction_penalty);
                adjust(Family::Qwertz, -weights.contradiction_penalty);
            }
            (Row::Top, 'Z') => adjust(Family::Qwerty, -weights.contradiction_penalty),
            (Row::Bottom, 'Y') => {
                adjust(Family::Qwertz, weights.qwertz_y_bonus);
                adjust(Family::Qwerty, -weights.qwerty_y_penalty);
            }
            _ => {}
        }
    }

    scores
}

/// Picks the best family and derives a confidence from its margin over the runner-up.
pub fn score_layout(rows: &BTreeMap<char, Row>, weights: &ScoringWeights) -> OcrClassification {
    let scores = family_scores(rows, weights);

    if rows.is_empty() {
        return OcrClassification {
            decision: OcrDecision::Unknown,
            confidence: 0.0,
            scores,
            characters: 0,
        };
    }

    let mut best = Family::ALL[0];
    for family in Family::ALL {
        if scores[&family] > scores[&best] {
            best = family;
        }
    }
    let best_score = scores[&best];

    let mut ranked: Vec<i32> = scores.values().copied().collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    let margin = (ranked[0] - ranked[1]) as f64;

    let (decision, confidence) = if best_score <= 0 {
        (OcrDecision::Uncertain, 0.0)
    } else {
        let confidence = (weights.base_confidence + margin).clamp(0.0, weights.max_confidence);
        (OcrDecision::Family(best), confidence)
    };

    debug!(
        "OCR scores {:?} -> {:?} (confidence {:.0})",
        scores, decision, confidence
    );

    OcrClassification {
        decision,
        confidence,
        scores,
        characters: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn rows(top: &str, middle: &str, bottom: &str) -> BTreeMap<char, Row> {
        let mut map = BTreeMap::new();
        for (letters, row) in [(top, Row::Top), (middle, Row::Middle), (bottom, Row::Bottom)] {
            for c in letters.chars() {
                map.insert(c, row);
            }
        }
        map
    }

    #[test]
    fn test_exact_azerty_rows() {
        let weights = ScoringWeights::default();
        let result = score_layout(&rows("AZERT", "QSDFGM", "WXCV"), &weights);
        assert_eq!(result.scores[&Family::Azerty], 225);
        assert_eq!(result.scores[&Family::Qwerty], -200);
        assert_eq!(result.scores[&Family::Qwertz], -25);
        assert_eq!(result.decision, OcrDecision::Family(Family::Azerty));
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.characters, 15);
    }

    #[test]
    fn test_shuffled_rows_score_lower_confidence() {
        let weights = ScoringWeights::default();
        let exact = score_layout(&rows("AZERT", "QSDFGM", "WXCV"), &weights);

        // Letters scattered across rows with no layout's pattern
        let shuffles = [
            rows("SVGM", "ERCA", "QZDFXWT"),
            rows("DXQ", "VTWZ", "AEGMRSCF"),
            rows("CFWM", "ZXGA", "RSQVTDE"),
        ];
        for shuffled in &shuffles {
            let result = score_layout(shuffled, &weights);
            assert!(
                result.confidence < exact.confidence,
                "shuffle {:?} reached confidence {}",
                shuffled,
                result.confidence
            );
        }
    }

    /// Winning score and its margin over the runner-up.
    fn best_and_margin(result: &OcrClassification) -> (i32, i32) {
        let mut ranked: Vec<i32> = result.scores.values().copied().collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        (ranked[0], ranked[0] - ranked[1])
    }

    #[test]
    fn test_random_shuffles_never_beat_exact_rows() {
        let weights = ScoringWeights::default();
        let exact_rows = rows("AZERT", "QSDFGM", "WXCV");
        let exact = score_layout(&exact_rows, &weights);
        let (exact_best, exact_margin) = best_and_margin(&exact);
        assert_eq!((exact_best, exact_margin), (225, 250));

        let mut letters: Vec<char> = "AZERTQSDFGMWXCV".chars().collect();
        let mut rng = StdRng::seed_from_u64(42);
        let mut checked = 0;
        for _ in 0..500 {
            letters.shuffle(&mut rng);
            let shuffled: String = letters.iter().collect();
            let candidate = rows(&shuffled[..5], &shuffled[5..11], &shuffled[11..]);
            if candidate == exact_rows {
                continue;
            }
            checked += 1;

            let result = score_layout(&candidate, &weights);
            let (best, margin) = best_and_margin(&result);
            assert!(best < exact_best, "{:?} scored {}", candidate, best);
            assert!(margin <= exact_margin, "{:?} margin {}", candidate, margin);
            assert!(result.confidence <= exact.confidence);
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_bottom_y_outweighs_azerty_middle_row() {
        // Q and M in the middle, W and Y at the bottom
        let mut assignment = BTreeMap::new();
        assignment.insert('Q', Row::Middle);
        assignment.insert('M', Row::Middle);
        assignment.insert('W', Row::Bottom);
        assignment.insert('Y', Row::Bottom);

        let result = score_layout(&assignment, &ScoringWeights::default());
        assert_eq!(result.scores[&Family::Azerty], 75);
        assert_eq!(result.scores[&Family::Qwertz], 145);
        assert_eq!(result.scores[&Family::Qwerty], -60);
        assert_eq!(result.decision, OcrDecision::Family(Family::Qwertz));
        assert_eq!(result.confidence, 100.0);
    }

    #[test]
    fn test_qwerty_rows() {
        let weights = ScoringWeights::default();
        let result = score_layout(&rows("QWERTY", "ASDFG", "ZXCV"), &weights);
        assert_eq!(result.decision, OcrDecision::Family(Family::Qwerty));
        assert!(result.scores[&Family::Qwerty] > result.scores[&Family::Qwertz]);
    }

    #[test]
    fn test_qwertz_rows() {
        let weights = ScoringWeights::default();
        let result = score_layout(&rows("QWERTZ", "ASDFG", "YXCV"), &weights);
        assert_eq!(result.decision, OcrDecision::Family(Family::Qwertz));
        assert!(result.confidence >= 60.0);
    }

    #[test]
    fn test_q_on_top_penalizes_azerty() {
        let weights = ScoringWeights::default();
        let scores = family_scores(&rows("Q", "", ""), &weights);
        assert_eq!(scores[&Family::Azerty], -150);
        assert_eq!(scores[&Family::Qwerty], 25);
    }

    #[test]
    fn test_no_characters_is_unknown() {
        let result = score_layout(&BTreeMap::new(), &ScoringWeights::default());
        assert_eq!(result.decision, OcrDecision::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_non_positive_best_is_uncertain() {
        // H, J, K score nowhere
        let result = score_layout(&rows("H", "J", "K"), &ScoringWeights::default());
        assert_eq!(result.decision, OcrDecision::Uncertain);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_confident_family_gate() {
        let weights = ScoringWeights::default();
        let result = score_layout(&rows("AZERT", "QSDFGM", "WXCV"), &weights);
        assert_eq!(result.confident_family(60.0), Some(Family::Azerty));
        let mut weak = result.clone();
        weak.confidence = 55.0;
        assert_eq!(weak.confident_family(60.0), None);
    }
}
