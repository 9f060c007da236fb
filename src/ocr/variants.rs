//! Regional variants within each layout family, matched on the letter order of
//! the top and middle rows.

use serde::Serialize;
use tracing::debug;

use super::cluster::{Row, RowAssignment};
use super::score::Family;
use crate::classify::FormFactor;
use crate::config::OcrConfig;

/// Leading positions that earn the early-match bonus
const EARLY_POSITIONS: usize = 3;
const EARLY_MATCH_BONUS: f64 = 0.1;
const TOP_ROW_WEIGHT: f64 = 0.7;
const MIDDLE_ROW_WEIGHT: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutVariant {
    pub name: &'static str,
    pub family: Family,
    pub region: &'static str,
    pub form_factor: FormFactor,
    pub top_row: &'static [char],
    pub middle_row: &'static [char],
}

const QWERTY_TOP: &[char] = &['Q', 'W', 'E', 'R', 'T', 'Y', 'U', 'I', 'O', 'P'];
const QWERTZ_TOP: &[char] = &['Q', 'W', 'E', 'R', 'T', 'Z', 'U', 'I', 'O', 'P'];
const AZERTY_TOP: &[char] = &['A', 'Z', 'E', 'R', 'T', 'Y', 'U', 'I', 'O', 'P'];
const QWERTY_MIDDLE: &[char] = &['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L'];
const AZERTY_MIDDLE: &[char] = &['Q', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'M'];

const fn variant(
    name: &'static str,
    family: Family,
    region: &'static str,
    form_factor: FormFactor,
    top_row: &'static [char],
    middle_row: &'static [char],
) -> LayoutVariant {
    LayoutVariant { name, family, region, form_factor, top_row, middle_row }
}

/// Known variants, in preference order within each family.
pub const VARIANTS: [LayoutVariant; 15] = [
    variant("QWERTY_US", Family::Qwerty, "US", FormFactor::Ansi, QWERTY_TOP, QWERTY_MIDDLE),
    variant("QWERTY_UK", Family::Qwerty, "UK", FormFactor::Iso, QWERTY_TOP, QWERTY_MIDDLE),
    variant("QWERTY_INTL", Family::Qwerty, "International", FormFactor::Ansi, QWERTY_TOP, QWERTY_MIDDLE),
    variant("QWERTY_CA", Family::Qwerty, "Canada", FormFactor::Ansi, QWERTY_TOP, QWERTY_MIDDLE),
    variant("QWERTY_AU", Family::Qwerty, "Australia", FormFactor::Ansi, QWERTY_TOP, QWERTY_MIDDLE),
    variant(
        "QWERTY_NORDIC",
        Family::Qwerty,
        "DK/NO",
        FormFactor::Iso,
        &['Q', 'W', 'E', 'R', 'T', 'Y', 'U', 'I', 'O', 'P', 'Å'],
        &['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'Ø', 'Æ'],
    ),
    variant("QWERTZ_DE", Family::Qwertz, "DE/CH/AT", FormFactor::Iso, QWERTZ_TOP, QWERTY_MIDDLE),
    variant(
        "QWERTZ_CH",
        Family::Qwertz,
        "CH",
        FormFactor::Iso,
        &['Q', 'W', 'E', 'R', 'T', 'Z', 'U', 'I', 'O', 'P', 'È'],
        &['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'É'],
    ),
    variant(
        "QWERTZ_CZ",
        Family::Qwertz,
        "CZ",
        FormFactor::Iso,
        &['Q', 'W', 'E', 'R', 'T', 'Z', 'U', 'I', 'O', 'P', 'Ú'],
        &['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'Ž'],
    ),
    variant(
        "QWERTZ_SK",
        Family::Qwertz,
        "SK",
        FormFactor::Iso,
        &['Q', 'W', 'E', 'R', 'T', 'Z', 'U', 'I', 'O', 'P', 'Ň'],
        &['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'Ľ', 'Š'],
    ),
    variant("AZERTY_FR", Family::Azerty, "FR", FormFactor::Iso, AZERTY_TOP, AZERTY_MIDDLE),
    variant("AZERTY_BE", Family::Azerty, "BE", FormFactor::Iso, AZERTY_TOP, AZERTY_MIDDLE),
    variant(
        "AZERTY_FR_MODERN",
        Family::Azerty,
        "FR (AFNOR 2019)",
        FormFactor::Iso,
        &['A', 'Z', 'E', 'R', 'T', 'Y', 'U', 'I', 'O', 'P', 'È'],
        &['Q', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'Ê'],
    ),
    variant("AZERTY_MAC_FR", Family::Azerty, "FR (Apple)", FormFactor::Iso, AZERTY_TOP, AZERTY_MIDDLE),
    variant(
        "AZERTY_CH",
        Family::Azerty,
        "CH (Romandie)",
        FormFactor::Iso,
        &['A', 'Z', 'E', 'R', 'T', 'Y', 'U', 'I', 'O', 'P', 'È'],
        &['Q', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'É'],
    ),
];

/// Positional agreement of a detected sequence with a reference row, 0.0 to 1.0.
///
/// Compares position by position over the shorter length; sequences of three
/// or more also earn a bonus for each match among the first three keys.
pub fn score_sequence(detected: &[char], reference: &[char]) -> f64 {
    let len = detected.len().min(reference.len());
    if len == 0 {
        return 0.0;
    }
    let matches_in = |n: usize| {
        detected[..n]
            .iter()
            .zip(&reference[..n])
            .filter(|(a, b)| a == b)
            .count()
    };

    let base = matches_in(len) as f64 / len as f64;
    if len >= EARLY_POSITIONS {
        (base + matches_in(EARLY_POSITIONS) as f64 * EARLY_MATCH_BONUS).min(1.0)
    } else {
        base
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantMatch {
    pub name: &'static str,
    pub region: &'static str,
    pub score: f64,
    pub top_row_score: f64,
    pub middle_row_score: f64,
}

/// Combined score of one variant against the observed rows.
///
/// Row scores are capped at 1.0 but the form factor bonus is added on top, so
/// two variants with identical letters are separated by their ISO/ANSI type.
pub fn score_variant(
    variant: &LayoutVariant,
    assignment: &RowAssignment,
    form_factor: FormFactor,
    config: &OcrConfig,
) -> VariantMatch {
    let top_row_score = score_sequence(assignment.sequence(Row::Top), variant.top_row);
    let middle_row_score = score_sequence(assignment.sequence(Row::Middle), variant.middle_row);

    let mut score = TOP_ROW_WEIGHT * top_row_score + MIDDLE_ROW_WEIGHT * middle_row_score;
    if form_factor.is_definite() && form_factor == variant.form_factor {
        score += config.variant_iso_bonus;
    }

    VariantMatch {
        name: variant.name,
        region: variant.region,
        score,
        top_row_score,
        middle_row_score,
    }
}

/// Best variant of `family`, or None when no variant reaches `variant_min_score`.
pub fn refine_variant(
    family: Family,
    assignment: &RowAssignment,
    form_factor: FormFactor,
    config: &OcrConfig,
) -> Option<VariantMatch> {
    let mut best: Option<VariantMatch> = None;
    for variant in VARIANTS.iter().filter(|v| v.family == family) {
        let candidate = score_variant(variant, assignment, form_factor, config);
        if best.as_ref().is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    let best = best?;
    if best.score < config.variant_min_score {
        debug!(
            "Best {} variant {} scored {:.2}, below {:.2}",
            family, best.name, best.score, config.variant_min_score
        );
        return None;
    }
    debug!("Variant {} ({}) scored {:.2}", best.name, best.region, best.score);
    Some(best)
}
