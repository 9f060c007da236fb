use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;

/// A single upper-case letter, accented letters included
const LETTER_PATTERN: &str = r"^\p{Lu}$";

/// One raw detection from the external OCR engine.
///
/// The same image is usually read several times with different preprocessing,
/// so the same key can appear in several detections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrDetection {
    pub text: String,
    /// Engine confidence, 0.0 to 1.0
    pub confidence: f32,
    pub x_center: f64,
    pub y_center: f64,
}

/// A recognized key letter with its position averaged over every detection of it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CharacterObservation {
    pub character: char,
    pub x: f64,
    pub y: f64,
    /// Number of detections averaged
    pub count: usize,
}

/// Maps digits OCR commonly reads instead of letters.
fn correct_confusion(c: char) -> char {
    match c {
        '0' => 'O',
        '1' => 'I',
        '5' => 'S',
        '2' => 'Z',
        '4' => 'A',
        '8' => 'B',
        other => other,
    }
}

/// Normalizes raw OCR text to a single letter.
///
/// Upper-cases and trims, drops whatever is not alphanumeric, and requires
/// exactly one character to remain before applying the digit corrections.
/// Returns None unless the result is a letter.
pub fn clean_token(text: &str, letter: &Regex) -> Option<char> {
    let upper = text.trim().to_uppercase();
    let mut kept = upper.chars().filter(|c| c.is_alphanumeric());
    let (Some(c), None) = (kept.next(), kept.next()) else {
        return None;
    };

    let corrected = correct_confusion(c);
    letter.is_match(&corrected.to_string()).then_some(corrected)
}

/// Gates detections by confidence, cleans them and averages positions per letter.
///
/// Output is sorted by letter.
pub fn aggregate_detections(
    detections: &[OcrDetection],
    min_confidence: f32,
) -> Result<Vec<CharacterObservation>> {
    let letter = Regex::new(LETTER_PATTERN)?;

    let mut sums: BTreeMap<char, (f64, f64, usize)> = BTreeMap::new();
    let mut rejected = 0usize;

    for detection in detections {
        if detection.confidence < min_confidence {
            rejected += 1;
            continue;
        }
        let Some(character) = clean_token(&detection.text, &letter) else {
            rejected += 1;
            continue;
        };
        let entry = sums.entry(character).or_insert((0.0, 0.0, 0));
        entry.0 += detection.x_center;
        entry.1 += detection.y_center;
        entry.2 += 1;
    }

    let observations: Vec<CharacterObservation> = sums
        .into_iter()
        .map(|(character, (x_sum, y_sum, count))| CharacterObservation {
            character,
            x: x_sum / count as f64,
            y: y_sum / count as f64,
            count,
        })
        .collect();

    debug!(
        "OCR: {} detections -> {} distinct letters ({} rejected)",
        detections.len(),
        observations.len(),
        rejected
    );

    Ok(observations)
}
