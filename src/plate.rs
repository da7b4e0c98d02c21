//! Plate text normalization.
//!
//! OCR output is cleaned down to plate characters and then matched against
//! the `LL DDDD LL` layout. Letters may be Latin or the Cyrillic capitals used
//! on Ukrainian plates.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{CanonicalPlate, PlateQuality};

/// Length of a canonical plate in characters
pub const PLATE_LEN: usize = 8;

static PLATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-ZА-ЯІЇЄ]{2}[0-9]{4}[A-ZА-ЯІЇЄ]{2}").expect("plate pattern is valid")
});

static RUN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-ZА-ЯІЇЄ]{1,2}|[0-9]{1,4}").expect("run pattern is valid")
});

/// Whether `c` may appear in a cleaned plate string
pub fn is_plate_char(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'А'..='Я' | 'І' | 'Ї' | 'Є' | '0'..='9')
}

/// Upper-case `raw` and drop everything that is not a plate letter or digit
pub fn clean(raw: &str) -> String {
    raw.to_uppercase().chars().filter(|c| is_plate_char(*c)).collect()
}

/// Turn raw OCR text into a canonical plate.
///
/// A verbatim `LL DDDD LL` match wins. Otherwise the cleaned text is split
/// into runs of up to two letters or four digits and the first two runs are
/// joined with the last two; the result is kept only when it is exactly eight
/// characters long. Anything else comes back as the cleaned text.
pub fn normalize(raw: &str) -> CanonicalPlate {
    let cleaned = clean(raw);

    if let Some(found) = PLATE_PATTERN.find(&cleaned) {
        return CanonicalPlate::new(found.as_str(), PlateQuality::Exact);
    }

    if let Some(rebuilt) = reconstruct(&cleaned) {
        return CanonicalPlate::new(rebuilt, PlateQuality::Reconstructed);
    }

    CanonicalPlate::new(cleaned, PlateQuality::Uncorrected)
}

fn reconstruct(cleaned: &str) -> Option<String> {
    let runs: Vec<&str> = RUN_PATTERN.find_iter(cleaned).map(|m| m.as_str()).collect();
    if runs.len() < 4 {
        return None;
    }

    let rebuilt: String = runs[..2]
        .iter()
        .chain(&runs[runs.len() - 2..])
        .copied()
        .collect();

    (rebuilt.chars().count() == PLATE_LEN).then_some(rebuilt)
}
