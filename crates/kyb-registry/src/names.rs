//! Local name similarity used to suppress false-positive remote matches.

/// Lower-case, keep alphanumerics, collapse everything else to single spaces.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaro-Winkler similarity of two names after normalization, in `0.0..=1.0`.
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&normalize_name(a), &normalize_name(b))
}

/// Best similarity between `name` and any of `candidates`.
#[must_use]
pub fn best_similarity<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> f64 {
    candidates
        .into_iter()
        .map(|candidate| name_similarity(name, candidate))
        .fold(0.0, f64::max)
}

/// Round to two decimals, the precision match scores are stored with.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
