//! Claimed-name matching against OCR text.

/// Lowercase, collapse whitespace runs to single spaces, trim.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True iff the normalized claimed name is a substring of the normalized
/// extracted text. Exact containment, no fuzzy or token-set matching.
/// An empty claimed name trivially matches.
pub fn matches(extracted_text: &str, claimed_name: &str) -> bool {
    normalize(extracted_text).contains(&normalize(claimed_name))
}
