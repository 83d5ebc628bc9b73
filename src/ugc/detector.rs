//! Screens community text for dosing and protocol instructions.
//!
//! The site is educational; anything that reads like "how much, how often,
//! how to administer" is flagged. Patterns are fixed and case-insensitive.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub flagged: bool,
    pub reasons: Vec<&'static str>,
}

static PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "dose_amount",
            r"(?i)\b\d+(?:[.,]\d+)?\s*(?:mcg|µg|ug|mg|iu|ml|cc|units?)\b",
        ),
        (
            "frequency",
            r"(?i)\b(?:once|twice|three times|[1-9]\s*x)\s*(?:a|per|/)?\s*(?:day|daily|week|weekly)\b|\b(?:every other day|eod|bid|tid|qd|per week|per day)\b",
        ),
        (
            "administration",
            r"(?i)\b(?:sub-?q|subcutaneous(?:ly)?|intramuscular(?:ly)?|inject(?:ed|ing|ion|s)?|pin(?:s|ned|ning)?)\b",
        ),
        (
            "protocol",
            r"(?i)\b(?:protocols?|cycle of|weeks? on|weeks? off|loading phase|titrat(?:e|ed|ing|ion))\b",
        ),
        (
            "reconstitution",
            r"(?i)\b(?:reconstitut(?:e|ed|ing|ion)|bac(?:teriostatic)? water|bacteriostatic)\b",
        ),
    ]
    .into_iter()
    .map(|(label, pattern)| {
        let re = Regex::new(pattern).unwrap_or_else(|e| panic!("bad screen pattern {}: {}", label, e));
        (label, re)
    })
    .collect()
});

/// Run every pattern over `text`. Reasons keep pattern order.
pub fn detect_dosing_or_protocol(text: &str) -> Screen {
    let reasons: Vec<&'static str> = PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(label, _)| *label)
        .collect();

    Screen {
        flagged: !reasons.is_empty(),
        reasons,
    }
}
