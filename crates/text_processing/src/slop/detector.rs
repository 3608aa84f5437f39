//! Regex-based banned-phrase detector

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;

use content_engine_core::{PhraseMatch, SlopDetector};

static DEFAULT_DETECTOR: Lazy<RegexSlopDetector> = Lazy::new(RegexSlopDetector::new);

/// Case-insensitive, word-bounded phrase matcher.
///
/// Patterns are compiled on first use and kept for the lifetime of the
/// detector, so repeated scans against the same phrase list are cheap.
#[derive(Default)]
pub struct RegexSlopDetector {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl RegexSlopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pattern for one phrase. Word boundaries are only applied at
    /// edges that are word characters, so phrases like `"100%"` still match.
    fn pattern_for(phrase: &str) -> Option<Regex> {
        let trimmed = phrase.trim();
        let first = trimmed.chars().next()?;
        let last = trimmed.chars().last()?;

        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let start = if is_word(first) { r"\b" } else { "" };
        let end = if is_word(last) { r"\b" } else { "" };

        // Any run of whitespace in the phrase matches any run in the text
        let body = trimmed
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");

        match Regex::new(&format!("(?i){}{}{}", start, body, end)) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(phrase, error = %e, "Skipping banned phrase with invalid pattern");
                None
            }
        }
    }

    fn compiled(&self, phrase: &str) -> Option<Regex> {
        if let Some(re) = self.compiled.read().get(phrase) {
            return Some(re.clone());
        }
        let re = Self::pattern_for(phrase)?;
        self.compiled
            .write()
            .insert(phrase.to_string(), re.clone());
        Some(re)
    }

    /// Number of distinct phrases compiled so far
    pub fn compiled_len(&self) -> usize {
        self.compiled.read().len()
    }
}

impl SlopDetector for RegexSlopDetector {
    fn detect(&self, text: &str, phrases: &[String]) -> Vec<PhraseMatch> {
        let mut matches: Vec<PhraseMatch> = phrases
            .iter()
            .filter_map(|phrase| self.compiled(phrase).map(|re| (phrase, re)))
            .flat_map(|(phrase, re)| {
                re.find_iter(text)
                    .map(|m| PhraseMatch {
                        phrase: phrase.clone(),
                        position: m.start(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        matches.sort_by_key(|m| m.position);
        matches
    }
}

/// Scan `text` with a shared process-wide detector
pub fn detect_banned_phrases(text: &str, phrases: &[String]) -> Vec<PhraseMatch> {
    DEFAULT_DETECTOR.detect(text, phrases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrases(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detects_case_insensitive() {
        let detector = RegexSlopDetector::new();
        let found = detector.detect(
            "This Game-Changer will unlock   your potential",
            &phrases(&["game-changer", "unlock your potential"]),
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].phrase, "game-changer");
        assert_eq!(found[0].position, 5);
        assert_eq!(found[1].phrase, "unlock your potential");
    }

    #[test]
    fn test_respects_word_boundaries() {
        let detector = RegexSlopDetector::new();
        let found = detector.detect("Revolutionary ideas", &phrases(&["revolution"]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_reports_every_occurrence() {
        let detector = RegexSlopDetector::new();
        let found = detector.detect("delve, then delve again", &phrases(&["delve"]));
        let positions: Vec<_> = found.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![0, 12]);
    }

    #[test]
    fn test_non_word_edges() {
        let detector = RegexSlopDetector::new();
        let found = detector.detect("Results guaranteed 100%!", &phrases(&["100%"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position, 19);
    }

    #[test]
    fn test_blank_phrases_ignored() {
        let detector = RegexSlopDetector::new();
        assert!(detector.detect("anything", &phrases(&["", "   "])).is_empty());
        assert_eq!(detector.compiled_len(), 0);
    }

    #[test]
    fn test_patterns_cached() {
        let detector = RegexSlopDetector::new();
        let list = phrases(&["synergy"]);
        detector.detect("synergy", &list);
        detector.detect("more synergy", &list);
        assert_eq!(detector.compiled_len(), 1);
    }

    #[test]
    fn test_shared_detector() {
        let found = detect_banned_phrases("pure synergy", &phrases(&["synergy"]));
        assert_eq!(found[0].position, 5);
    }
}
