//! Banned-phrase ("slop") detection trait

use serde::{Deserialize, Serialize};

/// One banned phrase occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseMatch {
    /// The configured phrase that matched
    pub phrase: String,
    /// Byte offset of the match in the scanned text
    pub position: usize,
}

/// Pure phrase detector consumed by the output validator
pub trait SlopDetector: Send + Sync {
    /// Find every configured phrase present in `text`
    fn detect(&self, text: &str, phrases: &[String]) -> Vec<PhraseMatch>;
}

impl<F> SlopDetector for F
where
    F: Fn(&str, &[String]) -> Vec<PhraseMatch> + Send + Sync,
{
    fn detect(&self, text: &str, phrases: &[String]) -> Vec<PhraseMatch> {
        self(text, phrases)
    }
}
