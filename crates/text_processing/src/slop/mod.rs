//! Banned-phrase ("slop") detection

mod detector;

pub use detector::{detect_banned_phrases, RegexSlopDetector};
