//! Text processing for generated content
//!
//! Provides the default banned-phrase ("slop") detector consumed by the
//! output validator.

pub mod slop;

pub use slop::{detect_banned_phrases, RegexSlopDetector};
