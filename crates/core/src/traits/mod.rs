//! Core traits for the content engine
//!
//! Components behind these traits are pluggable so the pipeline can be
//! exercised with mocks and switched by configuration:
//!
//! ```text
//! Providers:
//!   - ProviderAdapter: TaskSpec → AdapterResponse for one provider
//!
//! Text Processing:
//!   - SlopDetector: banned/cliché phrase detection
//! ```

mod adapter;
mod slop;

pub use adapter::{ProviderAdapter, SpecValidation};
pub use slop::{PhraseMatch, SlopDetector};
