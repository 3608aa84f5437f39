//! Core traits and types for the content engine
//!
//! This crate provides foundational types used across all other crates:
//! - Provider-neutral task specs and adapter responses
//! - Uniform task results with validation outcome and audit record
//! - Error taxonomy (terminal vs. retryable vs. pipeline)
//! - Traits for pluggable provider adapters and phrase detectors

pub mod error;
pub mod response;
pub mod result;
pub mod task_spec;
pub mod traits;

pub use error::{Error, ErrorKind, Result};
pub use response::{AdapterResponse, FinishReason, ResponseMetadata, TokenUsage};
pub use result::{AuditRecord, TaskError, TaskResult, ValidationOutcome, UNKNOWN};
pub use task_spec::{ResponseFormat, SamplingConstraints, SpecMetadata, TaskSpec};

pub use traits::{PhraseMatch, ProviderAdapter, SlopDetector, SpecValidation};
