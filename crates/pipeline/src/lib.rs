//! Content task pipeline
//!
//! This crate turns configuration and kernels into validated task results:
//! - Task spec builders with placeholder substitution and content fingerprints
//! - Output parsing with array unwrapping and code-fence stripping
//! - Deterministic per-task validation with banned-phrase warnings
//! - Task orchestration (single and sequential batch) that never fails
//! - A router-backed executor deriving routing options from configuration

pub mod executor;
pub mod orchestrator;
pub mod parser;
pub mod spec_builder;
pub mod validator;

// Spec builder exports
pub use spec_builder::{
    build_copy_spec, build_ideas_spec, build_image_brief_spec, build_review_spec,
    content_fingerprint, BuildOptions,
};

// Parser exports
pub use parser::parse_outputs;

// Validator exports
pub use validator::{validate_outputs, OutputValidator, TaskValidator};

// Orchestrator exports
pub use orchestrator::{
    generate_run_id, run_task, run_task_batch, BatchTask, RunOptions, TaskExecutor,
};

pub use executor::{route_options_for, RouterExecutor};
