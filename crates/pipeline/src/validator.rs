//! Deterministic output validation
//!
//! Rule sets are keyed by task id. Structural problems are errors and fail
//! the task; quality findings (length, evidence, banned phrases, continuity)
//! are warnings and never do.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::sync::Arc;

use content_engine_config::{constants::task_ids, Configuration};
use content_engine_core::{SlopDetector, ValidationOutcome};
use content_engine_text_processing::RegexSlopDetector;

/// Fields every idea must carry
pub const IDEA_FIELDS: [&str; 5] = ["headline", "angle", "audience", "format", "rationale"];

/// Copy blocks with their inclusive character ranges
pub const COPY_BLOCKS: [(&str, usize, usize); 5] = [
    ("hook", 40, 160),
    ("problem", 80, 400),
    ("insight", 80, 400),
    ("proof", 60, 360),
    ("cta", 20, 120),
];

/// Required image brief aspect ratio
pub const IMAGE_ASPECT_RATIO: &str = "4:5";

/// Minimum fraction of the frame kept free at top and bottom
pub const MIN_SAFE_ZONE: f64 = 0.15;

pub const IMAGE_FIELDS: [&str; 3] = ["visual_concept", "composition", "style"];

pub const REVIEW_FIELDS: [&str; 2] = ["summary", "verdict"];
pub const REVIEW_LIST_FIELDS: [&str; 4] = ["strengths", "weaknesses", "risks", "recommendations"];

/// Built-in rules backed by a shared regex phrase detector
pub static DEFAULT_VALIDATOR: Lazy<TaskValidator> = Lazy::new(TaskValidator::default);

/// Pluggable output validator
pub trait OutputValidator: Send + Sync {
    fn validate(&self, task_id: &str, outputs: &[Value], config: &Configuration) -> ValidationOutcome;
}

/// Collected findings for one validation pass
#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn require_fields(&mut self, obj: &Map<String, Value>, fields: &[&str], at: &str) {
        for field in fields {
            if obj.get(*field).map_or(true, Value::is_null) {
                self.error(format!("{}: missing required field '{}'", at, field));
            }
        }
    }

    fn finish(self) -> ValidationOutcome {
        ValidationOutcome::from_findings(self.errors, self.warnings)
    }
}

/// Built-in validator for the known task ids
pub struct TaskValidator {
    detector: Arc<dyn SlopDetector>,
}

impl Default for TaskValidator {
    fn default() -> Self {
        Self::new(Arc::new(RegexSlopDetector::new()))
    }
}

impl TaskValidator {
    pub fn new(detector: Arc<dyn SlopDetector>) -> Self {
        Self { detector }
    }

    fn check_evidence(&self, obj: &Map<String, Value>, at: &str, config: &Configuration, out: &mut Findings) {
        let min = config.validation.evidence.min_citations;
        let count = obj
            .get("evidence_refs")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        if count == 0 {
            out.warn(format!("{}: no evidence_refs", at));
        } else if count < min {
            out.warn(format!("{}: {} evidence_refs, expected at least {}", at, count, min));
        }
    }

    fn check_phrases(&self, text: &str, at: &str, config: &Configuration, out: &mut Findings) {
        if config.banned_phrases.is_empty() {
            return;
        }
        for found in self.detector.detect(text, &config.banned_phrases) {
            out.warn(format!(
                "{}: banned phrase '{}' at {}",
                at, found.phrase, found.position
            ));
        }
    }

    fn validate_ideas(&self, outputs: &[Value], config: &Configuration, out: &mut Findings) {
        if let Some(call) = config.call(task_ids::IDEAS) {
            let expected = call.prompt.outputs_expected as usize;
            if outputs.len() != expected {
                out.error(format!("expected {} ideas, got {}", expected, outputs.len()));
            }
        }

        let bounds = config.validation.headline_length;
        for (i, idea) in outputs.iter().enumerate() {
            let at = format!("ideas[{}]", i);
            let Some(obj) = idea.as_object() else {
                out.error(format!("{}: not an object", at));
                continue;
            };
            out.require_fields(obj, &IDEA_FIELDS, &at);
            self.check_evidence(obj, &at, config, out);

            if let Some(headline) = obj.get("headline").and_then(Value::as_str) {
                let len = headline.chars().count();
                if !bounds.contains(len) {
                    out.warn(format!(
                        "{}: headline length {} outside {}..={}",
                        at, len, bounds.min, bounds.max
                    ));
                }
                self.check_phrases(headline, &format!("{}.headline", at), config, out);
            }
        }
    }

    fn validate_copy(&self, outputs: &[Value], config: &Configuration, out: &mut Findings) {
        let Some(obj) = single_object(outputs, "copy", out) else {
            return;
        };
        // Blocks may be nested under "blocks" or sit at the top level
        let blocks = obj.get("blocks").and_then(Value::as_object).unwrap_or(obj);

        for (name, min, max) in COPY_BLOCKS {
            let at = format!("copy.{}", name);
            let Some(block) = blocks.get(name).filter(|b| !b.is_null()) else {
                out.error(format!("{}: missing block", at));
                continue;
            };
            let Some(text) = block.get("text").and_then(Value::as_str) else {
                out.error(format!("{}: missing text", at));
                continue;
            };
            let len = text.chars().count();
            if len < min {
                out.warn(format!("{}: too short ({} < {})", at, len, min));
            } else if len > max {
                out.warn(format!("{}: too long ({} > {})", at, len, max));
            }
            self.check_phrases(text, &at, config, out);
        }

        self.check_evidence(obj, "copy", config, out);

        if obj.get("continuity_flag").and_then(Value::as_bool) == Some(true) {
            out.warn("copy: continuity flagged by model");
        }
        let min_score = config.validation.continuity.min_score;
        if let Some(score) = obj.get("continuity_score").and_then(Value::as_f64) {
            if score < min_score {
                out.warn(format!("copy: continuity score {:.2} below {:.2}", score, min_score));
            }
        }
    }

    fn validate_image_brief(&self, outputs: &[Value], out: &mut Findings) {
        let Some(obj) = single_object(outputs, "image", out) else {
            return;
        };

        match obj.get("aspect_ratio").and_then(Value::as_str) {
            Some(IMAGE_ASPECT_RATIO) => {}
            Some(other) => out.error(format!(
                "image: aspect_ratio must be {}, got {}",
                IMAGE_ASPECT_RATIO, other
            )),
            None => out.error("image: missing required field 'aspect_ratio'"),
        }

        for zone in ["safe_zone_top", "safe_zone_bottom"] {
            match obj.get(zone).and_then(Value::as_f64) {
                Some(v) if v >= MIN_SAFE_ZONE => {}
                Some(v) => out.error(format!("image: {} {} below {}", zone, v, MIN_SAFE_ZONE)),
                None => out.error(format!("image: missing required field '{}'", zone)),
            }
        }

        out.require_fields(obj, &IMAGE_FIELDS, "image");
        if !obj.contains_key("evidence_refs") {
            out.warn("image: no evidence_refs");
        }
    }

    fn validate_review(&self, outputs: &[Value], out: &mut Findings) {
        let Some(obj) = single_object(outputs, "review", out) else {
            return;
        };
        out.require_fields(obj, &REVIEW_FIELDS, "review");
        for field in REVIEW_LIST_FIELDS {
            match obj.get(field) {
                Some(Value::Array(_)) => {}
                Some(_) => out.error(format!("review: '{}' must be an array", field)),
                None => out.error(format!("review: missing required field '{}'", field)),
            }
        }
    }
}

fn single_object<'a>(outputs: &'a [Value], at: &str, out: &mut Findings) -> Option<&'a Map<String, Value>> {
    if outputs.len() != 1 {
        out.error(format!("{}: expected exactly 1 output, got {}", at, outputs.len()));
        return None;
    }
    let obj = outputs[0].as_object();
    if obj.is_none() {
        out.error(format!("{}: output is not an object", at));
    }
    obj
}

impl OutputValidator for TaskValidator {
    fn validate(&self, task_id: &str, outputs: &[Value], config: &Configuration) -> ValidationOutcome {
        let mut findings = Findings::default();
        match task_id {
            task_ids::IDEAS => self.validate_ideas(outputs, config, &mut findings),
            task_ids::COPY => self.validate_copy(outputs, config, &mut findings),
            task_ids::IMAGE_BRIEF => self.validate_image_brief(outputs, &mut findings),
            task_ids::REVIEW_SUMMARY => self.validate_review(outputs, &mut findings),
            _ => findings.warn(format!("no validation rules for task '{}'", task_id)),
        }

        if !findings.warnings.is_empty() {
            tracing::debug!(task_id, warnings = ?findings.warnings, "Validation warnings");
        }
        findings.finish()
    }
}

/// Validate with the built-in rules and the shared phrase detector
pub fn validate_outputs(task_id: &str, outputs: &[Value], config: &Configuration) -> ValidationOutcome {
    DEFAULT_VALIDATOR.validate(task_id, outputs, config)
}
