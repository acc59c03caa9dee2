//! Classifier: assigns each message an importance class, purely as a
//! function of that single message.

use crate::message::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Importance tier, ordered `Anchor > Important > Contextual > Routine >
/// Transient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Transient,
    Routine,
    Contextual,
    Important,
    Anchor,
}

/// Result of classifying a single message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub class: Class,
    pub importance: f64,
    pub reasons: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl Classification {
    fn new(class: Class, importance: f64) -> Self {
        Self {
            class,
            importance,
            reasons: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

const CORRECTION_CUES: &[&str] = &["actually", "correction", "instead", "that's wrong", "no, "];

const DDL_MARKERS: &[&str] = &[
    "create table",
    "alter table",
    "drop table",
    "create index",
    "create schema",
    "drop schema",
];

const QUERY_PLAN_CUES: &[&str] = &["explain", "query plan", "execution time", "index scan", "sequential scan"];

const INSIGHT_CUES: &[&str] = &["key finding", "important:", "note:", "warning:", "recommendation"];

const DOC_CUES: &[&str] = &["documentation:", "from docs", "postgresql.org"];

const TRANSIENT_PHRASES: &[&str] = &["ok", "yes", "no", "thanks", "got it", "sure", "k"];

const TRANSIENT_LENGTH_THRESHOLD: usize = 8;

/// Classifies messages using construction-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    preserve_tool_results: bool,
    preserve_schema_info: bool,
}

impl Classifier {
    pub fn new(preserve_tool_results: bool) -> Self {
        Self {
            preserve_tool_results,
            preserve_schema_info: false,
        }
    }

    /// Also treats schema-introspection tool calls as anchors when
    /// `preserve_schema_info` is set, independent of `preserve_tool_results`.
    pub fn with_preserve_schema_info(mut self, preserve_schema_info: bool) -> Self {
        self.preserve_schema_info = preserve_schema_info;
        self
    }

    /// Classify a single message. Deterministic and dependent only on
    /// `message`.
    pub fn classify(&self, message: &Message) -> Classification {
        let text = message.text();
        let lower = text.to_lowercase();

        if let Some(c) = self.try_anchor(message, &lower) {
            return c;
        }
        if let Some(c) = self.try_important(message, &lower) {
            return c;
        }
        if let Some(c) = Self::try_transient(message, &lower) {
            return c;
        }
        if Self::is_contextual_question(message, &text) {
            return Classification::new(Class::Contextual, 0.5).with_reason("user question");
        }

        Classification::new(Class::Routine, 0.2)
    }

    fn try_anchor(&self, message: &Message, lower: &str) -> Option<Classification> {
        if message.role == Role::User {
            for cue in CORRECTION_CUES {
                if lower.contains(cue) {
                    return Some(
                        Classification::new(Class::Anchor, 1.0)
                            .with_reason(format!("correction cue '{cue}'")),
                    );
                }
            }
        }
        if message.role == Role::Assistant {
            for marker in DDL_MARKERS {
                if lower.contains(marker) {
                    return Some(
                        Classification::new(Class::Anchor, 1.0).with_reason(format!("DDL marker '{marker}'")),
                    );
                }
            }
            if (self.preserve_tool_results || self.preserve_schema_info)
                && message
                    .tool_names()
                    .iter()
                    .any(|n| n.to_lowercase().contains("schema"))
            {
                return Some(
                    Classification::new(Class::Anchor, 1.0).with_reason("schema-introspection tool use"),
                );
            }
        }
        None
    }

    fn try_important(&self, message: &Message, lower: &str) -> Option<Classification> {
        if message.role == Role::System {
            return Some(Classification::new(Class::Important, 0.8).with_reason("system message"));
        }
        if message.role == Role::Assistant {
            for cue in QUERY_PLAN_CUES {
                if lower.contains(cue) {
                    return Some(
                        Classification::new(Class::Important, 0.75).with_reason(format!("query-plan cue '{cue}'")),
                    );
                }
            }
            if lower.contains("error") || Self::contains_sqlstate(lower) {
                return Some(Classification::new(Class::Important, 0.75).with_reason("error marker"));
            }
            for cue in INSIGHT_CUES {
                if lower.contains(cue) {
                    return Some(
                        Classification::new(Class::Important, 0.7).with_reason(format!("insight cue '{cue}'")),
                    );
                }
            }
            for cue in DOC_CUES {
                if lower.contains(cue) {
                    return Some(
                        Classification::new(Class::Important, 0.7).with_reason(format!("documentation cue '{cue}'")),
                    );
                }
            }
            if self.preserve_tool_results && message.has_tool_use() {
                return Some(Classification::new(Class::Important, 0.7).with_reason("non-schema tool use"));
            }
        }
        None
    }

    fn contains_sqlstate(lower: &str) -> bool {
        // SQLSTATE codes are 5 alphanumeric characters; look for the literal
        // marker rather than attempting full grammar recognition.
        lower.contains("sqlstate")
    }

    fn try_transient(message: &Message, lower: &str) -> Option<Classification> {
        let trimmed = lower.trim();
        if message.role == Role::User && TRANSIENT_PHRASES.contains(&trimmed) {
            return Some(Classification::new(Class::Transient, 0.1).with_reason("transient acknowledgement"));
        }
        if message.text().chars().count() < TRANSIENT_LENGTH_THRESHOLD {
            return Some(Classification::new(Class::Transient, 0.1).with_reason("short message, no cue"));
        }
        None
    }

    fn is_contextual_question(message: &Message, text: &str) -> bool {
        message.role == Role::User && text.chars().count() > 20
    }
}
