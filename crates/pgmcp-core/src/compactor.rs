//! Compactor: the orchestrator that turns a chat history plus a token
//! budget into a shorter, structurally valid history.

use crate::cache::CompactionCache;
use crate::classify::{Class, Classifier};
use crate::estimate::{ProviderProfile, TokenEstimator};
use crate::message::{Message, Role};
use crate::summarize::{summarize_basic, summarize_enhanced, Summary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tunable behavior for a single `compact` call, mirroring the external
/// option surface of the gateway's compaction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionOptions {
    pub preserve_tool_results: bool,
    pub preserve_schema_info: bool,
    pub enable_summarization: bool,
    pub min_important_messages: u32,
    pub token_counter_type: ProviderProfile,
    pub enable_llm_summarization: bool,
    pub enable_caching: bool,
    pub cache_ttl: u64,
    pub enable_analytics: bool,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            preserve_tool_results: false,
            preserve_schema_info: false,
            enable_summarization: true,
            min_important_messages: 3,
            token_counter_type: ProviderProfile::Generic,
            enable_llm_summarization: false,
            enable_caching: false,
            cache_ttl: 0,
            enable_analytics: false,
        }
    }
}

/// A request to compact a chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionRequest {
    pub messages: Vec<Message>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_recent_window")]
    pub recent_window: u32,
    #[serde(default = "default_keep_anchors")]
    pub keep_anchors: bool,
    #[serde(default)]
    pub options: CompactionOptions,
}

fn default_max_tokens() -> u32 {
    100_000
}

fn default_recent_window() -> u32 {
    10
}

fn default_keep_anchors() -> bool {
    true
}

/// Aggregate statistics describing the effect of a single compaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompactionInfo {
    pub original_count: usize,
    pub compacted_count: usize,
    pub dropped_count: usize,
    pub anchor_count: usize,
    pub tokens_saved: i64,
    pub compression_ratio: f64,
}

/// Output of a single compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionResponse {
    pub messages: Vec<Message>,
    pub summary: Option<Summary>,
    pub token_estimate: u32,
    pub compaction_info: CompactionInfo,
}

/// Orchestrates cache lookups, classification, selection, pairing repair,
/// summarization, and analytics for a single compaction call.
pub struct Compactor {
    cache: Option<Arc<CompactionCache>>,
    analytics: Option<Arc<crate::analytics::AnalyticsTracker>>,
}

impl Default for Compactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compactor {
    pub fn new() -> Self {
        Self {
            cache: None,
            analytics: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CompactionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<crate::analytics::AnalyticsTracker>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Runs the full compaction pipeline against `request`.
    pub async fn compact(&self, request: CompactionRequest) -> CompactionResponse {
        let CompactionRequest {
            messages,
            max_tokens,
            recent_window,
            keep_anchors,
            options,
        } = request;

        if options.enable_caching {
            if let Some(cache) = &self.cache {
                if let Some(cached) = cache.get(&messages, max_tokens, recent_window).await {
                    return cached;
                }
            }
        }

        let estimator = TokenEstimator::new(options.token_counter_type);
        let response = self.compact_uncached(&messages, max_tokens, recent_window, keep_anchors, &options, &estimator);

        if options.enable_analytics {
            if let Some(analytics) = &self.analytics {
                analytics.record(response.compaction_info).await;
            }
        }

        if options.enable_caching {
            if let Some(cache) = &self.cache {
                cache.set(&messages, max_tokens, recent_window, response.clone()).await;
            }
        }

        response
    }

    fn compact_uncached(
        &self,
        messages: &[Message],
        max_tokens: u32,
        recent_window: u32,
        keep_anchors: bool,
        options: &CompactionOptions,
        estimator: &TokenEstimator,
    ) -> CompactionResponse {
        if messages.is_empty() {
            return CompactionResponse {
                messages: Vec::new(),
                summary: None,
                token_estimate: 0,
                compaction_info: CompactionInfo {
                    original_count: 0,
                    compacted_count: 0,
                    dropped_count: 0,
                    anchor_count: 0,
                    tokens_saved: 0,
                    compression_ratio: 1.0,
                },
            };
        }

        let original_count = messages.len();
        let original_tokens = estimator.estimate_messages(messages);

        let recent_window_usize = recent_window as usize;
        let trivial = original_count <= recent_window_usize + 1 || original_tokens <= max_tokens;
        if trivial {
            return unchanged_response(messages, original_tokens);
        }

        // Partition.
        let mut recent_start = (original_count.saturating_sub(recent_window_usize)).max(1);
        if recent_start < original_count {
            let candidate = &messages[recent_start];
            if candidate.role == Role::User && candidate.has_tool_result() && recent_start > 1 {
                recent_start -= 1;
            }
        }
        let middle = &messages[1..recent_start];
        let recent = &messages[recent_start..];

        // Important selection.
        let classifier = Classifier::new(options.preserve_tool_results).with_preserve_schema_info(options.preserve_schema_info);
        let classifications: Vec<crate::classify::Classification> = middle.iter().map(|m| classifier.classify(m)).collect();

        let mut keep = vec![false; middle.len()];
        for (i, c) in classifications.iter().enumerate() {
            let important = (keep_anchors && c.class == Class::Anchor) || c.class == Class::Important || c.importance >= 0.7;
            if important {
                keep[i] = true;
            }
        }

        let retained_count = keep.iter().filter(|k| **k).count();
        if (retained_count as u32) < options.min_important_messages {
            for (i, c) in classifications.iter().enumerate() {
                if keep[i] {
                    continue;
                }
                if c.class != Class::Transient {
                    keep[i] = true;
                }
                if keep.iter().filter(|k| **k).count() as u32 >= options.min_important_messages {
                    break;
                }
            }
        }

        // Tool-pair repair.
        repair_tool_pairs(middle, &mut keep);

        let important: Vec<Message> = middle
            .iter()
            .zip(keep.iter())
            .filter(|(_, k)| **k)
            .map(|(m, _)| m.clone())
            .collect();
        let dropped: Vec<Message> = middle
            .iter()
            .zip(keep.iter())
            .filter(|(_, k)| !**k)
            .map(|(m, _)| m.clone())
            .collect();

        let anchor = messages[0].clone();
        let mut compacted: Vec<Message> = Vec::with_capacity(1 + important.len() + recent.len());
        compacted.push(anchor);
        compacted.extend(important.iter().cloned());
        compacted.extend(recent.iter().cloned());

        let mut summary = None;
        let mut compacted_tokens = estimator.estimate_messages(&compacted);
        let needs_summary = compacted_tokens > max_tokens || options.enable_summarization;
        if needs_summary && !dropped.is_empty() {
            let computed = if options.enable_llm_summarization {
                summarize_enhanced(&dropped)
            } else {
                summarize_basic(&dropped)
            };
            let summary_message = Message::assistant(computed.description.clone());
            compacted.insert(1, summary_message);
            compacted_tokens = estimator.estimate_messages(&compacted);
            summary = Some(computed);
        }

        let anchor_count = classifications.iter().filter(|c| c.class == Class::Anchor).count() + 1;
        let tokens_saved = original_tokens as i64 - compacted_tokens as i64;
        let compression_ratio = if original_tokens > 0 {
            compacted_tokens as f64 / original_tokens as f64
        } else {
            1.0
        };

        CompactionResponse {
            token_estimate: compacted_tokens,
            compaction_info: CompactionInfo {
                original_count,
                compacted_count: compacted.len(),
                dropped_count: dropped.len(),
                anchor_count,
                tokens_saved,
                compression_ratio,
            },
            messages: compacted,
            summary,
        }
    }
}

fn unchanged_response(messages: &[Message], original_tokens: u32) -> CompactionResponse {
    CompactionResponse {
        messages: messages.to_vec(),
        summary: None,
        token_estimate: original_tokens,
        compaction_info: CompactionInfo {
            original_count: messages.len(),
            compacted_count: messages.len(),
            dropped_count: 0,
            anchor_count: 1,
            tokens_saved: 0,
            compression_ratio: 1.0,
        },
    }
}

/// Ensures every retained `tool_result` message keeps its preceding
/// `tool_use` message and vice versa, scanning until a fixed point.
fn repair_tool_pairs(middle: &[Message], keep: &mut [bool]) {
    loop {
        let mut changed = false;
        for i in 0..middle.len() {
            if !keep[i] {
                continue;
            }
            if middle[i].has_tool_result() && i > 0 && middle[i - 1].has_tool_use() && !keep[i - 1] {
                keep[i - 1] = true;
                changed = true;
            }
            if middle[i].has_tool_use() && i + 1 < middle.len() && middle[i + 1].has_tool_result() && !keep[i + 1] {
                keep[i + 1] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Block;

    fn letters(n: usize) -> Vec<Message> {
        let mut messages = vec![Message::user("Initial question")];
        for i in 0..n {
            messages.push(Message::assistant(format!("Response {i}")));
        }
        messages
    }

    #[tokio::test]
    async fn test_no_op_when_small() {
        let compactor = Compactor::new();
        let request = CompactionRequest {
            messages: vec![Message::user("Hello"), Message::assistant("Hi")],
            max_tokens: 100_000,
            recent_window: 10,
            keep_anchors: true,
            options: CompactionOptions::default(),
        };
        let response = compactor.compact(request).await;
        assert_eq!(response.compaction_info.dropped_count, 0);
        assert_eq!(response.compaction_info.compression_ratio, 1.0);
    }

    #[tokio::test]
    async fn test_recent_window_trim() {
        let compactor = Compactor::new();
        let messages = letters(19);
        let request = CompactionRequest {
            messages: messages.clone(),
            max_tokens: 10,
            recent_window: 5,
            keep_anchors: true,
            options: CompactionOptions::default(),
        };
        let response = compactor.compact(request).await;
        assert_eq!(response.messages[0].text(), messages[0].text());
        assert!(response.compaction_info.compacted_count <= messages.len());
    }

    #[tokio::test]
    async fn test_ddl_anchor_preserved_outside_window() {
        let compactor = Compactor::new();
        let mut messages = vec![Message::user("hi there, a question to pad length")];
        messages.push(Message::assistant("CREATE TABLE users (id INT PRIMARY KEY)"));
        for i in 0..20 {
            messages.push(Message::user(format!("chatter message number {i} padding")));
        }
        let mut options = CompactionOptions::default();
        options.preserve_schema_info = true;
        let request = CompactionRequest {
            messages: messages.clone(),
            max_tokens: 10,
            recent_window: 2,
            keep_anchors: true,
            options,
        };
        let response = compactor.compact(request).await;
        assert!(response.messages.iter().any(|m| m.text().contains("CREATE TABLE")));
    }

    #[tokio::test]
    async fn test_tool_pair_integrity() {
        let compactor = Compactor::new();
        let mut messages = vec![Message::user("Initial question padded out a bit")];
        for i in 0..6 {
            messages.push(Message::assistant(vec![Block::ToolUse {
                name: "get_schema_info".to_string(),
                input: serde_json::json!({"i": i}),
            }]));
            messages.push(Message::user(vec![Block::ToolResult {
                content: crate::message::ToolResultContent::Text(format!("result {i}")),
            }]));
            messages.push(Message::user("some unrelated chatter that pads length out"));
        }
        let request = CompactionRequest {
            messages: messages.clone(),
            max_tokens: 10,
            recent_window: 2,
            keep_anchors: true,
            options: CompactionOptions::default(),
        };
        let response = compactor.compact(request).await;
        for (i, msg) in response.messages.iter().enumerate() {
            if msg.has_tool_result() && i > 0 {
                assert!(response.messages[i - 1].has_tool_use());
            }
        }
    }

    #[tokio::test]
    async fn test_forced_summarization() {
        let compactor = Compactor::new();
        let mut messages = Vec::new();
        for i in 0..10 {
            if i % 2 == 0 {
                messages.push(Message::user(format!(
                    "Tell me about the users table and the employees table, query {i}"
                )));
            } else {
                messages.push(Message::assistant(format!("Here is info about query {i}")));
            }
        }
        let mut options = CompactionOptions::default();
        options.enable_summarization = true;
        let request = CompactionRequest {
            messages,
            max_tokens: 50,
            recent_window: 2,
            keep_anchors: true,
            options,
        };
        let response = compactor.compact(request).await;
        assert!(response.messages.len() <= 2 + 2);
        let summary = response.summary.expect("expected a summary");
        assert!(summary.tables.contains(&"users".to_string()));
        assert!(summary.tables.contains(&"employees".to_string()));
        assert!(summary.description.starts_with("[Compressed context:"));
        assert!(summary.description.trim_end_matches(']').ends_with("messages compressed"));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let compactor = Compactor::new();
        let request = CompactionRequest {
            messages: Vec::new(),
            max_tokens: 100_000,
            recent_window: 10,
            keep_anchors: true,
            options: CompactionOptions::default(),
        };
        let response = compactor.compact(request).await;
        assert!(response.messages.is_empty());
        assert_eq!(response.compaction_info.original_count, 0);
    }

    #[tokio::test]
    async fn test_single_message_unchanged() {
        let compactor = Compactor::new();
        let request = CompactionRequest {
            messages: vec![Message::user("solo")],
            max_tokens: 100_000,
            recent_window: 10,
            keep_anchors: true,
            options: CompactionOptions::default(),
        };
        let response = compactor.compact(request).await;
        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.compaction_info.dropped_count, 0);
    }
}
