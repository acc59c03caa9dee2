//! Summarizer: deterministic extraction of topics, tables, and tools from
//! a dropped slice of messages. Despite the historical name carried over
//! from the basic/enhanced distinction, neither variant calls an external
//! model.

use crate::message::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Extracted summary of a dropped message slice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub topics: Vec<String>,
    pub tables: Vec<String>,
    pub tools: Vec<String>,
    pub description: String,
    pub time_range: Option<(String, String)>,
}

const TABLE_STOP_WORDS: &[&str] = &[
    "select", "from", "where", "join", "inner", "outer", "left", "right", "create", "alter", "drop", "insert",
    "update", "delete", "into", "values",
];

const ACTION_VERBS: &[&str] = &[
    "show", "list", "get", "fetch", "query", "create", "add", "insert", "update", "modify", "delete", "remove",
    "drop", "analyze", "explain", "search", "find", "look", "check", "view",
];

fn extract_topics(middle: &[Message]) -> Vec<String> {
    let mut topics = Vec::new();
    for msg in middle {
        if msg.role != Role::User {
            continue;
        }
        let text = msg.text();
        if text.chars().count() <= 20 {
            continue;
        }
        let prefix: String = text.split_whitespace().take(5).collect::<Vec<_>>().join(" ");
        let truncated: String = prefix.chars().take(80).collect();
        if !truncated.is_empty() && !topics.contains(&truncated) {
            topics.push(truncated);
        }
        if topics.len() == 3 {
            break;
        }
    }
    topics
}

fn extract_tables(middle: &[Message]) -> Vec<String> {
    let mut tables = BTreeSet::new();
    for msg in middle {
        let text = msg.text().to_lowercase();
        let words: Vec<&str> = text.split_whitespace().collect();
        for pair in words.windows(2) {
            if pair[1] == "table" {
                let candidate = pair[0].trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
                if !candidate.is_empty() && !TABLE_STOP_WORDS.contains(&candidate) {
                    tables.insert(candidate.to_string());
                }
            }
        }
    }
    tables.into_iter().collect()
}

fn extract_tools(middle: &[Message]) -> Vec<String> {
    let mut tools = Vec::new();
    for msg in middle {
        for name in msg.tool_names() {
            if !tools.contains(&name.to_string()) {
                tools.push(name.to_string());
            }
        }
    }
    tools
}

fn basic_description(topics: &[String], tables: &[String], tools: &[String], compressed_count: usize) -> String {
    let mut parts = Vec::new();
    if !topics.is_empty() {
        parts.push(format!("Topics: {}", topics.join(", ")));
    }
    if !tables.is_empty() {
        parts.push(format!("Tables: {}", tables.join(", ")));
    }
    if !tools.is_empty() {
        parts.push(format!("Tools used: {}", tools.join(", ")));
    }
    parts.push(format!("{compressed_count} messages compressed"));
    format!("[Compressed context: {}]", parts.join(", "))
}

/// Builds the basic, always-available summary of a dropped message slice.
pub fn summarize_basic(middle: &[Message]) -> Summary {
    let topics = extract_topics(middle);
    let tables = extract_tables(middle);
    let tools = extract_tools(middle);
    let description = basic_description(&topics, &tables, &tools, middle.len());
    Summary {
        topics,
        tables,
        tools,
        description,
        time_range: None,
    }
}

fn extract_actions(middle: &[Message]) -> Vec<String> {
    let mut actions = BTreeSet::new();
    for msg in middle {
        let text = msg.text().to_lowercase();
        for verb in ACTION_VERBS {
            if text.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *verb) {
                actions.insert(verb.to_string());
            }
        }
    }
    actions.into_iter().collect()
}

fn extract_entities(middle: &[Message]) -> Vec<String> {
    let mut entities = BTreeSet::new();
    for msg in middle {
        let text = msg.text().to_lowercase();
        let words: Vec<&str> = text.split_whitespace().collect();
        for pair in words.windows(2) {
            if matches!(pair[0], "table" | "schema" | "database") {
                let candidate = pair[1].trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
                if !candidate.is_empty() {
                    entities.insert(candidate.to_string());
                }
            }
        }
    }
    entities.into_iter().collect()
}

const SQL_SNIPPET_MARKERS: &[&str] = &["select ", "insert into", "update ", "delete from", "create table"];
const MAX_SQL_SNIPPETS: usize = 5;

fn extract_sql_snippets(middle: &[Message]) -> Vec<String> {
    let mut snippets = Vec::new();
    for msg in middle {
        let text = msg.text();
        let lower = text.to_lowercase();
        if SQL_SNIPPET_MARKERS.iter().any(|m| lower.contains(m)) {
            let truncated: String = text.chars().take(100).collect();
            let snippet = if text.chars().count() > 100 {
                format!("{truncated}...")
            } else {
                truncated
            };
            snippets.push(snippet);
            if snippets.len() == MAX_SQL_SNIPPETS {
                break;
            }
        }
    }
    snippets
}

fn count_errors(middle: &[Message]) -> usize {
    middle
        .iter()
        .filter(|m| m.text().to_lowercase().contains("error"))
        .count()
}

/// Enhanced, still-deterministic summary with action/entity/SQL/error
/// extraction layered on top of the basic fields.
pub fn summarize_enhanced(middle: &[Message]) -> Summary {
    let mut summary = summarize_basic(middle);
    let actions = extract_actions(middle);
    let entities = extract_entities(middle);
    let snippets = extract_sql_snippets(middle);
    let errors = count_errors(middle);

    let description = format!(
        "[Enhanced context: Actions: {} | Entities: {} | {} SQL operations | {} errors encountered | Tables: {} | Tools: {} | {} messages compressed]",
        actions.join(", "),
        entities.join(", "),
        snippets.len(),
        errors,
        summary.tables.join(", "),
        summary.tools.join(", "),
        middle.len(),
    );
    summary.description = description;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Block;

    #[test]
    fn test_basic_summary_description_format() {
        let middle = vec![
            Message::user("Can you show me the schema for the users table please"),
            Message::assistant(vec![Block::ToolUse {
                name: "get_schema_info".to_string(),
                input: serde_json::json!({"table": "users"}),
            }]),
        ];
        let summary = summarize_basic(&middle);
        assert!(summary.description.starts_with("[Compressed context:"));
        assert!(summary.description.ends_with("messages compressed]"));
        assert!(summary.tools.contains(&"get_schema_info".to_string()));
    }

    #[test]
    fn test_table_extraction_excludes_stop_words() {
        let middle = vec![Message::user(
            "select from the users table, also check the orders table",
        )];
        let summary = summarize_basic(&middle);
        assert!(summary.tables.contains(&"users".to_string()));
        assert!(summary.tables.contains(&"orders".to_string()));
        assert!(!summary.tables.iter().any(|t| t == "from"));
    }

    #[test]
    fn test_topics_truncated_to_three() {
        let middle: Vec<Message> = (0..10)
            .map(|i| Message::user(format!("This is a sufficiently long question number {i} about data")))
            .collect();
        let summary = summarize_basic(&middle);
        assert!(summary.topics.len() <= 3);
    }

    #[test]
    fn test_enhanced_summary_includes_error_count() {
        let middle = vec![
            Message::assistant("The query failed with an error: timeout"),
            Message::user("please retry"),
        ];
        let summary = summarize_enhanced(&middle);
        assert!(summary.description.contains("1 errors encountered"));
    }

    #[test]
    fn test_enhanced_summary_is_deterministic() {
        let middle = vec![Message::user("please delete from the archive table")];
        let a = summarize_enhanced(&middle);
        let b = summarize_enhanced(&middle);
        assert_eq!(a.description, b.description);
    }
}
