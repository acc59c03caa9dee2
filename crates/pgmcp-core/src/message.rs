//! Chat message types for the conversation compactor.
//!
//! A [`Message`] is immutable once received: the compactor only ever
//! reorders, drops, or replaces whole messages, never mutates one in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in a chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// All `Block::Text` content concatenated, in order. Plain-text messages
    /// return their text directly.
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Blocks carried by this message, empty for plain-text messages.
    pub fn blocks(&self) -> &[Block] {
        self.content.blocks()
    }

    /// Whether this message carries at least one `tool_use` block.
    pub fn has_tool_use(&self) -> bool {
        self.blocks().iter().any(|b| matches!(b, Block::ToolUse { .. }))
    }

    /// Whether this message carries at least one `tool_result` block.
    pub fn has_tool_result(&self) -> bool {
        self.blocks()
            .iter()
            .any(|b| matches!(b, Block::ToolResult { .. }))
    }

    /// Names of every tool invoked by a `tool_use` block in this message.
    pub fn tool_names(&self) -> Vec<&str> {
        self.blocks()
            .iter()
            .filter_map(|b| match b {
                Block::ToolUse { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Message content: either plain text, or an ordered sequence of typed
/// blocks (the shape an LLM API uses for tool-bearing turns).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<Block>),
}

impl MessageContent {
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    Block::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    pub fn len_chars(&self) -> usize {
        match self {
            MessageContent::Text(t) => t.chars().count(),
            MessageContent::Blocks(blocks) => blocks.iter().map(Block::extracted_text_len).sum(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<Vec<Block>> for MessageContent {
    fn from(blocks: Vec<Block>) -> Self {
        MessageContent::Blocks(blocks)
    }
}

/// A typed content block within a structured message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text { text: String },
    ToolUse { name: String, input: Value },
    ToolResult { content: ToolResultContent },
}

/// Payload of a `tool_result` block: either raw text or nested text blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<TextBlock>),
}

/// A bare text block, used only inside `ToolResultContent::Blocks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl ToolResultContent {
    pub fn text(&self) -> String {
        match self {
            ToolResultContent::Text(t) => t.clone(),
            ToolResultContent::Blocks(blocks) => {
                blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("")
            }
        }
    }
}

impl Block {
    /// Text the token estimator should count for this block: the tool name
    /// plus serialized input for `tool_use`, the payload text for
    /// `tool_result`, the text itself for `text`.
    pub fn extracted_text(&self) -> String {
        match self {
            Block::Text { text } => text.clone(),
            Block::ToolUse { name, input } => format!("{name} {input}"),
            Block::ToolResult { content } => content.text(),
        }
    }

    fn extracted_text_len(&self) -> usize {
        self.extracted_text().chars().count()
    }
}
