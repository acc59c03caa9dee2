//! JSON-RPC and MCP wire types shared between both transports.

pub mod error;
pub mod jsonrpc;
pub mod mcp;

pub use error::{McpError, McpResult};
pub use jsonrpc::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use mcp::{
    CallToolParams, ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, ListResourcesResult,
    ListToolsResult, McpResource, McpTool, ReadResourceParams, ReadResourceResult, ResourceContent,
    ResourcesCapability, ServerCapabilities, ServerInfo, ToolCallResult, ToolContent, ToolsCapability,
    PROTOCOL_VERSION,
};
