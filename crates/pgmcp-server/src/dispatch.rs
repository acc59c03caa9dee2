//! Method dispatch: turns a parsed JSON-RPC request into a response,
//! shared by the stdio and HTTP transports.

use crate::state::GatewayState;
use pgmcp_core::{CompactionDefaults, CompactionRequest};
use pgmcp_db::{RequestContext, ResourceContent as DbResourceContent};
use pgmcp_protocol::{
    CallToolParams, InitializeResult, JsonRpcRequest, JsonRpcResponse, ListResourcesResult, ListToolsResult,
    McpResource, McpTool, ReadResourceParams, ReadResourceResult, ResourceContent, ToolCallResult, ToolContent,
    INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use serde_json::Value;
use tracing::warn;

const COMPACT_TOOL_NAME: &str = "compact_conversation";

fn compact_tool_definition() -> McpTool {
    McpTool {
        name: COMPACT_TOOL_NAME.to_string(),
        description: Some("Compacts a chat history to fit a token budget without dropping tool-use/tool-result pairs.".to_string()),
        input_schema: Some(serde_json::json!({
            "type": "object",
            "properties": {
                "messages": {"type": "array"},
                "max_tokens": {"type": "integer"},
                "recent_window": {"type": "integer"},
                "keep_anchors": {"type": "boolean"},
                "options": {"type": "object"}
            },
            "required": ["messages"]
        })),
    }
}

/// Dispatches a single JSON-RPC request. Returns `None` for notifications,
/// which expect no response.
pub async fn handle_request(state: &GatewayState, request: JsonRpcRequest, identity_hash: Option<String>) -> Option<JsonRpcResponse> {
    let Some(id) = request.id.clone() else {
        handle_notification(&request);
        return None;
    };

    let result = match request.method.as_str() {
        "initialize" => Ok(serde_json::to_value(handle_initialize(state)).unwrap_or(Value::Null)),
        "tools/list" => Ok(serde_json::to_value(handle_list_tools()).unwrap_or(Value::Null)),
        "tools/call" => handle_call_tool(state, request.params).await,
        "resources/list" => Ok(handle_list_resources(state, identity_hash.as_deref()).await),
        "resources/read" => handle_read_resource(state, request.params, identity_hash).await,
        other => {
            warn!(method = %other, "unknown MCP method");
            return Some(JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("unknown method '{other}'")));
        }
    };

    Some(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err((code, message)) => JsonRpcResponse::failure(id, code, message),
    })
}

fn handle_notification(request: &JsonRpcRequest) {
    tracing::debug!(method = %request.method, "received notification");
}

fn handle_initialize(state: &GatewayState) -> InitializeResult {
    InitializeResult::new(state.name.clone(), state.version.clone())
}

fn handle_list_tools() -> ListToolsResult {
    ListToolsResult {
        tools: vec![compact_tool_definition()],
    }
}

async fn handle_call_tool(state: &GatewayState, params: Option<Value>) -> Result<Value, (i64, String)> {
    let params: CallToolParams = params
        .ok_or_else(|| (INVALID_PARAMS, "missing params".to_string()))
        .and_then(|p| serde_json::from_value(p).map_err(|e| (INVALID_PARAMS, e.to_string())))?;

    if params.name != COMPACT_TOOL_NAME {
        return Err((INTERNAL_ERROR, format!("unknown tool '{}'", params.name)));
    }

    let arguments = with_compaction_defaults(params.arguments.unwrap_or(Value::Null), &state.config.compaction);
    let request: CompactionRequest =
        serde_json::from_value(arguments).map_err(|e| (INVALID_PARAMS, format!("invalid compaction request: {e}")))?;

    let response = state.compactor.compact(request).await;
    let text = serde_json::to_string_pretty(&response).unwrap_or_default();

    let result = ToolCallResult {
        content: vec![ToolContent::Text { text }],
        is_error: false,
    };
    serde_json::to_value(result).map_err(|e| (INTERNAL_ERROR, e.to_string()))
}

async fn handle_list_resources(state: &GatewayState, identity_hash: Option<&str>) -> Value {
    let identity = identity_hash.unwrap_or(pgmcp_db::DEFAULT_IDENTITY);
    let descriptors = state.registry.list(identity).await;
    let resources = descriptors
        .into_iter()
        .map(|d| McpResource {
            uri: d.uri,
            name: d.name,
            description: Some(d.description),
            mime_type: Some(media_type_str(d.media_type).to_string()),
        })
        .collect();
    serde_json::to_value(ListResourcesResult { resources }).unwrap_or(Value::Null)
}

async fn handle_read_resource(
    state: &GatewayState,
    params: Option<Value>,
    identity_hash: Option<String>,
) -> Result<Value, (i64, String)> {
    let params: ReadResourceParams = params
        .ok_or_else(|| (INVALID_PARAMS, "missing params".to_string()))
        .and_then(|p| serde_json::from_value(p).map_err(|e| (INVALID_PARAMS, e.to_string())))?;

    let context = RequestContext::new(identity_hash);
    let content = state.registry.read(&context, &params.uri).await;

    let resource_content = match content {
        DbResourceContent::Body { media_type, data } => ResourceContent {
            uri: params.uri,
            mime_type: Some(media_type_str(media_type).to_string()),
            text: Some(data),
        },
        DbResourceContent::Error { message } => ResourceContent {
            uri: params.uri,
            mime_type: Some("text/plain".to_string()),
            text: Some(format!("error: {message}")),
        },
    };

    serde_json::to_value(ReadResourceResult {
        contents: vec![resource_content],
    })
    .map_err(|e| (INTERNAL_ERROR, e.to_string()))
}

/// Lays the gateway's configured compaction defaults under the caller's
/// tool-call arguments, so an omitted field falls back to the configured
/// value instead of [`CompactionRequest`]'s own hardcoded defaults. Objects
/// merge recursively (covering `options`); any other value type is replaced
/// wholesale by the caller's.
fn with_compaction_defaults(arguments: Value, defaults: &CompactionDefaults) -> Value {
    let defaults = serde_json::to_value(defaults).unwrap_or(Value::Null);
    merge_defaults(defaults, arguments)
}

fn merge_defaults(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(base_value) => merge_defaults(base_value, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

fn media_type_str(media_type: pgmcp_db::MediaType) -> &'static str {
    match media_type {
        pgmcp_db::MediaType::Json => "application/json",
        pgmcp_db::MediaType::Tsv => "text/tab-separated-values",
    }
}
