//! Line-delimited JSON-RPC over stdio, for clients that spawn the gateway
//! as a child process rather than talking HTTP.

use crate::dispatch::handle_request;
use crate::state::GatewayState;
use pgmcp_protocol::{JsonRpcRequest, McpResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

/// Runs the gateway against stdin/stdout until the client disconnects.
/// Every request arrives as a single line of JSON; every response is
/// written back as a single line, in order, never interleaved with a
/// second request (stdio has exactly one caller).
pub async fn serve_stdio(state: GatewayState) -> McpResult<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let mut reader = BufReader::new(stdin);
    let mut writer = BufWriter::new(stdout);

    info!(name = %state.name, "gateway started on stdio");

    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!(line = trimmed, "received request");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                let response = pgmcp_protocol::JsonRpcResponse::parse_error(e.to_string());
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        // Stdio has a single caller identity; there is no bearer token to
        // hash, so every request runs under the default identity.
        if let Some(response) = handle_request(&state, request, None).await {
            write_response(&mut writer, &response).await?;
        }
    }

    Ok(())
}

async fn write_response<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    response: &pgmcp_protocol::JsonRpcResponse,
) -> McpResult<()> {
    let response_json =
        serde_json::to_string(response).map_err(|e| pgmcp_protocol::McpError::protocol_error(e.to_string()))?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
