//! stdio and HTTP transports for the Postgres MCP gateway: both speak the
//! same JSON-RPC dispatch table over [`state::GatewayState`].

pub mod dispatch;
pub mod http;
pub mod state;
pub mod stdio;

pub use http::create_router;
pub use state::GatewayState;
pub use stdio::serve_stdio;
