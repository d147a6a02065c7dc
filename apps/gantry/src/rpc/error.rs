use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the RPC client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Dial, handshake, read or write failure on the underlying socket.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection dropped (or was closed) while the call was in flight,
    /// or the call was issued with no live connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// No reply arrived within the caller-supplied deadline.
    #[error("call timed out")]
    Timeout,

    /// A well-formed error reply from the server.
    #[error("server error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The client is not configured with an endpoint to dial.
    #[error("no server address configured")]
    NoEndpoint,
}

impl RpcError {
    pub fn from_server(err: crate::rpc::protocol::ServerError) -> Self {
        Self::Server {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}
