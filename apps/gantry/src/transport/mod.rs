//! WebSocket transport session: dialing and the raw frame halves.
//!
//! The RPC client owns exactly one of these at a time. Reading is the
//! read pump's exclusive job; writes from concurrent callers are serialized
//! by the client behind an async mutex, since the sink is single-writer.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::rpc::RpcError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWriter = SplitSink<WsStream, Message>;
pub type WsReader = SplitStream<WsStream>;

/// Dial the endpoint and split the stream into its writer and reader halves.
pub async fn dial(url: &Url) -> Result<(WsWriter, WsReader), RpcError> {
    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| RpcError::Transport(format!("dial {url}: {e}")))?;
    Ok(ws_stream.split())
}

/// Send one text frame on the writer half.
pub async fn send_text(writer: &mut WsWriter, text: String) -> Result<(), RpcError> {
    writer
        .send(Message::Text(text))
        .await
        .map_err(|e| RpcError::Transport(format!("write: {e}")))
}
