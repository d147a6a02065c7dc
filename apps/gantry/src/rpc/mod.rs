pub mod client;
pub mod error;
pub mod protocol;

pub use client::{ConnectionState, ReconnectPolicy, RpcClient};
pub use error::RpcError;
pub use protocol::{IncomingNotification, InboundFrame, RpcRequest, RpcResponse, ServerError};
