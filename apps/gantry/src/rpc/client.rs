//! JSON-RPC 2.0 client over a persistent WebSocket.
//!
//! One read pump task per live connection demultiplexes inbound frames:
//! responses are delivered into per-call oneshot slots keyed by correlation
//! id, server-initiated notifications go to a bounded channel drained by the
//! UI. Connection loss fails every pending call, fires the disconnect hook
//! exactly once, and kicks off a bounded exponential-backoff reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::rpc::error::RpcError;
use crate::rpc::protocol::{
    response_call_id, InboundFrame, IncomingNotification, RpcRequest,
};
use crate::transport::{self, WsReader, WsWriter};

/// Capacity of the notification channel. The read pump awaits capacity, so a
/// stalled consumer back-pressures socket reads instead of dropping
/// notifications or buffering without bound.
const NOTIFICATION_BUFFER: usize = 64;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Bounded exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

type CallResult = Result<Value, RpcError>;
type Hook = Arc<dyn Fn() + Send + Sync>;

struct ConnState {
    phase: ConnectionState,
    /// Generation counter; a read pump only tears down its own generation,
    /// so a stale pump cannot clobber a newer connection.
    epoch: u64,
    attempts: u32,
    reconnecting: bool,
    closed: bool,
}

struct Inner {
    url: Mutex<Option<Url>>,
    conn: Mutex<ConnState>,
    pending: Mutex<HashMap<u64, oneshot::Sender<CallResult>>>,
    next_id: AtomicU64,
    writer: AsyncMutex<Option<WsWriter>>,
    notify_tx: mpsc::Sender<IncomingNotification>,
    notify_rx: Mutex<Option<mpsc::Receiver<IncomingNotification>>>,
    on_connect: Mutex<Option<Hook>>,
    on_disconnect: Mutex<Option<Hook>>,
    policy: ReconnectPolicy,
}

#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

impl RpcClient {
    pub fn new(url: Option<Url>) -> Self {
        Self::with_policy(url, ReconnectPolicy::default())
    }

    pub fn with_policy(url: Option<Url>, policy: ReconnectPolicy) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_BUFFER);
        Self {
            inner: Arc::new(Inner {
                url: Mutex::new(url),
                conn: Mutex::new(ConnState {
                    phase: ConnectionState::Disconnected,
                    epoch: 0,
                    attempts: 0,
                    reconnecting: false,
                    closed: false,
                }),
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                writer: AsyncMutex::new(None),
                notify_tx,
                notify_rx: Mutex::new(Some(notify_rx)),
                on_connect: Mutex::new(None),
                on_disconnect: Mutex::new(None),
                policy,
            }),
        }
    }

    pub fn url(&self) -> Option<Url> {
        self.inner.url.lock().clone()
    }

    pub fn set_url(&self, url: Url) {
        *self.inner.url.lock() = Some(url);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.conn.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Take the notification receiver. Yields `Some` exactly once.
    pub fn take_notifications(&self) -> Option<mpsc::Receiver<IncomingNotification>> {
        self.inner.notify_rx.lock().take()
    }

    pub fn set_on_connect<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        *self.inner.on_connect.lock() = Some(Arc::new(hook));
    }

    pub fn set_on_disconnect<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        *self.inner.on_disconnect.lock() = Some(Arc::new(hook));
    }

    /// Dial the configured endpoint, start the read pump and fire the
    /// on-connect hook. Idempotent while connected or connecting; fails on
    /// dial/handshake error or after `close`.
    pub async fn connect(&self) -> Result<(), RpcError> {
        {
            let mut conn = self.inner.conn.lock();
            if conn.closed {
                return Err(RpcError::ConnectionClosed);
            }
            match conn.phase {
                ConnectionState::Connected | ConnectionState::Connecting => return Ok(()),
                ConnectionState::Disconnected => conn.phase = ConnectionState::Connecting,
            }
        }

        let url = match self.inner.url.lock().clone() {
            Some(url) => url,
            None => {
                self.inner.conn.lock().phase = ConnectionState::Disconnected;
                return Err(RpcError::NoEndpoint);
            }
        };

        let (writer, reader) = match transport::dial(&url).await {
            Ok(halves) => halves,
            Err(e) => {
                self.inner.conn.lock().phase = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let epoch = {
            let mut conn = self.inner.conn.lock();
            if conn.closed {
                // Closed while the dial was in flight; drop the socket.
                conn.phase = ConnectionState::Disconnected;
                return Err(RpcError::ConnectionClosed);
            }
            conn.phase = ConnectionState::Connected;
            conn.attempts = 0;
            conn.epoch += 1;
            conn.epoch
        };

        *self.inner.writer.lock().await = Some(writer);
        self.spawn_read_pump(reader, epoch);
        self.fire_hook(&self.inner.on_connect);
        info!(%url, "connected");
        Ok(())
    }

    /// Issue a call and suspend until its response arrives or the connection
    /// drops. Safe for concurrent invocation; each call gets a fresh id and
    /// its own reply slot. Unbounded by default; see [`Self::call_with_timeout`].
    pub async fn call(&self, method: &str, params: Value) -> CallResult {
        let (id, rx) = self.register_call();
        if let Err(e) = self.send_request(RpcRequest::call(method, params, id)).await {
            let _ = self.inner.pending.lock().remove(&id);
            return Err(e);
        }
        match rx.await {
            Ok(result) => result,
            // Reply slot dropped without a send; only connection-loss cleanup
            // removes entries without sending, and that sends an error first.
            Err(_) => Err(RpcError::ConnectionClosed),
        }
    }

    /// `call` with a deadline. On timeout the pending entry is removed so
    /// its id cannot collect a stale reply slot.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> CallResult {
        let (id, rx) = self.register_call();
        if let Err(e) = self.send_request(RpcRequest::call(method, params, id)).await {
            let _ = self.inner.pending.lock().remove(&id);
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_) => {
                let _ = self.inner.pending.lock().remove(&id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Fire-and-forget request without a correlation id.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        self.send_request(RpcRequest::notification(method, params))
            .await
    }

    /// Close the connection and fire the disconnect hook. Does not disable
    /// a later `connect`; no automatic reconnect is scheduled.
    pub async fn disconnect(&self) {
        let epoch = self.inner.conn.lock().epoch;
        self.teardown(epoch, false).await;
    }

    /// Terminal close: disconnects and disables any future connect or
    /// reconnect. Safe to call more than once.
    pub async fn close(&self) {
        let epoch = {
            let mut conn = self.inner.conn.lock();
            conn.closed = true;
            conn.epoch
        };
        self.teardown(epoch, false).await;
    }

    fn register_call(&self) -> (u64, oneshot::Receiver<CallResult>) {
        // Monotonic ids are never reused, which trivially keeps them unique
        // among pending calls.
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        let _ = self.inner.pending.lock().insert(id, tx);
        (id, rx)
    }

    async fn send_request(&self, request: RpcRequest) -> Result<(), RpcError> {
        let text = serde_json::to_string(&request)
            .map_err(|e| RpcError::Transport(format!("encode: {e}")))?;
        let mut guard = self.inner.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(RpcError::ConnectionClosed);
        };
        if let Err(e) = transport::send_text(writer, text).await {
            drop(guard);
            // A failed write means the socket is gone even if the read half
            // has not noticed yet.
            let epoch = self.inner.conn.lock().epoch;
            self.teardown(epoch, true).await;
            return Err(e);
        }
        trace!(method = %request.method, id = ?request.id, "sent");
        Ok(())
    }

    fn spawn_read_pump(&self, reader: WsReader, epoch: u64) {
        let client = self.clone();
        let _ = tokio::spawn(async move {
            let mut reader = reader;
            loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => client.handle_frame(&text).await,
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => client.handle_frame(&text).await,
                        Err(_) => warn!("dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) => {
                        debug!("server closed the connection");
                        break;
                    }
                    // Ping/pong are answered by the protocol layer.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("read error: {e}");
                        break;
                    }
                    None => break,
                }
            }
            client.teardown(epoch, true).await;
        });
    }

    async fn handle_frame(&self, text: &str) {
        match InboundFrame::decode(text) {
            Err(e) => warn!("dropping malformed frame: {e}"),
            Ok(InboundFrame::Notification(notification)) => {
                trace!(method = %notification.method, "notification");
                if self.inner.notify_tx.send(notification).await.is_err() {
                    debug!("notification receiver dropped");
                }
            }
            Ok(InboundFrame::Response(response)) => {
                let Some(id) = response_call_id(&response.id) else {
                    warn!(id = ?response.id, "response with non-numeric id");
                    return;
                };
                let slot = self.inner.pending.lock().remove(&id);
                match slot {
                    Some(tx) => {
                        let result = match response.error {
                            Some(err) => Err(RpcError::from_server(err)),
                            None => Ok(response.result.unwrap_or(Value::Null)),
                        };
                        // The caller may have timed out or gone away.
                        let _ = tx.send(result);
                    }
                    None => warn!(id, "no pending call for response id"),
                }
            }
        }
    }

    /// Tear down the connection for `epoch`. No-op for stale epochs or when
    /// already disconnected, which makes the disconnect hook fire exactly
    /// once per transition even when a read error races an explicit close.
    async fn teardown(&self, epoch: u64, schedule_reconnect: bool) {
        {
            let mut conn = self.inner.conn.lock();
            if conn.epoch != epoch || conn.phase == ConnectionState::Disconnected {
                return;
            }
            conn.phase = ConnectionState::Disconnected;
        }

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.close().await;
        }

        let waiters: Vec<_> = self.inner.pending.lock().drain().collect();
        let failed = waiters.len();
        for (_, tx) in waiters {
            let _ = tx.send(Err(RpcError::ConnectionClosed));
        }
        if failed > 0 {
            debug!(failed, "failed pending calls on disconnect");
        }

        info!("disconnected");
        self.fire_hook(&self.inner.on_disconnect);

        if schedule_reconnect {
            self.maybe_spawn_reconnect();
        }
    }

    fn maybe_spawn_reconnect(&self) {
        {
            let mut conn = self.inner.conn.lock();
            if conn.closed || conn.reconnecting || conn.phase != ConnectionState::Disconnected {
                return;
            }
            conn.reconnecting = true;
        }
        let client = self.clone();
        let _ = tokio::spawn(async move { client.reconnect_loop().await });
    }

    /// At most one of these runs at a time, guarded by `reconnecting`.
    async fn reconnect_loop(&self) {
        let policy = self.inner.policy;
        let mut delay = policy.initial_delay;
        loop {
            let attempt = {
                let mut conn = self.inner.conn.lock();
                if conn.closed || conn.phase == ConnectionState::Connected {
                    conn.reconnecting = false;
                    return;
                }
                if conn.attempts >= policy.max_attempts {
                    conn.reconnecting = false;
                    warn!(
                        attempts = conn.attempts,
                        "giving up on reconnection"
                    );
                    return;
                }
                conn.attempts += 1;
                conn.attempts
            };

            debug!(attempt, ?delay, "reconnecting");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(policy.max_delay);

            match self.connect().await {
                Ok(()) => {
                    self.inner.conn.lock().reconnecting = false;
                    return;
                }
                Err(e) => debug!(attempt, "reconnect attempt failed: {e}"),
            }
        }
    }

    fn fire_hook(&self, slot: &Mutex<Option<Hook>>) {
        // Hooks run on their own task so they can never deadlock the read
        // pump, and so a hook may itself call back into the client.
        if let Some(hook) = slot.lock().clone() {
            let _ = tokio::spawn(async move { hook() });
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;

    type ServerWs = WebSocketStream<TcpStream>;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            max_attempts,
        }
    }

    async fn ws_server<F, Fut>(handler: F) -> (Url, tokio::task::JoinHandle<()>)
    where
        F: FnOnce(ServerWs) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            handler(ws).await;
        });
        (Url::parse(&format!("ws://{addr}")).unwrap(), handle)
    }

    async fn read_request(ws: &mut ServerWs) -> Value {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).unwrap();
                }
                Some(Ok(_)) => continue,
                other => panic!("server read failed: {other:?}"),
            }
        }
    }

    async fn send_json(ws: &mut ServerWs, value: Value) {
        ws.send(Message::Text(value.to_string())).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_calls_get_their_own_responses() {
        let (url, server) = ws_server(|mut ws| async move {
            // Collect every request first, then answer in reverse order so
            // correlation cannot pass by accident of ordering.
            let mut requests = Vec::new();
            for _ in 0..4 {
                requests.push(read_request(&mut ws).await);
            }
            for req in requests.iter().rev() {
                send_json(
                    &mut ws,
                    json!({
                        "jsonrpc": "2.0",
                        "id": req["id"],
                        "result": {"method": req["method"]},
                    }),
                )
                .await;
            }
            // Keep the connection open until the client is done.
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        client.connect().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..4 {
            let client = client.clone();
            tasks.push(tokio::spawn(async move {
                let method = format!("test.method_{i}");
                let result = client.call(&method, Value::Null).await.unwrap();
                (method, result)
            }));
        }
        for task in tasks {
            let (method, result) = task.await.unwrap();
            assert_eq!(result["method"], method);
        }

        assert_eq!(client.pending_len(), 0);
        client.close().await;
        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pending_calls_fail_when_the_connection_drops() {
        let (url, _server) = ws_server(|mut ws| async move {
            // Swallow one request, then drop the socket without replying.
            let _ = read_request(&mut ws).await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        client.connect().await.unwrap();

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            client.call("printer.info", Value::Null),
        )
        .await
        .expect("call must not hang past connection loss")
        .unwrap_err();
        assert!(matches!(err, RpcError::ConnectionClosed));
        assert_eq!(client.pending_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reconnect_stops_after_the_attempt_cap() {
        // A listener that accepts raw TCP and hangs up before the WebSocket
        // handshake, counting the dials it sees.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dials = Arc::new(AtomicUsize::new(0));
        let dials_counted = dials.clone();
        let _server = tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let _ = dials_counted.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let url = Url::parse(&format!("ws://{addr}")).unwrap();
        let client = RpcClient::with_policy(Some(url), fast_policy(3));
        assert!(client.connect().await.is_err());

        // The failed explicit connect does not schedule reconnection; a
        // dropped live connection does.
        let (live_url, _live) = ws_server(|_ws| async move {}).await;
        client.set_url(live_url);
        client.connect().await.unwrap();
        let before = dials.load(Ordering::SeqCst);

        // Server hung up immediately; reconnects now dial the dead listener.
        let dead_url = Url::parse(&format!("ws://{addr}")).unwrap();
        client.set_url(dead_url);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(client.state(), ConnectionState::Disconnected);
        let after = dials.load(Ordering::SeqCst);
        assert_eq!(after - before, 3, "one dial per allowed attempt");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn close_is_terminal_and_reentrant() {
        let (url, _server) = ws_server(|mut ws| async move {
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(5));
        client.connect().await.unwrap();
        client.close().await;
        client.close().await;

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(
            client.connect().await,
            Err(RpcError::ConnectionClosed)
        ));
        assert!(matches!(
            client.call("printer.info", Value::Null).await,
            Err(RpcError::ConnectionClosed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn notifications_arrive_in_wire_order() {
        let (url, _server) = ws_server(|mut ws| async move {
            for i in 0..3 {
                send_json(
                    &mut ws,
                    json!({
                        "jsonrpc": "2.0",
                        "method": "notify_gcode_response",
                        "params": [format!("line {i}")],
                    }),
                )
                .await;
            }
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        let mut notifications = client.take_notifications().unwrap();
        assert!(client.take_notifications().is_none());
        client.connect().await.unwrap();

        for i in 0..3 {
            let n = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(n.method, "notify_gcode_response");
            assert_eq!(n.params[0], format!("line {i}"));
        }
        client.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn call_with_timeout_removes_the_pending_entry() {
        let (url, _server) = ws_server(|mut ws| async move {
            // Read the request and never answer.
            let _ = read_request(&mut ws).await;
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        client.connect().await.unwrap();

        let err = client
            .call_with_timeout("printer.info", Value::Null, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout));
        assert_eq!(client.pending_len(), 0);
        client.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unmatched_and_malformed_frames_are_dropped_not_fatal() {
        let (url, _server) = ws_server(|mut ws| async move {
            let req = read_request(&mut ws).await;
            ws.send(Message::Text("not json at all".into())).await.unwrap();
            send_json(&mut ws, json!({"jsonrpc": "2.0", "id": 424242, "result": 1})).await;
            send_json(
                &mut ws,
                json!({"jsonrpc": "2.0", "id": req["id"], "result": "survived"}),
            )
            .await;
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        client.connect().await.unwrap();
        let result = client.call("server.info", Value::Null).await.unwrap();
        assert_eq!(result, json!("survived"));
        client.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn server_errors_come_back_typed() {
        let (url, _server) = ws_server(|mut ws| async move {
            let req = read_request(&mut ws).await;
            send_json(
                &mut ws,
                json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": {"code": -32601, "message": "Method not found"},
                }),
            )
            .await;
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        client.connect().await.unwrap();
        match client.call("no.such.method", Value::Null).await {
            Err(RpcError::Server { code, message, .. }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        client.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disconnect_hook_fires_exactly_once_per_transition() {
        let (url, _server) = ws_server(|mut ws| async move {
            let _ = read_request(&mut ws).await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        let disconnects = Arc::new(AtomicUsize::new(0));
        let counted = disconnects.clone();
        client.set_on_disconnect(move || {
            let _ = counted.fetch_add(1, Ordering::SeqCst);
        });

        client.connect().await.unwrap();
        // Trigger the server-side drop, then race an explicit close on top.
        let _ = client.call("printer.info", Value::Null).await;
        client.close().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_is_idempotent_while_connected() {
        let (url, _server) = ws_server(|mut ws| async move {
            let _ = ws.next().await;
        })
        .await;

        let client = RpcClient::with_policy(Some(url), fast_policy(0));
        let connects = Arc::new(AtomicUsize::new(0));
        let counted = connects.clone();
        client.set_on_connect(move || {
            let _ = counted.fetch_add(1, Ordering::SeqCst);
        });

        client.connect().await.unwrap();
        client.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        client.close().await;
    }
}
