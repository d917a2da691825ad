use crate::config::ClientOptions;
use crate::error::{CamillaError, Result};
use crate::protocol::{correlate, reply_command, Command, Reply};
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// How long `close` waits for the close frame to be written
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// The command waiting for its reply
struct PendingExchange {
    command: Command,
    reply_tx: oneshot::Sender<Result<Reply>>,
}

/// WebSocket connection state
struct ConnectionState {
    /// At most one exchange is in flight; the protocol has no request ids
    pending: Option<PendingExchange>,
    /// Timed-out commands whose replies may still arrive, oldest first
    late: VecDeque<Command>,
    /// Channel for sending outgoing messages
    ws_tx: mpsc::UnboundedSender<Message>,
}

/// Low-level WebSocket connection to the engine
pub struct Connection {
    state: Arc<Mutex<ConnectionState>>,
    open: Arc<AtomicBool>,
    request_timeout: Option<Duration>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Connect to the engine's websocket server
    pub async fn connect(host: &str, port: u16, options: &ClientOptions) -> Result<Self> {
        let url = format!("ws://{}:{}", host, port);
        tracing::info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let state = Arc::new(Mutex::new(ConnectionState {
            pending: None,
            late: VecDeque::new(),
            ws_tx,
        }));
        let open = Arc::new(AtomicBool::new(true));

        // Forward outgoing messages to the websocket
        let writer_state = state.clone();
        let writer_open = open.clone();
        let writer = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                let closing = msg.is_close();
                if let Err(e) = write.send(msg).await {
                    tracing::error!("Failed to send message: {}", e);
                    Self::mark_closed(&writer_state, &writer_open).await;
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Receive replies and hand them to the waiting caller
        let reader_state = state.clone();
        let reader_open = open.clone();
        let capacity = options.token_capacity;
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        Self::handle_message(&reader_state, &text, capacity).await;
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            Self::mark_closed(&reader_state, &reader_open).await;
        });

        Ok(Self {
            state,
            open,
            request_timeout: options.request_timeout,
            reader,
            writer,
        })
    }

    /// Correlate an incoming frame with the pending exchange
    async fn handle_message(state: &Arc<Mutex<ConnectionState>>, text: &str, capacity: usize) {
        tracing::debug!("Received: {}", text);

        let mut state = state.lock().await;
        if Self::discard_late_reply(&mut state, text, capacity) {
            return;
        }
        let Some(pending) = state.pending.take() else {
            tracing::warn!("Dropping frame received with no command pending: {}", text);
            return;
        };

        let outcome = correlate(pending.command, text, capacity);
        if let Err(e) = &outcome {
            tracing::debug!("{} failed: {}", pending.command, e);
        }
        // The caller may have given up waiting
        let _ = pending.reply_tx.send(outcome);
    }

    /// Consume `text` if it answers a command that already timed out
    ///
    /// The engine answers in order, so a reply to a later command means the
    /// older timed-out commands will never be answered.
    fn discard_late_reply(state: &mut ConnectionState, text: &str, capacity: usize) -> bool {
        if state.late.is_empty() {
            return false;
        }
        let Some(name) = reply_command(text, capacity) else {
            return false;
        };
        while let Some(late) = state.late.pop_front() {
            if late.as_str() == name {
                tracing::debug!("Discarding late reply to {}", late);
                return true;
            }
            tracing::debug!("{} timed out and was never answered", late);
        }
        false
    }

    /// Flag the transport as closed and fail the pending exchange
    async fn mark_closed(state: &Arc<Mutex<ConnectionState>>, open: &AtomicBool) {
        open.store(false, Ordering::SeqCst);
        // Dropping the sender wakes the caller with ConnectionLost
        state.lock().await.pending = None;
    }

    /// Whether the transport is still open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Send `frame` for `command` and wait for the correlated reply
    pub async fn exchange(&self, command: Command, frame: String) -> Result<Reply> {
        let (tx, mut rx) = oneshot::channel();

        {
            let mut state = self.state.lock().await;
            if !self.is_open() {
                return Err(CamillaError::ConnectionLost);
            }
            if let Some(stale) = state.pending.take() {
                tracing::warn!("Abandoning unanswered {}", stale.command);
            }
            state.pending = Some(PendingExchange {
                command,
                reply_tx: tx,
            });

            tracing::debug!("Sending: {}", frame);
            if state.ws_tx.send(Message::Text(frame)).is_err() {
                state.pending = None;
                return Err(CamillaError::ConnectionLost);
            }
        }

        let outcome = match self.request_timeout {
            Some(limit) => match timeout(limit, &mut rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let mut state = self.state.lock().await;
                    // The reply may have landed between the deadline and the lock
                    match rx.try_recv() {
                        Ok(outcome) => return outcome,
                        Err(oneshot::error::TryRecvError::Closed) => {
                            return Err(CamillaError::ConnectionLost)
                        }
                        Err(oneshot::error::TryRecvError::Empty) => {}
                    }
                    state.pending = None;
                    state.late.push_back(command);
                    return Err(CamillaError::Timeout {
                        command: command.to_string(),
                        after: limit,
                    });
                }
            },
            None => rx.await,
        };

        outcome.map_err(|_| CamillaError::ConnectionLost)?
    }

    /// Send a close frame and stop the connection tasks
    ///
    /// The tasks are stopped even when the close frame can't be sent.
    pub async fn close(mut self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        let sent = self.state.lock().await.ws_tx.send(Message::Close(None));

        if sent.is_ok() && timeout(CLOSE_GRACE, &mut self.writer).await.is_err() {
            tracing::warn!("Close frame not flushed within {:?}", CLOSE_GRACE);
        }

        sent.map_err(|_| CamillaError::ConnectionLost)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
