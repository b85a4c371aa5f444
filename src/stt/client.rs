//! Streaming STT WebSocket session.
//!
//! # Architecture
//!
//! One connection task owns the socket and the protocol state:
//! - The write half never leaves the connection task; control messages and
//!   audio frames are serialized through it, so frame boundaries can never
//!   interleave.
//! - Audio chunks reach the task through a bounded channel (size 32) that
//!   provides backpressure against the paced reader.
//! - Results and errors leave through unbounded channels so reporting never
//!   blocks the event loop; separate tasks forward them to the registered
//!   callbacks.
//! - A oneshot carries the caller's END_SESSION request in; another oneshot
//!   carries the close summary out and releases `wait_closed` exactly once.
//!
//! The protocol handshake is strictly sequential: SET_LANGUAGE is sent when
//! the socket opens, SET_SAMPLING_RATE only after LANGUAGE_READY, and audio
//! only after SAMPLING_RATE_READY. The audio reader is launched on entry to
//! the streaming state and its completion event triggers END_STREAM.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::audio::{self, AudioEvent};
use super::config::SttConfig;
use super::messages::{ControlCommand, MessageAssembler, ServerEvent, Transcript};
use super::{ErrorCallback, ResultCallback, SttError};
use crate::auth;

// =============================================================================
// Type Aliases
// =============================================================================

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Type alias for the stored async result callback.
type AsyncResultCallback = Box<
    dyn Fn(Transcript) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Type alias for the stored async error callback.
type AsyncErrorCallback = Box<
    dyn Fn(SttError) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

// =============================================================================
// Session State
// =============================================================================

/// Protocol state of one session.
///
/// Advanced only by the connection task; the handshake states gate when
/// audio may flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Init,
    LanguagePending,
    SamplingRatePending,
    Streaming,
    Closing,
    Closed,
}

/// Close code and reason reported by the server, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseSummary {
    pub code: Option<u16>,
    pub reason: Option<String>,
}

// =============================================================================
// SttSession Handle
// =============================================================================

/// Handle to one streaming speech-to-text session.
///
/// Register callbacks, then [`connect`](Self::connect) with an audio source;
/// the session streams the audio by itself and closes when the server does.
/// [`wait_closed`](Self::wait_closed) suspends until that point. One handle
/// drives at most one session; to reconnect, create a new handle so a fresh
/// token is signed.
///
/// # Example
///
/// ```rust,no_run
/// use signans_stt::{SttConfig, SttSession};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SttConfig {
///         access_key: "your-access-key".to_string(),
///         secret_key: "your-secret-key".to_string(),
///         ..SttConfig::default()
///     };
///
///     let mut session = SttSession::new(config)?;
///     session
///         .on_result(Arc::new(|result| {
///             Box::pin(async move {
///                 println!("[{}] {}", result.status, result.text);
///             }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
///         }))
///         .await;
///
///     let audio = tokio::fs::File::open("speech.wav").await?;
///     session.connect(audio).await?;
///     let summary = session.wait_closed().await?;
///     println!("closed: {summary:?}");
///     Ok(())
/// }
/// ```
pub struct SttSession {
    /// Session configuration.
    config: SttConfig,

    /// END_SESSION request, consumed by the first call.
    end_tx: Option<oneshot::Sender<()>>,

    /// Close summary, consumed by the first `wait_closed`.
    closed_rx: Option<oneshot::Receiver<CloseSummary>>,

    /// Connection task handle.
    connection_handle: Option<tokio::task::JoinHandle<()>>,

    /// Result forwarding task handle.
    result_forward_handle: Option<tokio::task::JoinHandle<()>>,

    /// Error forwarding task handle.
    error_forward_handle: Option<tokio::task::JoinHandle<()>>,

    /// Shared callback storage for async access.
    result_callback: Arc<Mutex<Option<AsyncResultCallback>>>,

    /// Error callback storage.
    error_callback: Arc<Mutex<Option<AsyncErrorCallback>>>,
}

impl SttSession {
    /// Create a session handle from validated configuration.
    pub fn new(config: SttConfig) -> Result<Self, SttError> {
        config.validate()?;

        Ok(Self {
            config,
            end_tx: None,
            closed_rx: None,
            connection_handle: None,
            result_forward_handle: None,
            error_forward_handle: None,
            result_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
        })
    }

    /// Register the callback invoked for every recognition result.
    pub async fn on_result(&mut self, callback: ResultCallback) {
        *self.result_callback.lock().await = Some(Box::new(move |result| {
            let cb = callback.clone();
            Box::pin(async move {
                cb(result).await;
            })
        }));
    }

    /// Register the callback invoked for every reported error.
    pub async fn on_error(&mut self, callback: ErrorCallback) {
        *self.error_callback.lock().await = Some(Box::new(move |error| {
            let cb = callback.clone();
            Box::pin(async move {
                cb(error).await;
            })
        }));
    }

    /// Open the session and drive the protocol over `source`.
    ///
    /// Signs a fresh token, connects, and returns once the websocket is
    /// established (bounded by the configured connect timeout). The control
    /// handshake and audio streaming then proceed in the background;
    /// progress is observable through the callbacks and
    /// [`wait_closed`](Self::wait_closed).
    pub async fn connect<R>(&mut self, source: R) -> Result<(), SttError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if self.connection_handle.is_some() {
            return Err(SttError::Connect("session already started".to_string()));
        }
        self.config.validate()?;

        // A fresh short-lived token per attempt; never cached or reused.
        let token = auth::issue_token(
            &self.config.access_key,
            &self.config.secret_key,
            self.config.token_ttl,
        )?;
        let session_url = self.config.build_session_url(&token)?;

        let (audio_tx, audio_rx) = mpsc::channel::<AudioEvent>(32);
        let (end_tx, end_rx) = oneshot::channel::<()>();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<Transcript>();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<SttError>();
        let (connected_tx, connected_rx) = oneshot::channel::<Result<(), SttError>>();
        let (closed_tx, closed_rx) = oneshot::channel::<CloseSummary>();

        self.end_tx = Some(end_tx);
        self.closed_rx = Some(closed_rx);

        let config = self.config.clone();
        let connection_handle = tokio::spawn(async move {
            let ws_stream = match connect_async(&session_url).await {
                Ok((ws_stream, _)) => ws_stream,
                Err(e) => {
                    let err = SttError::Connect(format!("failed to open websocket: {e}"));
                    error!("{err}");
                    let _ = connected_tx.send(Err(err));
                    return;
                }
            };

            info!("connected to streaming STT endpoint");
            let _ = connected_tx.send(Ok(()));

            let (ws_sink, ws_stream) = ws_stream.split();
            let driver = SessionDriver {
                config,
                state: SessionState::Init,
                assembler: MessageAssembler::new(),
                sink: ws_sink,
                source: Some(source),
                audio_tx,
                pump_handle: None,
                result_tx,
                error_tx,
            };
            driver.run(ws_stream, audio_rx, end_rx, closed_tx).await;
        });
        self.connection_handle = Some(connection_handle);

        // Forward results to the registered callback.
        let callback_ref = self.result_callback.clone();
        self.result_forward_handle = Some(tokio::spawn(async move {
            while let Some(result) = result_rx.recv().await {
                if let Some(callback) = callback_ref.lock().await.as_ref() {
                    callback(result).await;
                } else {
                    debug!(
                        "recognition result with no callback registered: [{}] {}",
                        result.status, result.text
                    );
                }
            }
        }));

        // Forward errors to the registered callback.
        let error_callback_ref = self.error_callback.clone();
        self.error_forward_handle = Some(tokio::spawn(async move {
            while let Some(err) = error_rx.recv().await {
                if let Some(callback) = error_callback_ref.lock().await.as_ref() {
                    callback(err).await;
                } else {
                    error!("session error with no callback registered: {err}");
                }
            }
        }));

        let outcome = match timeout(self.config.connect_timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(SttError::Connect(
                "connection task exited before the websocket opened".to_string(),
            )),
            Err(_) => Err(SttError::Connect(format!(
                "connection attempt timed out after {:?}",
                self.config.connect_timeout
            ))),
        };

        if outcome.is_err() {
            self.end_tx = None;
            self.closed_rx = None;
            self.abort_tasks();
        }
        outcome
    }

    /// Request an early end of the session.
    ///
    /// Sends `{"command":"END_SESSION"}`, stops the audio reader, and leaves
    /// the session waiting for the server's close. Consumes the request
    /// signal, so a second call is an error.
    pub fn end_session(&mut self) -> Result<(), SttError> {
        match self.end_tx.take() {
            Some(end_tx) => end_tx
                .send(())
                .map_err(|_| SttError::Connect("session is no longer running".to_string())),
            None => Err(SttError::Connect(
                "session not started or already ending".to_string(),
            )),
        }
    }

    /// Suspend until the session reaches its terminal state.
    ///
    /// Released exactly once, by the transport close or error that ends the
    /// session; a second call is an error rather than a hang.
    pub async fn wait_closed(&mut self) -> Result<CloseSummary, SttError> {
        let closed_rx = self.closed_rx.take().ok_or_else(|| {
            SttError::Connect("session not started or already awaited".to_string())
        })?;

        closed_rx.await.map_err(|_| {
            SttError::Transport("session task ended without reporting a close".to_string())
        })
    }

    fn abort_tasks(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.result_forward_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.error_forward_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SttSession {
    fn drop(&mut self) {
        // Best-effort graceful end, then abort whatever is still running.
        if let Some(end_tx) = self.end_tx.take() {
            let _ = end_tx.send(());
        }
        self.abort_tasks();
    }
}

// =============================================================================
// Session Driver
// =============================================================================

/// Owns the write half and the protocol state for one connection.
struct SessionDriver<R> {
    config: SttConfig,
    state: SessionState,
    assembler: MessageAssembler,
    sink: WsSink,
    /// Audio source, consumed when streaming starts.
    source: Option<R>,
    /// Kept so the audio queue never closes before the session does.
    audio_tx: mpsc::Sender<AudioEvent>,
    pump_handle: Option<tokio::task::JoinHandle<()>>,
    result_tx: mpsc::UnboundedSender<Transcript>,
    error_tx: mpsc::UnboundedSender<SttError>,
}

impl<R> SessionDriver<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Run the session event loop until a terminal event.
    async fn run(
        mut self,
        mut stream: WsStream,
        mut audio_rx: mpsc::Receiver<AudioEvent>,
        mut end_rx: oneshot::Receiver<()>,
        closed_tx: oneshot::Sender<CloseSummary>,
    ) {
        let mut summary = CloseSummary::default();
        let mut end_requested = false;

        // The open event itself is the first transition: request the
        // session language before anything else.
        let set_language = ControlCommand::SetLanguage(self.config.language.clone());
        if let Err(e) = self.send_command(set_language).await {
            error!("{e}");
            let _ = self.error_tx.send(e);
            self.shutdown(closed_tx, summary).await;
            return;
        }
        self.state = SessionState::LanguagePending;

        loop {
            tokio::select! {
                Some(event) = audio_rx.recv() => {
                    if let Err(e) = self.handle_audio_event(event).await {
                        error!("{e}");
                        let _ = self.error_tx.send(e);
                        break;
                    }
                }

                message = stream.next() => {
                    match message {
                        Some(Ok(frame)) => match self.handle_frame(frame).await {
                            Ok(Some(close_summary)) => {
                                summary = close_summary;
                                break;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                error!("{e}");
                                let _ = self.error_tx.send(e);
                                break;
                            }
                        },
                        Some(Err(e)) => {
                            let err = SttError::Transport(format!("websocket error: {e}"));
                            error!("{err}");
                            let _ = self.error_tx.send(err);
                            break;
                        }
                        None => {
                            info!("websocket stream ended");
                            break;
                        }
                    }
                }

                end_result = &mut end_rx, if !end_requested => {
                    end_requested = true;
                    // A dropped sender means the handle is gone; keep
                    // draining until the transport closes.
                    if end_result.is_ok() {
                        if let Err(e) = self.handle_end_session().await {
                            error!("{e}");
                            let _ = self.error_tx.send(e);
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown(closed_tx, summary).await;
    }

    /// Handle one inbound frame; returns the close summary on a close frame.
    async fn handle_frame(&mut self, frame: Message) -> Result<Option<CloseSummary>, SttError> {
        match frame {
            Message::Text(text) => {
                // tungstenite reassembles continuation frames before
                // delivery, so every text payload we see is final.
                if let Some(raw) = self.assembler.push(&text, true) {
                    self.dispatch(&raw).await?;
                }
                Ok(None)
            }
            Message::Binary(payload) => {
                debug!(
                    "ignoring unexpected {}-byte binary frame from server",
                    payload.len()
                );
                Ok(None)
            }
            Message::Close(close_frame) => {
                let summary = match close_frame {
                    Some(frame) => {
                        let reason = frame.reason.as_str();
                        CloseSummary {
                            code: Some(u16::from(frame.code)),
                            reason: (!reason.is_empty()).then(|| reason.to_string()),
                        }
                    }
                    None => CloseSummary::default(),
                };
                Ok(Some(summary))
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Handled automatically by tokio-tungstenite.
                Ok(None)
            }
            Message::Frame(_) => {
                // Raw frames, ignore.
                Ok(None)
            }
        }
    }

    /// Decode a complete text payload and advance the state machine.
    ///
    /// Only transport-level send failures are returned as errors; protocol
    /// anomalies are reported and the session continues.
    async fn dispatch(&mut self, raw: &str) -> Result<(), SttError> {
        let event = match ServerEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("dropping undecodable server message: {e} - raw: {raw}");
                let _ = self.error_tx.send(e);
                return Ok(());
            }
        };

        match event {
            ServerEvent::LanguageReady => {
                if self.state == SessionState::LanguagePending {
                    debug!("speech language accepted");
                    let command = ControlCommand::SetSamplingRate(self.config.sample_rate);
                    self.send_command(command).await?;
                    self.state = SessionState::SamplingRatePending;
                } else {
                    warn!("ignoring LANGUAGE_READY in {:?} state", self.state);
                }
            }
            ServerEvent::SamplingRateReady => {
                if self.state == SessionState::SamplingRatePending {
                    debug!("sampling rate accepted, starting audio transmission");
                    self.state = SessionState::Streaming;
                    if let Some(source) = self.source.take() {
                        self.pump_handle = Some(tokio::spawn(audio::pump(
                            source,
                            self.audio_tx.clone(),
                            self.config.chunk_size,
                            self.config.chunk_interval,
                        )));
                    }
                } else {
                    warn!("ignoring SAMPLING_RATE_READY in {:?} state", self.state);
                }
            }
            ServerEvent::RecognitionResult(transcript) => {
                debug!(status = %transcript.status, "recognition result");
                if self.result_tx.send(transcript).is_err() {
                    warn!("failed to deliver recognition result - channel closed");
                }
            }
            ServerEvent::RecognitionError { detail } => {
                let err = SttError::Recognition(
                    detail.unwrap_or_else(|| "server reported a recognition error".to_string()),
                );
                error!("{err}");
                if self.error_tx.send(err).is_err() {
                    warn!("failed to deliver recognition error - channel closed");
                }
            }
            ServerEvent::Unknown(message_type) => {
                warn!("unexpected message type [{message_type}] from server");
                let _ = self
                    .error_tx
                    .send(SttError::UnexpectedMessageType(message_type));
            }
        }

        Ok(())
    }

    /// Handle one event from the audio task.
    async fn handle_audio_event(&mut self, event: AudioEvent) -> Result<(), SttError> {
        match event {
            AudioEvent::Chunk(chunk) => {
                if self.state != SessionState::Streaming {
                    debug!(
                        "discarding {}-byte audio chunk in {:?} state",
                        chunk.len(),
                        self.state
                    );
                    return Ok(());
                }
                debug!("sending {}-byte audio frame", chunk.len());
                self.send_audio(chunk).await?;
            }
            AudioEvent::Finished(result) => {
                if let Err(e) = result {
                    error!("{e}");
                    let _ = self.error_tx.send(e);
                }
                // The completion event arrives after every chunk the task
                // queued, so END_STREAM always follows the final frame.
                if self.state == SessionState::Streaming {
                    self.send_command(ControlCommand::EndStream).await?;
                    self.state = SessionState::Closing;
                } else {
                    debug!(
                        "audio source finished in {:?} state, END_STREAM not sent",
                        self.state
                    );
                }
            }
        }
        Ok(())
    }

    /// The caller asked to end the session early.
    async fn handle_end_session(&mut self) -> Result<(), SttError> {
        match self.state {
            SessionState::Closing | SessionState::Closed => {
                debug!("end of session already in progress");
                Ok(())
            }
            _ => {
                if let Some(handle) = self.pump_handle.take() {
                    handle.abort();
                }
                self.send_command(ControlCommand::EndSession).await?;
                self.state = SessionState::Closing;
                Ok(())
            }
        }
    }

    async fn send_command(&mut self, command: ControlCommand) -> Result<(), SttError> {
        let payload = serde_json::to_string(&command)
            .map_err(|e| SttError::Transport(format!("failed to encode control message: {e}")))?;
        debug!("sending control message: {payload}");
        self.sink
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| SttError::Transport(format!("failed to send control message: {e}")))
    }

    async fn send_audio(&mut self, chunk: Bytes) -> Result<(), SttError> {
        self.sink
            .send(Message::Binary(chunk))
            .await
            .map_err(|e| SttError::Transport(format!("failed to send audio frame: {e}")))
    }

    /// Reach the terminal state and release the waiting caller.
    async fn shutdown(mut self, closed_tx: oneshot::Sender<CloseSummary>, summary: CloseSummary) {
        self.state = SessionState::Closed;
        if let Some(handle) = self.pump_handle.take() {
            handle.abort();
        }
        let _ = self.sink.close().await;
        info!(code = ?summary.code, reason = ?summary.reason, "session closed");
        let _ = closed_tx.send(summary);
    }
}

// =============================================================================
// Tests
// =============================================================================
