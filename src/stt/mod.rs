//! Streaming speech-to-text session protocol.
//!
//! The server requires a strict control handshake before it accepts audio:
//! the client selects a speech language, waits for the acknowledgment, then
//! selects a sampling rate and waits again. Only then may binary audio frames
//! flow, paced to model real-time capture, and terminated by an END_STREAM
//! control message. [`SttSession`] drives the whole exchange.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

mod audio;
pub mod client;
pub mod config;
pub mod messages;

pub use client::{CloseSummary, SttSession};
pub use config::SttConfig;
pub use messages::{ControlCommand, MessageAssembler, ServerEvent, Transcript};

use crate::auth::CredentialError;

/// Errors surfaced by a streaming session.
///
/// Handshake-phase errors (`Credential`, `Configuration`, `Connect`) are
/// returned from [`SttSession::connect`]; in-session errors are reported
/// through the error callback and, except for `Transport`, never terminate
/// the session.
#[derive(Error, Debug)]
pub enum SttError {
    /// Token issuance failed before the connection was attempted.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    /// The websocket could not be established.
    #[error("connection error: {0}")]
    Connect(String),
    /// An inbound message was not decodable or lacked required fields.
    #[error("malformed server message: {0}")]
    MalformedMessage(String),
    /// An inbound message carried a discriminant this client does not know.
    #[error("unexpected message type [{0}]")]
    UnexpectedMessageType(String),
    /// The audio source could not be fully read.
    #[error("audio source error: {0}")]
    AudioSource(String),
    /// The server reported a recognition failure for sent audio.
    #[error("recognition error: {0}")]
    Recognition(String),
    /// The channel failed mid-session; the session is terminated.
    #[error("transport error: {0}")]
    Transport(String),
    /// The injected configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Async callback invoked for every recognition result.
pub type ResultCallback =
    Arc<dyn Fn(Transcript) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Async callback invoked for every reported session error.
pub type ErrorCallback =
    Arc<dyn Fn(SttError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
