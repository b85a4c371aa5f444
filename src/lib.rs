//! Streaming speech-to-text client for the Signans translate API.
//!
//! The [`stt`] module drives a websocket session end to end: it signs a
//! short-lived access token, performs the SET_LANGUAGE / SET_SAMPLING_RATE
//! handshake, paces raw audio to the server in fixed-size binary frames,
//! and surfaces recognition results through async callbacks until the
//! server closes the connection.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use signans_stt::{SttConfig, SttSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SttConfig {
//!         access_key: "your-access-key".to_string(),
//!         secret_key: "your-secret-key".to_string(),
//!         language: "ja".to_string(),
//!         ..SttConfig::default()
//!     };
//!
//!     let mut session = SttSession::new(config)?;
//!     session
//!         .on_result(Arc::new(|result| {
//!             Box::pin(async move {
//!                 println!("[{}] {}", result.status, result.text);
//!             }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
//!         }))
//!         .await;
//!
//!     let audio = tokio::fs::File::open("speech.wav").await?;
//!     session.connect(audio).await?;
//!     session.wait_closed().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod stt;

// Re-export commonly used types
pub use auth::{CredentialError, TokenClaims, issue_token};
pub use config::AppConfig;
pub use stt::{
    CloseSummary, ControlCommand, ErrorCallback, ResultCallback, ServerEvent, SttConfig, SttError,
    SttSession, Transcript,
};
