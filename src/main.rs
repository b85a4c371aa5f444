use std::env;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::info;

use signans_stt::{AppConfig, SttError, SttSession, Transcript};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Handle CLI arguments
    let mut args = env::args();
    let _ = args.next();
    let audio_path = args.next().unwrap_or_else(|| "ja.wav".to_string());
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected argument '{extra}'. Usage: signans-stt [audio-file]");
    }

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;

    let audio = tokio::fs::File::open(&audio_path)
        .await
        .with_context(|| format!("Failed to open audio file '{audio_path}'"))?;

    let mut session = SttSession::new(config.stt_config())?;

    session
        .on_result(Arc::new(|result: Transcript| {
            Box::pin(async move {
                println!("[{}] {}", result.status, result.text);
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        }))
        .await;

    session
        .on_error(Arc::new(|error: SttError| {
            Box::pin(async move {
                eprintln!("Session error: {error}");
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        }))
        .await;

    info!("Streaming '{audio_path}' to the recognition service");
    session.connect(audio).await?;

    let summary = session.wait_closed().await?;
    println!(
        "Session closed. Status code [{}]. Reason [{}].",
        summary
            .code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string()),
        summary.reason.as_deref().unwrap_or("-")
    );

    Ok(())
}
