//! Paced audio transmission.
//!
//! The pump reads the audio source in fixed-size chunks and forwards them to
//! the session driver through a bounded queue, sleeping between consecutive
//! chunks to model real-time capture. It never touches the socket itself;
//! the driver owns the write half and drains the queue, so control messages
//! and audio frames stay serialized on the wire.
//!
//! The final [`AudioEvent::Finished`] event is delivered on every exit path,
//! normal or failed, so the driver can emit END_STREAM exactly once.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;

use super::SttError;

/// Events flowing from the audio task to the session driver.
#[derive(Debug)]
pub(crate) enum AudioEvent {
    /// One audio chunk in source order. Every chunk is exactly the
    /// configured size except possibly the last.
    Chunk(Bytes),
    /// The source is exhausted or failed reading; always the final event.
    Finished(Result<(), SttError>),
}

/// Stream `source` as paced chunks, then signal completion.
pub(crate) async fn pump<R>(
    mut source: R,
    tx: mpsc::Sender<AudioEvent>,
    chunk_size: usize,
    interval: Duration,
) where
    R: AsyncRead + Unpin,
{
    let result = stream_chunks(&mut source, &tx, chunk_size, interval).await;
    if tx.send(AudioEvent::Finished(result)).await.is_err() {
        debug!("session ended before the audio completion signal was delivered");
    }
}

async fn stream_chunks<R>(
    source: &mut R,
    tx: &mpsc::Sender<AudioEvent>,
    chunk_size: usize,
    interval: Duration,
) -> Result<(), SttError>
where
    R: AsyncRead + Unpin,
{
    let mut sent_any = false;
    loop {
        let chunk = fill_chunk(source, chunk_size)
            .await
            .map_err(|e| SttError::AudioSource(format!("failed to read audio source: {e}")))?;
        if chunk.is_empty() {
            break;
        }
        if sent_any {
            sleep(interval).await;
        }
        debug!("read {}-byte audio chunk", chunk.len());
        if tx.send(AudioEvent::Chunk(chunk)).await.is_err() {
            debug!("audio channel closed, stopping transmission");
            break;
        }
        sent_any = true;
    }
    Ok(())
}

/// Read until `chunk_size` bytes are collected or the source ends.
///
/// Sources are not required to fill the buffer in one read, so short reads
/// are accumulated; only the final chunk of a stream may be undersized.
async fn fill_chunk<R>(source: &mut R, chunk_size: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let read = source.read(&mut chunk[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    chunk.truncate(filled);
    Ok(Bytes::from(chunk))
}
