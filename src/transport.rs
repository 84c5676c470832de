//! Stdio serving for the MCP handler.
//!
//! rmcp frames messages as newline-delimited JSON. Input lines that are not
//! UTF-8 JSON are logged and dropped before they reach the session, so one
//! corrupt frame cannot end it.

use serde::de::IgnoredAny;
use tokio::io::{
    duplex, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
};

use rmcp::ServiceExt;

use crate::mcp::WeatherMcp;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Returns `line` without surrounding whitespace when it holds one JSON value.
fn json_frame(line: &[u8]) -> Option<&str> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            tracing::warn!("Dropping input line that is not UTF-8: {}", e);
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<IgnoredAny>(text) {
        Ok(_) => Some(text),
        Err(e) => {
            tracing::warn!("Dropping input line that is not JSON: {}", e);
            None
        }
    }
}

/// Copies well-formed JSON lines from `reader` into the returned stream.
pub fn json_lines<R>(reader: R) -> DuplexStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (mut sink, source) = duplex(PIPE_CAPACITY);

    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Reading input failed: {}", e);
                    break;
                }
            }

            let Some(frame) = json_frame(&line) else {
                continue;
            };
            let forwarded = async {
                sink.write_all(frame.as_bytes()).await?;
                sink.write_all(b"\n").await
            };
            if forwarded.await.is_err() {
                break;
            }
        }
        tracing::debug!("Input closed");
    });

    source
}

/// Runs one MCP session over `reader`/`writer` until the peer disconnects.
pub async fn serve_stdio<R, W>(handler: WeatherMcp, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let running = handler.serve((json_lines(reader), writer)).await?;
    let reason = running.waiting().await?;
    tracing::info!("MCP session ended: {:?}", reason);
    Ok(())
}
