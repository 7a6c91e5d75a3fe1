//! Message framing over byte streams.
//!
//! Messages are newline-delimited JSON: one object per line. For
//! compatibility the reader also accepts `Content-Length:` framed messages,
//! and a server replies in whichever framing the peer used.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{McpError, Result};

const CONTENT_LENGTH: &str = "content-length:";

/// How a message was framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// One JSON object per line.
    #[default]
    Line,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// A single message read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The JSON text.
    pub body: String,
    /// Framing the peer used.
    pub framing: Framing,
}

/// Reads framed messages from a buffered async reader.
pub struct MessageReader<R> {
    inner: R,
    line: String,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    /// Wrap a buffered reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
        }
    }

    /// Read the next message. Returns `None` at end of stream.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed
                .get(..CONTENT_LENGTH.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CONTENT_LENGTH))
            {
                let length: usize = trimmed[CONTENT_LENGTH.len()..]
                    .trim()
                    .parse()
                    .map_err(|e| McpError::protocol(format!("invalid Content-Length: {}", e)))?;
                let body = self.read_body(length).await?;
                return Ok(Some(Frame {
                    body,
                    framing: Framing::ContentLength,
                }));
            }

            tracing::trace!(json = %trimmed, "received MCP message");
            return Ok(Some(Frame {
                body: trimmed.to_string(),
                framing: Framing::Line,
            }));
        }
    }

    async fn read_body(&mut self, length: usize) -> Result<String> {
        // Skip remaining headers up to the blank separator line.
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line).await? == 0 {
                return Err(McpError::ConnectionClosed);
            }
            if self.line.trim().is_empty() {
                break;
            }
        }

        let mut body = vec![0u8; length];
        self.inner.read_exact(&mut body).await?;
        let body = String::from_utf8(body)
            .map_err(|e| McpError::protocol(format!("invalid UTF-8 in message: {}", e)))?;

        tracing::trace!(content_length = length, json = %body, "received MCP message");
        Ok(body)
    }
}

/// Serialize `message` and write it with the given framing, then flush.
pub async fn write_message<W, T>(writer: &mut W, message: &T, framing: Framing) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(message)?;
    match framing {
        Framing::Line => {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", json.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(json.as_bytes()).await?;
        }
    }
    writer.flush().await?;

    tracing::trace!(json = %json, "sent MCP message");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_reads_line_delimited_messages() {
        let input: &[u8] = b"{\"a\":1}\n\n{\"b\":2}\n";
        let mut reader = MessageReader::new(BufReader::new(input));

        let first = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(first.body, "{\"a\":1}");
        assert_eq!(first.framing, Framing::Line);

        let second = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(second.body, "{\"b\":2}");

        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_content_length_messages() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let input = format!(
            "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n{}",
            body.len(),
            body
        );
        let mut reader = MessageReader::new(BufReader::new(input.as_bytes()));

        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.body, body);
        assert_eq!(frame.framing, Framing::ContentLength);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let input: &[u8] = b"Content-Length: lots\r\n\r\n{}";
        let mut reader = MessageReader::new(BufReader::new(input));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_write_line_framing() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({"id": 1}), Framing::Line)
            .await
            .unwrap();
        assert_eq!(out, b"{\"id\":1}\n");
    }

    #[tokio::test]
    async fn test_write_content_length_framing() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({"id": 1}), Framing::ContentLength)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Content-Length: 8\r\n\r\n{\"id\":1}");
    }
}
