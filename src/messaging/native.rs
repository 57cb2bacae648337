//! Chrome native messaging framing
//!
//! Every message is a native-endian (little-endian on all supported hosts)
//! `u32` byte length followed by that many bytes of UTF-8 JSON.

use crate::error::{BrowserError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message a host may send to the browser
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;

/// Largest message accepted from the browser
pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;

/// Read one frame. Returns `None` on a clean end of stream between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_INBOUND_BYTES {
        return Err(BrowserError::Transport(format!(
            "Inbound message of {} bytes exceeds {} byte limit",
            len, MAX_INBOUND_BYTES
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| BrowserError::Transport(format!("Truncated message ({} bytes expected): {}", len, e)))?;
    Ok(Some(body))
}

/// Write one frame and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<()> {
    if body.len() > MAX_OUTBOUND_BYTES {
        return Err(BrowserError::Transport(format!(
            "Outbound message of {} bytes exceeds {} byte limit",
            body.len(),
            MAX_OUTBOUND_BYTES
        )));
    }
    let len = u32::try_from(body.len())
        .map_err(|_| BrowserError::Transport(format!("Message too large: {} bytes", body.len())))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<T: DeserializeOwned, R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<T>> {
    match read_frame(reader).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

pub async fn write_message<T: Serialize, W: AsyncWrite + Unpin>(writer: &mut W, message: &T) -> Result<()> {
    let body = serde_json::to_vec(message)?;
    write_frame(writer, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Request;

    #[tokio::test]
    async fn test_frame_layout() {
        let mut out = Vec::new();
        write_frame(&mut out, br#"{"a":1}"#).await.unwrap();
        assert_eq!(&out[..4], &[7, 0, 0, 0]);
        assert_eq!(&out[4..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_read_typed_messages_until_eof() {
        let mut wire = Vec::new();
        write_message(&mut wire, &Request::ScrapeJobDetails).await.unwrap();
        write_message(&mut wire, &Request::GetSettings).await.unwrap();

        let mut reader = wire.as_slice();
        let first: Option<Request> = read_message(&mut reader).await.unwrap();
        let second: Option<Request> = read_message(&mut reader).await.unwrap();
        let end: Option<Request> = read_message(&mut reader).await.unwrap();

        assert_eq!(first, Some(Request::ScrapeJobDetails));
        assert_eq!(second, Some(Request::GetSettings));
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let wire = [10u8, 0, 0, 0, b'{'];
        let mut reader = &wire[..];
        assert!(matches!(read_frame(&mut reader).await, Err(BrowserError::Transport(_))));
    }

    #[tokio::test]
    async fn test_oversized_frames_rejected() {
        let mut out = Vec::new();
        let big = vec![b' '; MAX_OUTBOUND_BYTES + 1];
        assert!(write_frame(&mut out, &big).await.is_err());
        assert!(out.is_empty());

        let header = ((MAX_INBOUND_BYTES + 1) as u32).to_le_bytes();
        let mut reader = &header[..];
        assert!(read_frame(&mut reader).await.is_err());
    }
}
