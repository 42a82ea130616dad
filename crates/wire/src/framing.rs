// SPDX-License-Identifier: MIT

//! Wire framing: 4-byte big-endian length prefix + JSON payload (§4.4, §6).

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default cap on a single framed message body, in bytes (§6).
pub const DEFAULT_MAX_MSG_SIZE: u32 = 256 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u32, max: u32 },
    #[error("frame length must be at least 1 byte, got 0")]
    EmptyFrame,
}

/// Serialise `value` to its wire body (JSON), with no length prefix.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialise a wire body previously produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write `body` to `writer` preceded by its 4-byte big-endian length.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<(), ProtocolError> {
    let len = u32::try_from(body.len()).map_err(|_| ProtocolError::FrameTooLarge {
        len: u32::MAX,
        max: DEFAULT_MAX_MSG_SIZE,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame from `reader`, enforcing `max_len`.
/// Tolerates partial reads (`read_exact` loops internally); an oversized
/// length prefix is fatal to the connection (§6 "oversize frames are fatal").
pub async fn read_message_with_limit<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: u32,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// [`read_message_with_limit`] using [`DEFAULT_MAX_MSG_SIZE`].
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    read_message_with_limit(reader, DEFAULT_MAX_MSG_SIZE).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_returns_json_without_length_prefix() {
        let encoded = encode(&"hello").expect("encode failed");
        let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
        assert_eq!(json_str, "\"hello\"");
    }

    #[tokio::test]
    async fn read_write_message_roundtrip() {
        let original = b"hello world";
        let mut buffer = Vec::new();
        write_message(&mut buffer, original).await.expect("write failed");
        assert_eq!(buffer.len(), 4 + original.len());

        let mut cursor = std::io::Cursor::new(buffer);
        let read_back = read_message(&mut cursor).await.expect("read failed");
        assert_eq!(read_back, original);
    }

    #[tokio::test]
    async fn write_message_adds_length_prefix() {
        let data = b"test data";
        let mut buffer = Vec::new();
        write_message(&mut buffer, data).await.expect("write failed");
        let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        assert_eq!(len, data.len());
        assert_eq!(&buffer[4..], data);
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected_before_reading_body() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(DEFAULT_MAX_MSG_SIZE + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buffer);
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn partial_reads_are_tolerated() {
        let data = b"partial read test payload";
        let mut buffer = Vec::new();
        write_message(&mut buffer, data).await.unwrap();

        // A reader that dribbles out one byte at a time still reconstructs the frame.
        struct Dribble(std::io::Cursor<Vec<u8>>);
        impl AsyncRead for Dribble {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                let mut one = [0u8; 1];
                let n = std::io::Read::read(&mut self.0, &mut one).unwrap_or(0);
                if n == 1 {
                    buf.put_slice(&one);
                }
                std::task::Poll::Ready(Ok(()))
            }
        }
        let mut dribble = Dribble(std::io::Cursor::new(buffer));
        let read_back = read_message(&mut dribble).await.unwrap();
        assert_eq!(read_back, data);
    }
}
