//! The `[u32 length_be][payload]` length-prefix codec shared by every
//! stream transport (TCP, stdio-binary).
//!
//! A message body's length is sanity-checked against [`MAX_MESSAGE_SIZE`]
//! before any allocation is made for it, so a hostile or corrupt peer can't
//! make a reader allocate an unbounded buffer from a forged length prefix.

use mcp_transport_traits::{TransportError, TransportResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use mcp_protocol::MAX_MESSAGE_SIZE;

/// Reads exactly one length-prefixed frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF before any byte of the length prefix
/// has been read (graceful peer close between messages). An EOF after the
/// prefix but before the body is a [`TransportError::ConnectionLost`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> TransportResult<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::Io(e.to_string())),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_MESSAGE_SIZE {
        return Err(TransportError::ProtocolError(format!(
            "frame length {len} outside bounds (0, {MAX_MESSAGE_SIZE}]"
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionLost(format!(
                "peer closed mid-body, expected {len} bytes"
            ))
        } else {
            TransportError::Io(e.to_string())
        }
    })?;
    Ok(Some(body))
}

/// Writes `payload` to `writer` as a single length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> TransportResult<()> {
    if payload.is_empty() || payload.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::ProtocolError(format!(
            "frame length {} outside bounds (0, {MAX_MESSAGE_SIZE}]",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::ProtocolError("frame too large for u32 prefix".into()))?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        assert_eq!(&buf[..4], &5u32.to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn clean_eof_before_prefix_is_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_body_is_connection_lost() {
        let mut buf = 10u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"short");
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn oversize_prefix_is_rejected() {
        let buf = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes().to_vec();
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransportError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn zero_length_prefix_is_rejected() {
        let buf = 0u32.to_be_bytes().to_vec();
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransportError::ProtocolError(_)));
    }
}
