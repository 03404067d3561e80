//! Exact-length binary payloads in either direction.
//!
//! The protocol declares the payload length up front, so both directions
//! move exactly that many bytes and treat an early end of stream as a
//! failed transfer. A read or write that returns zero bytes counts as
//! the end of the stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::XbdmError;

/// Size of the staging buffer used in both directions.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Copy exactly `length` bytes from `source` into `sink`, then flush.
///
/// Returns the number of bytes moved, which always equals `length` on
/// success. Bytes beyond `length` in `source` are left unread.
pub async fn send_exact<R, W>(source: &mut R, sink: &mut W, length: u64) -> Result<u64, XbdmError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let interrupted = |moved: u64, source: std::io::Error| XbdmError::TransferIo {
        moved,
        expected: length,
        source,
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut moved: u64 = 0;

    while moved < length {
        let want = (length - moved).min(CHUNK_SIZE as u64) as usize;
        let n = source
            .read(&mut buf[..want])
            .await
            .map_err(|e| interrupted(moved, e))?;
        if n == 0 {
            return Err(XbdmError::Transfer {
                moved,
                expected: length,
            });
        }

        let mut written = 0;
        while written < n {
            let w = sink
                .write(&buf[written..n])
                .await
                .map_err(|e| interrupted(moved + written as u64, e))?;
            if w == 0 {
                return Err(XbdmError::Transfer {
                    moved: moved + written as u64,
                    expected: length,
                });
            }
            written += w;
        }

        moved += n as u64;
        trace!(moved, length, "upload progress");
    }

    sink.flush().await.map_err(|e| interrupted(moved, e))?;
    Ok(moved)
}

/// Read exactly `length` bytes, taking them from `buffered` first and
/// from `stream` once the buffer is exhausted.
///
/// `buffered` holds whatever the line reader pulled off the socket past
/// the last decoded line. Bytes beyond `length` stay in it.
pub async fn receive_exact<S>(
    buffered: &mut BytesMut,
    stream: &mut S,
    length: usize,
) -> Result<BytesMut, XbdmError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let take = buffered.len().min(length);
    let mut data = buffered.split_to(take);

    // Grow with the bytes that actually arrive, not with the declared length.
    let mut chunk = vec![0u8; CHUNK_SIZE.min(length - take)];
    while data.len() < length {
        let want = (length - data.len()).min(chunk.len());
        let n = stream
            .read(&mut chunk[..want])
            .await
            .map_err(|source| XbdmError::TransferIo {
                moved: data.len() as u64,
                expected: length as u64,
                source,
            })?;
        if n == 0 {
            return Err(XbdmError::Transfer {
                moved: data.len() as u64,
                expected: length as u64,
            });
        }
        data.extend_from_slice(&chunk[..n]);
        trace!(filled = data.len(), length, "download progress");
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_exact_moves_declared_length() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut source = &data[..];
        let mut sink = Vec::new();

        let moved = send_exact(&mut source, &mut sink, data.len() as u64)
            .await
            .unwrap();
        assert_eq!(moved, data.len() as u64);
        assert_eq!(sink, data);
    }

    #[tokio::test]
    async fn send_exact_stops_at_length() {
        let mut source = &b"0123456789"[..];
        let mut sink = Vec::new();
        send_exact(&mut source, &mut sink, 4).await.unwrap();
        assert_eq!(sink, b"0123");
        assert_eq!(source, &b"456789"[..]);
    }

    #[tokio::test]
    async fn send_exact_short_source_fails() {
        let mut source = &b"abcdefghi"[..];
        let mut sink = Vec::new();
        let err = send_exact(&mut source, &mut sink, 10).await.unwrap_err();
        assert!(matches!(
            err,
            XbdmError::Transfer {
                moved: 9,
                expected: 10
            }
        ));
    }

    #[tokio::test]
    async fn send_exact_zero_length() {
        let mut source = &b""[..];
        let mut sink = Vec::new();
        assert_eq!(send_exact(&mut source, &mut sink, 0).await.unwrap(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn receive_exact_drains_buffer_first() {
        let mut buffered = BytesMut::from(&b"abc"[..]);
        let mut stream = &b"defgh"[..];

        let data = receive_exact(&mut buffered, &mut stream, 6).await.unwrap();
        assert_eq!(&data[..], b"abcdef");
        assert!(buffered.is_empty());
        assert_eq!(stream, &b"gh"[..]);
    }

    #[tokio::test]
    async fn receive_exact_leaves_extra_buffered_bytes() {
        let mut buffered = BytesMut::from(&b"abcdef200- bye\r\n"[..]);
        let mut stream = &b""[..];

        let data = receive_exact(&mut buffered, &mut stream, 6).await.unwrap();
        assert_eq!(&data[..], b"abcdef");
        assert_eq!(&buffered[..], b"200- bye\r\n");
    }

    #[tokio::test]
    async fn receive_exact_short_stream_fails() {
        let mut buffered = BytesMut::from(&b"ab"[..]);
        let mut stream = &b"cd"[..];

        let err = receive_exact(&mut buffered, &mut stream, 5).await.unwrap_err();
        assert!(matches!(
            err,
            XbdmError::Transfer {
                moved: 4,
                expected: 5
            }
        ));
    }

    #[tokio::test]
    async fn send_exact_sink_failure_reports_progress() {
        let mut source = &b"abcdef"[..];
        let mut sink = tokio_test::io::Builder::new()
            .write(b"abc")
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let err = send_exact(&mut source, &mut sink, 6).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transfer);
        match err {
            XbdmError::TransferIo {
                moved: 3,
                expected: 6,
                source,
            } => assert_eq!(source.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn receive_exact_read_failure_reports_progress() {
        let mut buffered = BytesMut::from(&b"ab"[..]);
        let mut stream = tokio_test::io::Builder::new()
            .read(b"cd")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();

        let err = receive_exact(&mut buffered, &mut stream, 8).await.unwrap_err();
        assert!(matches!(
            err,
            XbdmError::TransferIo {
                moved: 4,
                expected: 8,
                ..
            }
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::Transfer);
    }

    #[tokio::test]
    async fn receive_exact_grows_with_arriving_data() {
        let mut buffered = BytesMut::new();
        let mut stream = &b"abcd"[..];

        let err = receive_exact(&mut buffered, &mut stream, 1 << 30)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            XbdmError::Transfer {
                moved: 4,
                expected: 1_073_741_824
            }
        ));
    }
}
