//! CR+LF line framing for the control connection.
//!
//! Bytes that follow a decoded line are left in the framed read buffer;
//! the binary phase of a command drains them before touching the socket.

use bytes::{BufMut, BytesMut};

use crate::error::XbdmError;

/// Line terminator used in both directions.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Longest response line accepted before giving up on the peer.
pub const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, Default, Clone, Copy)]
pub struct XbdmCodec;

impl tokio_util::codec::Decoder for XbdmCodec {
    type Item = String;
    type Error = XbdmError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(newline) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_LINE_LENGTH {
                return Err(XbdmError::MalformedResponse(format!(
                    "line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }
            return Ok(None);
        };

        let line = src.split_to(newline + 1);
        if newline == 0 || line[newline - 1] != b'\r' {
            return Err(XbdmError::MalformedResponse(
                "line not terminated by CR LF".into(),
            ));
        }

        let text = String::from_utf8(line[..newline - 1].to_vec())?;
        Ok(Some(text))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None if buf.is_empty() => Ok(None),
            None => Err(XbdmError::MalformedResponse(format!(
                "unterminated line \"{}\"",
                String::from_utf8_lossy(buf)
            ))),
        }
    }
}

impl tokio_util::codec::Encoder<&str> for XbdmCodec {
    type Error = XbdmError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + LINE_TERMINATOR.len());
        dst.put_slice(item.as_bytes());
        dst.put_slice(LINE_TERMINATOR);
        Ok(())
    }
}
