//! Error types for the debug monitor client.
//!
//! Every fallible operation returns `Result<T, XbdmError>`. Errors are
//! terminal to the flow that raised them: nothing in this crate retries.

use thiserror::Error;

/// The canonical error type for xbdm operations.
#[derive(Debug, Error)]
pub enum XbdmError {
    // ── Connection Errors ────────────────────────────────────────
    /// Dialing the control port failed.
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the connection while a response was expected.
    #[error("connection closed by remote")]
    ConnectionClosed,

    /// The TCP/IO layer reported an error mid-session.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    // ── Protocol Errors ──────────────────────────────────────────
    /// A status line did not match the expected text.
    #[error("got \"{actual}\", expected \"{expected}\"")]
    Protocol { expected: String, actual: String },

    /// A response line could not be framed or parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // ── Transfer Errors ──────────────────────────────────────────
    /// The binary phase ended before the declared length was reached.
    #[error("short transfer: moved {moved} of {expected} bytes")]
    Transfer { moved: u64, expected: u64 },

    /// An I/O error interrupted the binary phase.
    #[error("transfer interrupted after {moved} of {expected} bytes: {source}")]
    TransferIo {
        moved: u64,
        expected: u64,
        #[source]
        source: std::io::Error,
    },

    // ── Encoding Errors ──────────────────────────────────────────
    /// Image serialization failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Validation Errors ────────────────────────────────────────
    /// A caller-supplied input was rejected before any network activity.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The framebuffer uses a pixel layout this client cannot decode.
    #[error("unsupported pixel format: {0:#x}")]
    UnsupportedPixelFormat(u32),
}

/// Coarse error category, used by front ends to pick exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Protocol,
    Transfer,
    Encoding,
    Validation,
}

impl XbdmError {
    /// Shorthand for a status mismatch.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        XbdmError::Protocol {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            XbdmError::Connect { .. } | XbdmError::ConnectionClosed | XbdmError::Io(_) => {
                ErrorKind::Connection
            }
            XbdmError::Protocol { .. } | XbdmError::MalformedResponse(_) => ErrorKind::Protocol,
            XbdmError::Transfer { .. } | XbdmError::TransferIo { .. } => ErrorKind::Transfer,
            XbdmError::Encoding(_) => ErrorKind::Encoding,
            XbdmError::Validation(_) | XbdmError::UnsupportedPixelFormat(_) => {
                ErrorKind::Validation
            }
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<png::EncodingError> for XbdmError {
    fn from(e: png::EncodingError) -> Self {
        XbdmError::Encoding(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for XbdmError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        XbdmError::MalformedResponse(format!("invalid utf-8: {e}"))
    }
}
