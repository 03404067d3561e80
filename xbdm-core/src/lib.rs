//! # xbdm-core
//!
//! Client for the text protocol spoken by the Xbox debug monitor on TCP
//! port 731.
//!
//! This crate contains:
//! - **Codec**: `XbdmCodec`, CR+LF line framing via `tokio_util`
//! - **Message**: status lines and command requests
//! - **Network**: `Session`, the handshaken control connection
//! - **Transfer**: exact-length binary payloads in both directions
//! - **Framebuffer**: BGRA captures and their PNG encoding
//! - **Protocol**: the `sendfile`, `reboot` and `screenshot` flows
//! - **Error**: `XbdmError`, one `thiserror`-based error type

pub mod codec;
pub mod error;
pub mod framebuffer;
pub mod message;
pub mod network;
pub mod protocol;
pub mod transfer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::XbdmCodec;
pub use error::{ErrorKind, XbdmError};
pub use framebuffer::{FORMAT_BGRA, Framebuffer, PixelFormat};
pub use message::{CONTROL_PORT, Command, Expect, RebootKind, Status};
pub use network::{Session, SessionOptions};
pub use protocol::{
    CommandFlow, Reboot, RemoteDestination, SendFile, Screenshot, ScreenshotHeader,
    ScreenshotRequest, UploadReport, reboot, run, run_on_host, screenshot, send_file,
};
