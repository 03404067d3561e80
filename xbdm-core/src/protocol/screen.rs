//! Framebuffer capture.
//!
//! # Wire Protocol
//!
//! ```text
//! Client ──screenshot───────────────────────────────────────────► Console
//! Client ◄──203- binary response follows────────────────────────── Console
//! Client ◄──pitch=0x.. width=0x.. height=0x.. format=0x.., framebuffersize=0x..
//! Client ◄──<framebuffersize raw bytes>──────────────────────────── Console
//! ```
//!
//! The raw bytes follow the header line on the same stream, so part of
//! them may already sit in the line reader's buffer.

use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use super::{CommandFlow, run_on_host};
use crate::error::XbdmError;
use crate::framebuffer::{Framebuffer, PixelFormat};
use crate::message::{Command, Expect};
use crate::network::{Session, SessionOptions};

/// `strftime` pattern for captures saved without an explicit name.
pub const DEFAULT_NAME_FORMAT: &str = "xbss-%Y-%m-%d_%H-%M-%S%.3f.png";

/// Largest capture accepted from a header. Well above any console mode
/// (1920x1080 BGRA is under 8 MiB).
pub const MAX_FRAMEBUFFER_SIZE: u32 = 32 * 1024 * 1024;

// ── Header ───────────────────────────────────────────────────────

/// Geometry line sent between the status and the raw capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotHeader {
    /// Bytes per row, padding included.
    pub pitch: u32,
    pub width: u32,
    pub height: u32,
    /// Wire pixel format identifier.
    pub format: u32,
    /// Total bytes that follow the header.
    pub framebuffer_size: u32,
}

impl ScreenshotHeader {
    const KEYS: [&'static str; 5] = ["pitch", "width", "height", "format", "framebuffersize"];

    /// Parse `pitch=0x.. width=0x.. height=0x.. format=0x.., framebuffersize=0x..`.
    ///
    /// Keys must appear in that order. Trailing fields are ignored.
    pub fn parse(line: &str) -> Result<Self, XbdmError> {
        let malformed = |what: String| XbdmError::MalformedResponse(format!("{what} in \"{line}\""));

        let mut values = [0u32; 5];
        let mut fields = line.split_whitespace();
        for (key, slot) in Self::KEYS.iter().zip(values.iter_mut()) {
            let field = fields
                .next()
                .ok_or_else(|| malformed(format!("missing {key}")))?
                .trim_end_matches(',');

            let (name, value) = field
                .split_once('=')
                .ok_or_else(|| malformed(format!("field \"{field}\" has no value")))?;
            if name != *key {
                return Err(malformed(format!("expected {key}, found {name}")));
            }

            let digits = value
                .strip_prefix("0x")
                .or_else(|| value.strip_prefix("0X"))
                .ok_or_else(|| malformed(format!("{key} value \"{value}\" is not hex")))?;
            *slot = u32::from_str_radix(digits, 16)
                .map_err(|e| malformed(format!("{key} value \"{value}\": {e}")))?;
        }

        let [pitch, width, height, format, framebuffer_size] = values;
        Ok(Self {
            pitch,
            width,
            height,
            format,
            framebuffer_size,
        })
    }

    /// Check the header before any binary data is read.
    pub fn validate(&self) -> Result<PixelFormat, XbdmError> {
        if self.pitch == 0 || self.width == 0 || self.height == 0 || self.framebuffer_size == 0 {
            return Err(XbdmError::MalformedResponse(format!(
                "invalid image geometry {self:?}"
            )));
        }

        let format = PixelFormat::from_wire(self.format)?;
        let bpp = format.bytes_per_pixel() as u64;

        if u64::from(self.pitch) % bpp != 0 || u64::from(self.pitch) < u64::from(self.width) * bpp {
            return Err(XbdmError::MalformedResponse(format!(
                "pitch {} does not fit {} pixels of {bpp} bytes",
                self.pitch, self.width
            )));
        }

        let rows = u64::from(self.pitch) * u64::from(self.height);
        if u64::from(self.framebuffer_size) < rows {
            return Err(XbdmError::MalformedResponse(format!(
                "framebuffer size {} is smaller than {} rows of {} bytes",
                self.framebuffer_size, self.height, self.pitch
            )));
        }
        if self.framebuffer_size > MAX_FRAMEBUFFER_SIZE {
            return Err(XbdmError::MalformedResponse(format!(
                "framebuffer size {} exceeds the {MAX_FRAMEBUFFER_SIZE} byte limit",
                self.framebuffer_size
            )));
        }

        Ok(format)
    }
}

// ── Request ──────────────────────────────────────────────────────

/// Where a capture is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRequest {
    /// Explicit output file. When unset a timestamped name is used.
    pub output: Option<PathBuf>,
    /// Directory for timestamped names. Empty means the working directory.
    pub directory: PathBuf,
    /// `strftime` pattern for timestamped names.
    pub name_format: String,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            output: None,
            directory: PathBuf::new(),
            name_format: DEFAULT_NAME_FORMAT.to_string(),
        }
    }
}

impl ScreenshotRequest {
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_name_format(mut self, name_format: impl Into<String>) -> Self {
        self.name_format = name_format.into();
        self
    }

    /// The explicit output, or a name derived from the current local time.
    pub fn resolve_path(&self) -> Result<PathBuf, XbdmError> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }

        let mut name = String::new();
        write!(name, "{}", Local::now().format(&self.name_format)).map_err(|_| {
            XbdmError::Validation(format!("invalid file name format \"{}\"", self.name_format))
        })?;
        Ok(self.directory.join(name))
    }
}

// ── Flow ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Screenshot {
    request: ScreenshotRequest,
}

impl Screenshot {
    pub fn new(request: ScreenshotRequest) -> Self {
        Self { request }
    }
}

#[async_trait]
impl CommandFlow for Screenshot {
    type Output = PathBuf;

    fn name(&self) -> &'static str {
        "screenshot"
    }

    async fn execute<S>(&mut self, session: &mut Session<S>) -> Result<PathBuf, XbdmError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session.send_command(&Command::screenshot()).await?;

        let line = session.read_response(Expect::Any).await?;
        let header = ScreenshotHeader::parse(&line)?;
        if session.is_verbose() {
            info!(
                pitch = header.pitch,
                width = header.width,
                height = header.height,
                format = header.format,
                framebuffer_size = header.framebuffer_size,
                "screenshot header"
            );
        } else {
            debug!(?header, "screenshot header");
        }
        let format = header.validate()?;

        let data = session
            .receive_binary(header.framebuffer_size as usize)
            .await?;

        let mut frame = Framebuffer::new(header.width, header.height, header.pitch, format, data)?;
        frame.bgra_to_rgba();

        let path = self.request.resolve_path()?;
        frame.write_png(&path).await?;
        debug!("wrote {}", path.display());

        Ok(path)
    }
}

/// Capture the screen of the console at `host` and save it as PNG.
pub async fn screenshot(
    host: &str,
    request: ScreenshotRequest,
    options: &SessionOptions,
) -> Result<PathBuf, XbdmError> {
    run_on_host(host, options, Screenshot::new(request)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::run;
    use tokio_test::io::Builder;

    const SAMPLE: &str = "pitch=0x500 width=0x140 height=0xf0 format=0x12, framebuffersize=0x4b000";

    #[test]
    fn parses_sample_header() {
        let header = ScreenshotHeader::parse(SAMPLE).unwrap();
        assert_eq!(
            header,
            ScreenshotHeader {
                pitch: 1280,
                width: 320,
                height: 240,
                format: 18,
                framebuffer_size: 307200,
            }
        );
        assert_eq!(header.validate().unwrap(), PixelFormat::Bgra8);
    }

    #[test]
    fn rejects_missing_field() {
        let err = ScreenshotHeader::parse("pitch=0x500 width=0x140 height=0xf0").unwrap_err();
        assert!(err.to_string().contains("missing format"));
    }

    #[test]
    fn rejects_out_of_order_fields() {
        assert!(
            ScreenshotHeader::parse("width=0x140 pitch=0x500 height=0xf0 format=0x12, framebuffersize=0x4b000")
                .is_err()
        );
    }

    #[test]
    fn rejects_non_hex_value() {
        assert!(
            ScreenshotHeader::parse("pitch=1280 width=0x140 height=0xf0 format=0x12, framebuffersize=0x4b000")
                .is_err()
        );
        assert!(
            ScreenshotHeader::parse("pitch=0xzz width=0x140 height=0xf0 format=0x12, framebuffersize=0x4b000")
                .is_err()
        );
    }

    #[test]
    fn validate_rejects_unsupported_format() {
        let header = ScreenshotHeader::parse(
            "pitch=0x500 width=0x140 height=0xf0 format=0x1, framebuffersize=0x4b000",
        )
        .unwrap();
        assert!(matches!(
            header.validate(),
            Err(XbdmError::UnsupportedPixelFormat(1))
        ));
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let base = ScreenshotHeader::parse(SAMPLE).unwrap();

        let zero_width = ScreenshotHeader { width: 0, ..base };
        assert!(zero_width.validate().is_err());

        let narrow_pitch = ScreenshotHeader { pitch: 1276, ..base };
        assert!(narrow_pitch.validate().is_err());

        let odd_pitch = ScreenshotHeader { pitch: 1282, ..base };
        assert!(odd_pitch.validate().is_err());

        let short_buffer = ScreenshotHeader {
            framebuffer_size: 1280 * 239,
            ..base
        };
        assert!(short_buffer.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_buffer() {
        let header =
            ScreenshotHeader::parse("pitch=0x4 width=0x1 height=0x1 format=0x12, framebuffersize=0xffffffff")
                .unwrap();
        assert!(matches!(
            header.validate(),
            Err(XbdmError::MalformedResponse(_))
        ));

        let at_limit = ScreenshotHeader {
            framebuffer_size: MAX_FRAMEBUFFER_SIZE,
            ..header
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn explicit_output_wins() {
        let request = ScreenshotRequest::default().with_output("shot.png");
        assert_eq!(request.resolve_path().unwrap(), PathBuf::from("shot.png"));
    }

    #[test]
    fn default_name_embeds_timestamp() {
        let request = ScreenshotRequest::default().with_directory("captures");
        let path = request.resolve_path().unwrap();
        assert!(path.starts_with("captures"));

        let name = path.file_name().unwrap().to_str().unwrap();
        // xbss-YYYY-MM-DD_HH-MM-SS.mmm.png
        assert!(name.starts_with("xbss-"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "xbss-2006-01-02_15-04-05.000.png".len());
    }

    #[tokio::test]
    async fn unsupported_format_stops_before_binary_read() {
        // The mock holds no payload: reading any would hit end of stream.
        let mock = Builder::new()
            .read(b"201- connected\r\n")
            .write(b"screenshot\r\n")
            .read(b"203- binary response follows\r\n")
            .read(b"pitch=0x10 width=0x4 height=0x1 format=0x1, framebuffersize=0x10\r\n")
            .build();
        let session = Session::handshake(mock, "xbox:731", &SessionOptions::default())
            .await
            .unwrap();
        let err = run(session, Screenshot::default()).await.unwrap_err();
        assert!(matches!(err, XbdmError::UnsupportedPixelFormat(1)));
    }

    #[tokio::test]
    async fn capture_is_written_as_png() {
        let output = std::env::temp_dir().join(format!("xbdm-screen-{}.png", std::process::id()));

        // 2x1 image, pitch 12: one padding pixel per row.
        let mut payload = Vec::new();
        payload.extend_from_slice(b"203- binary response follows\r\n");
        payload.extend_from_slice(b"pitch=0xc width=0x2 height=0x1 format=0x12, framebuffersize=0xc\r\n");
        payload.extend_from_slice(&[1, 2, 3, 255, 4, 5, 6, 255, 9, 9, 9, 9]);

        let mock = Builder::new()
            .read(b"201- connected\r\n")
            .write(b"screenshot\r\n")
            .read(&payload)
            .write(b"bye\r\n")
            .read(b"200- bye\r\n")
            .build();
        let session = Session::handshake(mock, "xbox:731", &SessionOptions::default())
            .await
            .unwrap();

        let flow = Screenshot::new(ScreenshotRequest::default().with_output(&output));
        let written = run(session, flow).await.unwrap();
        assert_eq!(written, output);

        let bytes = std::fs::read(&output).unwrap();
        let mut reader = png::Decoder::new(&bytes[..]).read_info().unwrap();
        let mut pixels = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut pixels).unwrap();
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(&pixels[..info.buffer_size()], &[3, 2, 1, 255, 6, 5, 4, 255]);

        std::fs::remove_file(&output).ok();
    }
}
