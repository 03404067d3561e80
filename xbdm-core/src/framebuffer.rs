//! Raw framebuffer captures and their conversion to PNG.
//!
//! A capture holds `height` rows of `pitch` bytes. Only the first
//! `width * 4` bytes of a row are pixels; the rest is alignment padding
//! that is never read or modified.

use std::io::Write;
use std::path::Path;

use bytes::BytesMut;

use crate::error::XbdmError;

/// Wire identifier of the packed 32-bit BGRA layout.
pub const FORMAT_BGRA: u32 = 18;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (as captured).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha (as encoded).
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }

    /// Map the format field of a screenshot header.
    pub fn from_wire(format: u32) -> Result<Self, XbdmError> {
        match format {
            FORMAT_BGRA => Ok(PixelFormat::Bgra8),
            other => Err(XbdmError::UnsupportedPixelFormat(other)),
        }
    }
}

// ── Framebuffer ──────────────────────────────────────────────────

/// A downloaded capture together with its geometry.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pitch: u32,
    format: PixelFormat,
    data: BytesMut,
}

impl Framebuffer {
    /// Wrap `data`, checking that it covers `height` rows of `pitch` bytes
    /// and that a row is wide enough for `width` pixels.
    pub fn new(
        width: u32,
        height: u32,
        pitch: u32,
        format: PixelFormat,
        data: BytesMut,
    ) -> Result<Self, XbdmError> {
        if width == 0 || height == 0 {
            return Err(XbdmError::Validation(format!(
                "empty framebuffer {width}x{height}"
            )));
        }

        let row_len = width as usize * format.bytes_per_pixel();
        if (pitch as usize) < row_len {
            return Err(XbdmError::Validation(format!(
                "pitch {pitch} is narrower than {width} pixels"
            )));
        }

        let needed = pitch as usize * height as usize;
        if data.len() < needed {
            return Err(XbdmError::Validation(format!(
                "framebuffer holds {} bytes, {height} rows of {pitch} need {needed}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pitch,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The whole buffer, padding included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Live bytes per row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Live pixel bytes of each row, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let row_len = self.row_len();
        self.data
            .chunks(self.pitch as usize)
            .take(self.height as usize)
            .map(move |row| &row[..row_len])
    }

    /// Swap blue and red of every live pixel in place.
    ///
    /// Does nothing if the buffer is already RGBA.
    pub fn bgra_to_rgba(&mut self) {
        if self.format != PixelFormat::Bgra8 {
            return;
        }

        let row_len = self.row_len();
        for row in self
            .data
            .chunks_mut(self.pitch as usize)
            .take(self.height as usize)
        {
            for pixel in row[..row_len].chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }
        self.format = PixelFormat::Rgba8;
    }

    /// Encode the live region as an 8-bit RGBA PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, XbdmError> {
        if self.format != PixelFormat::Rgba8 {
            return Err(XbdmError::Validation(
                "framebuffer must be converted to RGBA before encoding".into(),
            ));
        }

        let mut out = Vec::with_capacity(self.row_len() * self.height as usize / 2);
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder.write_header()?;
            let mut stream = writer.stream_writer()?;
            for row in self.rows() {
                stream
                    .write_all(row)
                    .map_err(|e| XbdmError::Encoding(e.to_string()))?;
            }
            stream.finish()?;
            writer.finish()?;
        }
        Ok(out)
    }

    /// Encode and write the PNG to `path`.
    pub async fn write_png(&self, path: &Path) -> Result<(), XbdmError> {
        let encoded = self.encode_png()?;
        tokio::fs::write(path, encoded).await.map_err(|e| {
            XbdmError::Encoding(format!("cannot write \"{}\": {e}", path.display()))
        })
    }
}
