//! File upload to the console's filesystem.
//!
//! # Wire Protocol
//!
//! ```text
//! Client ──sendfile name="<path>" length=0x<hex>──► Console
//! Client ◄──204- send binary data────────────────── Console
//! Client ──<length raw bytes>──────────────────────► Console
//! Client ◄──200- OK──────────────────────────────── Console
//! ```
//!
//! The length is declared up front, so the local file is measured before
//! any network activity.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use super::{CommandFlow, run_on_host};
use crate::error::XbdmError;
use crate::message::{Command, Expect, Status};
use crate::network::{Session, SessionOptions};

/// Directory separator on the console side.
pub const REMOTE_PATH_SEPARATOR: char = '\\';

// ── Remote destination ───────────────────────────────────────────

/// Parsed `host:path` upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDestination {
    pub host: String,
    pub path: String,
}

impl RemoteDestination {
    /// Split `destination` on its first colon.
    ///
    /// A path ending in `\` names a directory; `local_name` is appended.
    pub fn parse(destination: &str, local_name: &str) -> Result<Self, XbdmError> {
        let (host, path) = match destination.split_once(':') {
            Some((host, path)) if !host.is_empty() && !path.is_empty() => (host, path),
            _ => {
                return Err(XbdmError::Validation(format!(
                    "destination \"{destination}\" must be on the form \"host:X:\\full\\path\\file\""
                )));
            }
        };

        let mut path = path.to_string();
        if path.ends_with(REMOTE_PATH_SEPARATOR) {
            path.push_str(local_name);
        }

        Ok(Self {
            host: host.to_string(),
            path,
        })
    }
}

impl fmt::Display for RemoteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\"{}\"", self.host, self.path)
    }
}

// ── Local source ─────────────────────────────────────────────────

/// An opened local regular file with its length.
#[derive(Debug)]
pub struct LocalSource {
    path: PathBuf,
    name: String,
    length: u64,
    file: File,
}

impl LocalSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, XbdmError> {
        let path = path.as_ref();
        debug!("opening local file \"{}\"", path.display());

        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            XbdmError::Validation(format!("cannot stat \"{}\": {e}", path.display()))
        })?;
        if !meta.is_file() {
            return Err(XbdmError::Validation(format!(
                "not a regular file: \"{}\"",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                XbdmError::Validation(format!("no file name in \"{}\"", path.display()))
            })?;

        let file = File::open(path).await.map_err(|e| {
            XbdmError::Validation(format!("cannot open \"{}\": {e}", path.display()))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            length: meta.len(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name, used when the destination is a directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

// ── Flow ─────────────────────────────────────────────────────────

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub host: String,
    pub remote_path: String,
    pub bytes: u64,
}

/// Upload one local file.
#[derive(Debug)]
pub struct SendFile {
    source: LocalSource,
    destination: RemoteDestination,
}

impl SendFile {
    /// Validate both ends before anything touches the network.
    pub async fn prepare(local: impl AsRef<Path>, destination: &str) -> Result<Self, XbdmError> {
        let source = LocalSource::open(local).await?;
        let destination = RemoteDestination::parse(destination, source.name())?;
        debug!("destination host: \"{}\"", destination.host);
        debug!("destination file: \"{}\"", destination.path);
        Ok(Self {
            source,
            destination,
        })
    }

    pub fn source(&self) -> &LocalSource {
        &self.source
    }

    pub fn destination(&self) -> &RemoteDestination {
        &self.destination
    }
}

#[async_trait]
impl CommandFlow for SendFile {
    type Output = UploadReport;

    fn name(&self) -> &'static str {
        "sendfile"
    }

    async fn execute<S>(&mut self, session: &mut Session<S>) -> Result<UploadReport, XbdmError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let length = self.source.len();
        session
            .send_command(&Command::send_file(&self.destination.path, length))
            .await?;

        if session.is_verbose() {
            info!("sending {length} bytes of binary data");
        } else {
            debug!("sending {length} bytes of binary data");
        }
        let bytes = session.send_binary(&mut self.source.file, length).await?;

        session.read_response(Expect::Status(Status::Ok)).await?;

        Ok(UploadReport {
            host: self.destination.host.clone(),
            remote_path: self.destination.path.clone(),
            bytes,
        })
    }
}

/// Copy `local` to `destination` (`host:path`).
pub async fn send_file(
    local: impl AsRef<Path>,
    destination: &str,
    options: &SessionOptions,
) -> Result<UploadReport, XbdmError> {
    let flow = SendFile::prepare(local, destination).await?;
    let host = flow.destination.host.clone();
    run_on_host(&host, options, flow).await
}
