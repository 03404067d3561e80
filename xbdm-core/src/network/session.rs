use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::XbdmCodec;
use crate::error::XbdmError;
use crate::message::{CONTROL_PORT, Command, Expect, Status};
use crate::transfer;

/// Per-session settings supplied by the caller.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// TCP port of the debug monitor.
    pub port: u16,
    /// Log every command and response line at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            port: CONTROL_PORT,
            verbose: false,
        }
    }
}

impl SessionOptions {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// An open, handshaken control connection.
///
/// A `Session` only exists after the banner matched. [`Session::close`]
/// consumes it, so a closed session cannot be used again.
#[derive(Debug)]
pub struct Session<S = TcpStream> {
    framed: Framed<S, XbdmCodec>,
    peer: String,
    verbose: bool,
}

impl Session<TcpStream> {
    /// Dial `host` on the configured control port and read the banner.
    pub async fn connect(host: &str, options: &SessionOptions) -> Result<Self, XbdmError> {
        let address = format!("{host}:{}", options.port);
        if options.verbose {
            info!("connecting to {address}");
        } else {
            debug!("connecting to {address}");
        }

        let stream = TcpStream::connect((host, options.port))
            .await
            .map_err(|source| XbdmError::Connect {
                address: address.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        Session::handshake(stream, address, options).await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already open stream and check the banner.
    ///
    /// On a banner mismatch the stream is dropped before returning.
    pub async fn handshake(
        stream: S,
        peer: impl Into<String>,
        options: &SessionOptions,
    ) -> Result<Self, XbdmError> {
        let mut session = Self {
            framed: Framed::new(stream, XbdmCodec),
            peer: peer.into(),
            verbose: options.verbose,
        };
        session
            .read_response(Expect::Status(Status::Connected))
            .await?;
        Ok(session)
    }

    /// Send one command line and read its response.
    ///
    /// Returns the response line; for [`Expect::Status`] it has already
    /// been matched.
    pub async fn send_command(&mut self, command: &Command) -> Result<String, XbdmError> {
        self.trace_line("sending", command.text());
        self.framed.send(command.text()).await?;
        self.read_response(command.expect()).await
    }

    /// Read one response line without sending anything first.
    pub async fn read_response(&mut self, expect: Expect) -> Result<String, XbdmError> {
        let line = match self.framed.next().await {
            Some(line) => line?,
            None => return Err(XbdmError::ConnectionClosed),
        };
        self.trace_line("received", &line);
        expect.check(&line)?;
        Ok(line)
    }

    /// `bye` / `200- bye`.
    pub async fn farewell(&mut self) -> Result<(), XbdmError> {
        self.send_command(&Command::quit()).await?;
        Ok(())
    }

    /// Stream exactly `length` bytes from `source` to the remote.
    pub async fn send_binary<R>(&mut self, source: &mut R, length: u64) -> Result<u64, XbdmError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        // The codec's write buffer is flushed by every `send`, so raw
        // bytes can go straight to the stream.
        transfer::send_exact(source, self.framed.get_mut(), length).await
    }

    /// Read exactly `length` bytes that follow the last response line.
    pub async fn receive_binary(&mut self, length: usize) -> Result<BytesMut, XbdmError> {
        let mut buffered = self.framed.read_buffer_mut().split();
        let result = transfer::receive_exact(&mut buffered, self.framed.get_mut(), length).await;
        self.framed.read_buffer_mut().unsplit(buffered);
        result
    }

    /// Shut down the write half and release the connection.
    pub async fn close(self) -> Result<(), XbdmError> {
        let mut stream = self.framed.into_inner();
        match stream.shutdown().await {
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
            other => other?,
        }
        debug!(peer = %self.peer, "session closed");
        Ok(())
    }

    /// `host:port` this session talks to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn trace_line(&self, direction: &str, line: &str) {
        if self.verbose {
            info!(peer = %self.peer, "{direction} \"{line}\"");
        } else {
            debug!(peer = %self.peer, "{direction} \"{line}\"");
        }
    }
}
