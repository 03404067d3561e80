//! Command flows built on top of a [`Session`].
//!
//! Each flow only describes what happens between the banner and the
//! farewell. [`run`] owns the rest: it executes the flow, says `bye`, and
//! closes the connection on every exit path.
//!
//! ```text
//! connect ─► 201- connected ─► flow.execute() ─► bye / 200- bye ─► close
//!                                   │                  │
//!                                   └──── error ───────┴──► close
//! ```

pub mod file;
pub mod reboot;
pub mod screen;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::error::XbdmError;
use crate::network::{Session, SessionOptions};

pub use file::{LocalSource, RemoteDestination, SendFile, UploadReport, send_file};
pub use reboot::{Reboot, reboot};
pub use screen::{Screenshot, ScreenshotHeader, ScreenshotRequest, screenshot};

/// One request/response exchange run inside an open session.
#[async_trait]
pub trait CommandFlow {
    /// Value handed back to the caller on success.
    type Output: Send;

    /// Short label for logs.
    fn name(&self) -> &'static str;

    /// Exchange the flow's command lines and binary payload, if any.
    async fn execute<S>(&mut self, session: &mut Session<S>) -> Result<Self::Output, XbdmError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send;
}

/// Run `flow` on an already handshaken session, then say goodbye and
/// close it.
///
/// The first error wins. If the flow succeeded but the farewell or the
/// close failed, that error is returned even though the flow's side
/// effect already happened on the remote.
pub async fn run<S, F>(mut session: Session<S>, mut flow: F) -> Result<F::Output, XbdmError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: CommandFlow + Send,
{
    debug!(flow = flow.name(), peer = session.peer(), "starting");

    let outcome = drive(&mut session, &mut flow).await;
    let closed = session.close().await;

    match (outcome, closed) {
        (Ok(output), Ok(())) => Ok(output),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(flow = flow.name(), "close after failure also failed: {close_err}");
            Err(e)
        }
    }
}

/// Connect to `host`, then [`run`] the flow.
pub async fn run_on_host<F>(
    host: &str,
    options: &SessionOptions,
    flow: F,
) -> Result<F::Output, XbdmError>
where
    F: CommandFlow + Send,
{
    let session = Session::connect(host, options).await?;
    run(session, flow).await
}

async fn drive<S, F>(session: &mut Session<S>, flow: &mut F) -> Result<F::Output, XbdmError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: CommandFlow + Send,
{
    let output = flow.execute(session).await?;

    if let Err(e) = session.farewell().await {
        warn!(
            flow = flow.name(),
            "farewell failed after the command completed: {e}"
        );
        return Err(e);
    }
    Ok(output)
}
