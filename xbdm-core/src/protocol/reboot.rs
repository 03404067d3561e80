//! Console reboot.
//!
//! ```text
//! Client ──reboot | reboot warm──► Console
//! Client ◄──200- OK─────────────── Console
//! ```

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use super::{CommandFlow, run_on_host};
use crate::error::XbdmError;
use crate::message::{Command, RebootKind};
use crate::network::{Session, SessionOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reboot {
    pub kind: RebootKind,
}

impl Reboot {
    pub fn new(kind: RebootKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl CommandFlow for Reboot {
    type Output = ();

    fn name(&self) -> &'static str {
        "reboot"
    }

    async fn execute<S>(&mut self, session: &mut Session<S>) -> Result<(), XbdmError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session.send_command(&Command::reboot(self.kind)).await?;
        info!(peer = session.peer(), kind = ?self.kind, "reboot issued");
        Ok(())
    }
}

/// Reboot the console at `host`.
pub async fn reboot(host: &str, kind: RebootKind, options: &SessionOptions) -> Result<(), XbdmError> {
    run_on_host(host, options, Reboot::new(kind)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::run;
    use tokio_test::io::Builder;

    async fn reboot_with(kind: RebootKind, line: &'static [u8]) -> Result<(), XbdmError> {
        let mock = Builder::new()
            .read(b"201- connected\r\n")
            .write(line)
            .read(b"200- OK\r\n")
            .write(b"bye\r\n")
            .read(b"200- bye\r\n")
            .build();
        let session = Session::handshake(mock, "xbox:731", &SessionOptions::default()).await?;
        run(session, Reboot::new(kind)).await
    }

    #[tokio::test]
    async fn cold_reboot_has_no_suffix() {
        reboot_with(RebootKind::Cold, b"reboot\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn warm_reboot_appends_warm() {
        reboot_with(RebootKind::Warm, b"reboot warm\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_reboot_is_reported_verbatim() {
        let mock = Builder::new()
            .read(b"201- connected\r\n")
            .write(b"reboot warm\r\n")
            .read(b"405- not allowed\r\n")
            .build();
        let session = Session::handshake(mock, "xbox:731", &SessionOptions::default())
            .await
            .unwrap();
        let err = run(session, Reboot::new(RebootKind::Warm)).await.unwrap_err();
        match err {
            XbdmError::Protocol { expected, actual } => {
                assert_eq!(expected, "200- OK");
                assert_eq!(actual, "405- not allowed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
