//! Status lines and command requests of the debug monitor protocol.
//!
//! Status lines are matched by exact text. `Status` keeps the vocabulary
//! in one place; `TryFrom<&str>` is only used to label responses in logs.

use std::fmt;

use crate::error::XbdmError;

/// Well-known TCP port of the debug monitor.
pub const CONTROL_PORT: u16 = 731;

// ── Status ───────────────────────────────────────────────────────

/// Status lines sent by the remote agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// `200- OK`: command accepted or upload stored.
    Ok,
    /// `200- bye`: farewell acknowledged.
    Bye,
    /// `201- connected`: banner sent right after TCP connect.
    Connected,
    /// `203- binary response follows`: a header line and raw bytes follow.
    BinaryFollows,
    /// `204- send binary data`: the agent waits for the upload payload.
    SendBinary,
}

impl Status {
    /// The exact wire text, without the line terminator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "200- OK",
            Status::Bye => "200- bye",
            Status::Connected => "201- connected",
            Status::BinaryFollows => "203- binary response follows",
            Status::SendBinary => "204- send binary data",
        }
    }
}

impl TryFrom<&str> for Status {
    type Error = XbdmError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "200- OK" => Ok(Status::Ok),
            "200- bye" => Ok(Status::Bye),
            "201- connected" => Ok(Status::Connected),
            "203- binary response follows" => Ok(Status::BinaryFollows),
            "204- send binary data" => Ok(Status::SendBinary),
            _ => Err(XbdmError::MalformedResponse(format!(
                "unknown status line \"{value}\""
            ))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Expect ───────────────────────────────────────────────────────

/// What the engine should do with the next response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The line must equal this status exactly.
    Status(Status),
    /// Return the line untouched for the caller to parse.
    Any,
}

impl Expect {
    /// Check a received line against this expectation.
    pub fn check(self, line: &str) -> Result<(), XbdmError> {
        match self {
            Expect::Status(status) if line != status.as_str() => {
                Err(XbdmError::mismatch(status.as_str(), line))
            }
            _ => Ok(()),
        }
    }
}

// ── Command ──────────────────────────────────────────────────────

/// Reboot variant requested from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebootKind {
    /// Reload the BIOS.
    Cold,
    /// Restart the title without reloading the BIOS.
    #[default]
    Warm,
}

impl RebootKind {
    pub fn from_cold(cold: bool) -> Self {
        if cold { RebootKind::Cold } else { RebootKind::Warm }
    }
}

/// A single request line together with the response it must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    expect: Expect,
}

impl Command {
    pub fn new(text: impl Into<String>, expect: Expect) -> Self {
        Self {
            text: text.into(),
            expect,
        }
    }

    /// `sendfile name="<path>" length=0x<hex>`, answered by `204- send binary data`.
    pub fn send_file(remote_path: &str, length: u64) -> Self {
        Self::new(
            format!("sendfile name=\"{remote_path}\" length=0x{length:x}"),
            Expect::Status(Status::SendBinary),
        )
    }

    /// `reboot` or `reboot warm`, answered by `200- OK`.
    pub fn reboot(kind: RebootKind) -> Self {
        let text = match kind {
            RebootKind::Cold => "reboot",
            RebootKind::Warm => "reboot warm",
        };
        Self::new(text, Expect::Status(Status::Ok))
    }

    /// `screenshot`, answered by `203- binary response follows`.
    pub fn screenshot() -> Self {
        Self::new("screenshot", Expect::Status(Status::BinaryFollows))
    }

    /// `bye`, answered by `200- bye`.
    pub fn quit() -> Self {
        Self::new("bye", Expect::Status(Status::Bye))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expect(&self) -> Expect {
        self.expect
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
