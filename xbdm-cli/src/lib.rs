//! # xbdm-cli
//!
//! Command-line front end for `xbdm-core`: copies files to the console,
//! reboots it and saves screenshots.

pub mod config;

use xbdm_core::ErrorKind;

/// Process exit status for a failed command. `2` stays reserved for
/// usage errors reported by clap.
pub fn exit_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Connection => 3,
        ErrorKind::Protocol => 4,
        ErrorKind::Transfer => 5,
        ErrorKind::Encoding => 6,
        ErrorKind::Validation => 7,
    }
}
