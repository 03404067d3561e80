//! Control connection to the debug monitor.

mod session;

pub use session::{Session, SessionOptions};
