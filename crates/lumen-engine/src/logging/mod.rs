//! Logger setup for binaries and tests that want to see shader diagnostics.
//!
//! Library code only uses the `log` macros; installing a backend is left to
//! the application.

mod init;

pub use init::{init_logging, LoggingConfig};
