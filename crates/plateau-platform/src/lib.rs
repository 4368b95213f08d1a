//! # Plateau Platform
//!
//! Adapters between the Plateau core and the system tools that touch real
//! devices: `fio` for workload trials and preconditioning, `nvme`/`hdparm` for
//! secure erase, and `mdadm` for software RAID arrays.
//!
//! ## Safety
//!
//! Secure erase and preconditioning destroy all data on the target. Callers
//! are expected to confirm the device path before invoking any operation.

#![warn(missing_docs)]
#![warn(clippy::all)]

use thiserror::Error;

mod command;
pub mod device;
pub mod fio;
pub mod mdadm;

pub use device::DeviceCommands;
pub use fio::{parse_fio_json, FioOptions, FioRunner};
pub use mdadm::{parse_mdstat, MdArrayStatus, MdadmArray};

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A tool could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// The underlying error
        source: std::io::Error,
    },

    /// A tool ran but exited unsuccessfully
    #[error("{program} exited with {code}: {stderr}")]
    CommandFailed {
        /// Program that failed
        program: String,
        /// Exit code, or "signal" if killed
        code: String,
        /// Trimmed standard error
        stderr: String,
    },

    /// Tool output could not be understood
    #[error("Unexpected output: {0}")]
    Parse(String),

    /// Operation not supported for this device
    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

impl From<PlatformError> for plateau_core::Error {
    fn from(err: PlatformError) -> Self {
        plateau_core::Error::ToolInvocation(err.to_string())
    }
}

impl From<PlatformError> for plateau_core::OperationError {
    fn from(err: PlatformError) -> Self {
        plateau_core::OperationError::new(err.to_string())
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Check if running with elevated privileges
        pub fn has_elevated_privileges() -> bool {
            // SAFETY: geteuid() is a simple syscall that returns the effective user ID.
            // It has no preconditions and cannot cause undefined behavior.
            #[allow(unsafe_code)]
            unsafe {
                libc::geteuid() == 0
            }
        }
    } else {
        /// Check privileges (unsupported platform)
        pub fn has_elevated_privileges() -> bool {
            false
        }
    }
}
