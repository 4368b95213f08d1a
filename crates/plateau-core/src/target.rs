//! Devices under test and how each kind is prepared before measuring.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::array::{
    ArrayController, ArrayMember, ArrayOperationOutcome, DeviceOperation, ParallelDeviceOperator,
};
use crate::error::{Error, OperationError, Result};

/// Performs single-device preparation operations
pub trait DeviceOperations: Sync {
    /// Apply `operation` to the device at `path`
    fn apply(&self, path: &Path, operation: DeviceOperation)
        -> std::result::Result<(), OperationError>;
}

/// A software RAID array and its physical members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySpec {
    /// Logical array device (e.g. `/dev/md0`)
    pub device: PathBuf,
    /// RAID level
    pub level: u8,
    /// Physical members
    pub members: Vec<ArrayMember>,
}

impl ArraySpec {
    /// Check the member count suits the RAID level
    pub fn validate(&self) -> Result<()> {
        let min = match self.level {
            0 | 1 => 2,
            5 => 3,
            6 | 10 => 4,
            other => {
                return Err(Error::InvalidConfig(format!(
                    "unsupported RAID level {other}"
                )))
            }
        };
        if self.members.len() < min {
            return Err(Error::InvalidConfig(format!(
                "RAID {} needs at least {} members, got {}",
                self.level,
                min,
                self.members.len()
            )));
        }
        if self.members.iter().any(|m| m.path() == self.device) {
            return Err(Error::InvalidConfig(format!(
                "array device {} listed as its own member",
                self.device.display()
            )));
        }
        Ok(())
    }
}

/// The kind of device under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DeviceKind {
    /// Solid-state drive
    Ssd {
        /// Device path
        path: PathBuf,
    },
    /// Hard disk drive
    Hdd {
        /// Device path
        path: PathBuf,
    },
    /// Software RAID array
    Array(ArraySpec),
}

impl DeviceKind {
    /// Path the workload generator runs against
    pub fn test_path(&self) -> &Path {
        match self {
            Self::Ssd { path } | Self::Hdd { path } => path,
            Self::Array(spec) => &spec.device,
        }
    }

    /// Validate kind-specific configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Ssd { path } | Self::Hdd { path } if path.as_os_str().is_empty() => {
                Err(Error::InvalidConfig("device path is empty".to_string()))
            }
            Self::Ssd { .. } | Self::Hdd { .. } => Ok(()),
            Self::Array(spec) => spec.validate(),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssd { path } => write!(f, "SSD {}", path.display()),
            Self::Hdd { path } => write!(f, "HDD {}", path.display()),
            Self::Array(spec) => write!(
                f,
                "RAID {} {} ({} members)",
                spec.level,
                spec.device.display(),
                spec.members.len()
            ),
        }
    }
}

/// Bring a device into its pre-test state.
///
/// SSDs are secure erased and then preconditioned. HDDs need no preparation.
/// Arrays have every member secure erased in parallel, are recreated, and the
/// assembled array is then preconditioned. Returns the fan-out outcome for
/// arrays.
pub fn prepare<O, C>(
    kind: &DeviceKind,
    ops: &O,
    controller: Option<&C>,
    operator: &ParallelDeviceOperator,
) -> Result<Option<ArrayOperationOutcome>>
where
    O: DeviceOperations + ?Sized,
    C: ArrayController + ?Sized,
{
    kind.validate()?;

    match kind {
        DeviceKind::Hdd { path } => {
            info!("No preparation needed for HDD {}", path.display());
            Ok(None)
        }
        DeviceKind::Ssd { path } => {
            run_single(ops, path, DeviceOperation::SecureErase)?;
            run_single(ops, path, DeviceOperation::Precondition)?;
            Ok(None)
        }
        DeviceKind::Array(spec) => {
            let controller = controller.ok_or_else(|| {
                Error::InvalidConfig("array target requires an array controller".to_string())
            })?;
            let outcome = operator.apply_and_recreate(
                &spec.members,
                DeviceOperation::SecureErase,
                |member, op| ops.apply(member.path(), op),
                controller,
            )?;
            run_single(ops, &spec.device, DeviceOperation::Precondition)?;
            Ok(Some(outcome))
        }
    }
}

fn run_single<O>(ops: &O, path: &Path, operation: DeviceOperation) -> Result<()>
where
    O: DeviceOperations + ?Sized,
{
    info!("Running {} on {}", operation, path.display());
    ops.apply(path, operation)
        .map_err(|e| Error::ToolInvocation(format!("{} on {}: {}", operation, path.display(), e)))
}
