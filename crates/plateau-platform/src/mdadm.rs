//! Linux software RAID through `mdadm` and `/proc/mdstat`

use std::path::{Path, PathBuf};

use plateau_core::{ArrayController, ArrayMember, ArraySpec};
use tracing::{debug, info};

use crate::command;
use crate::{PlatformError, Result};

/// Kernel md status file
const MDSTAT_PATH: &str = "/proc/mdstat";

/// One array entry of `/proc/mdstat`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MdArrayStatus {
    /// Kernel name (`md0`)
    pub name: String,
    /// `active` rather than `inactive`
    pub active: bool,
    /// Personality, e.g. `raid1`
    pub level: Option<String>,
    /// Member device names without slot suffixes
    pub members: Vec<String>,
    /// A resync, recovery, reshape or check is running or pending
    pub syncing: bool,
}

impl MdArrayStatus {
    /// Assembled and idle
    pub fn is_ready(&self) -> bool {
        self.active && !self.syncing
    }
}

/// Parse the contents of `/proc/mdstat`
pub fn parse_mdstat(contents: &str) -> Vec<MdArrayStatus> {
    let mut arrays: Vec<MdArrayStatus> = Vec::new();

    for line in contents.lines() {
        if let Some((name, rest)) = line.split_once(" : ") {
            let name = name.trim();
            if !name.starts_with("md") || name.contains(char::is_whitespace) {
                continue;
            }

            let mut status = MdArrayStatus {
                name: name.to_string(),
                ..Default::default()
            };
            for token in rest.split_whitespace() {
                match token {
                    "active" => status.active = true,
                    "inactive" => status.active = false,
                    t if t.starts_with('(') => {}
                    t if t.starts_with("raid") || t == "linear" || t == "multipath" => {
                        status.level = Some(t.to_string());
                    }
                    t => {
                        let member = t.split('[').next().unwrap_or(t);
                        if !member.is_empty() {
                            status.members.push(member.to_string());
                        }
                    }
                }
            }
            arrays.push(status);
        } else if line.starts_with(char::is_whitespace) {
            if let Some(current) = arrays.last_mut() {
                let line = line.trim();
                if ["resync", "recovery", "reshape", "check"]
                    .iter()
                    .any(|op| line.contains(&format!("{op} =")) || line.contains(&format!("{op}=")))
                {
                    current.syncing = true;
                }
            }
        }
    }

    arrays
}

/// Controls one md array with `mdadm`
#[derive(Debug, Clone)]
pub struct MdadmArray {
    device: PathBuf,
    level: u8,
    members: Vec<ArrayMember>,
    binary: String,
    mdstat_path: PathBuf,
    assume_clean: bool,
}

impl MdadmArray {
    /// Create a controller for the array described by `spec`
    pub fn new(spec: &ArraySpec) -> Self {
        Self {
            device: spec.device.clone(),
            level: spec.level,
            members: spec.members.clone(),
            binary: "mdadm".to_string(),
            mdstat_path: PathBuf::from(MDSTAT_PATH),
            assume_clean: true,
        }
    }

    /// Set the mdadm binary
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Read array status from another file
    pub fn mdstat_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mdstat_path = path.into();
        self
    }

    /// Skip the initial resync of redundant levels
    ///
    /// Only sound when every member reads back identically, as after a
    /// secure erase. Without it the array is not ready until the resync
    /// finishes.
    pub fn assume_clean(mut self, assume_clean: bool) -> Self {
        self.assume_clean = assume_clean;
        self
    }

    /// Array device
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Arguments of `mdadm --create`
    pub fn create_args(&self) -> Vec<String> {
        let mut args = vec![
            "--create".to_string(),
            self.device.display().to_string(),
            "--run".to_string(),
            format!("--level={}", self.level),
            format!("--raid-devices={}", self.members.len()),
        ];
        // raid0 has no redundancy to sync
        if self.assume_clean && self.level != 0 {
            args.push("--assume-clean".to_string());
        }
        args.extend(self.members.iter().map(|m| m.path().display().to_string()));
        args
    }

    /// Current status of this array, if the kernel knows it
    pub fn status(&self) -> Result<Option<MdArrayStatus>> {
        let contents = std::fs::read_to_string(&self.mdstat_path)?;
        let name = self.kernel_name()?;
        Ok(parse_mdstat(&contents)
            .into_iter()
            .find(|a| a.name == name))
    }

    fn kernel_name(&self) -> Result<String> {
        self.device
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::NotSupported(format!(
                    "array device {} has no name",
                    self.device.display()
                ))
            })
    }
}

impl ArrayController for MdadmArray {
    fn exists(&self) -> plateau_core::Result<bool> {
        Ok(self.status()?.is_some())
    }

    fn create(&self) -> plateau_core::Result<()> {
        info!(
            "Creating RAID {} array {} from {} members",
            self.level,
            self.device.display(),
            self.members.len()
        );
        command::run(&self.binary, self.create_args())?;
        Ok(())
    }

    fn destroy(&self) -> plateau_core::Result<()> {
        info!("Stopping array {}", self.device.display());
        command::run(
            &self.binary,
            ["--stop".to_string(), self.device.display().to_string()],
        )?;

        let mut args = vec!["--zero-superblock".to_string()];
        args.extend(self.members.iter().map(|m| m.path().display().to_string()));
        command::run(&self.binary, args)?;
        Ok(())
    }

    fn is_ready(&self) -> plateau_core::Result<bool> {
        let status = self.status()?;
        debug!("Array {} status: {:?}", self.device.display(), status);
        Ok(status.is_some_and(|s| s.is_ready()))
    }
}
