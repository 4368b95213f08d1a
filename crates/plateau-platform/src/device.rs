//! Single-device preparation: secure erase and preconditioning

use std::path::Path;

use plateau_core::{BlockSize, DeviceOperation, DeviceOperations, OperationError};
use tracing::{debug, info};

use crate::command;
use crate::fio::FioOptions;
use crate::Result;

/// Passes of the sequential precondition write
const PRECONDITION_LOOPS: u32 = 2;

/// Temporary ATA security password; cleared by the erase itself
const ATA_PASSWORD: &str = "plateau";

/// One external command: program and arguments
pub type CommandLine = (String, Vec<String>);

/// Runs secure erase and precondition with `nvme`, `hdparm` and `fio`
#[derive(Debug, Clone)]
pub struct DeviceCommands {
    fio: FioOptions,
    nvme_binary: String,
    hdparm_binary: String,
}

impl Default for DeviceCommands {
    fn default() -> Self {
        Self::new(FioOptions::default())
    }
}

impl DeviceCommands {
    /// Create with the given fio options and default tool names
    pub fn new(fio: FioOptions) -> Self {
        Self {
            fio,
            nvme_binary: "nvme".to_string(),
            hdparm_binary: "hdparm".to_string(),
        }
    }

    /// Set the nvme-cli binary
    pub fn nvme_binary(mut self, binary: impl Into<String>) -> Self {
        self.nvme_binary = binary.into();
        self
    }

    /// Set the hdparm binary
    pub fn hdparm_binary(mut self, binary: impl Into<String>) -> Self {
        self.hdparm_binary = binary.into();
        self
    }

    /// Commands that secure erase `path`, in order
    pub fn secure_erase_plan(&self, path: &Path) -> Vec<CommandLine> {
        let dev = path.display().to_string();
        if is_nvme(path) {
            vec![(
                self.nvme_binary.clone(),
                vec!["format".to_string(), dev, "--ses=1".to_string()],
            )]
        } else {
            let security = |flag: &str| {
                (
                    self.hdparm_binary.clone(),
                    vec![
                        "--user-master".to_string(),
                        "u".to_string(),
                        flag.to_string(),
                        ATA_PASSWORD.to_string(),
                        dev.clone(),
                    ],
                )
            };
            vec![
                security("--security-set-pass"),
                security("--security-erase"),
            ]
        }
    }

    /// Command that preconditions `path`: full-device sequential 128k writes
    pub fn precondition_plan(&self, path: &Path) -> CommandLine {
        (
            self.fio.binary.clone(),
            vec![
                "--name=precondition".to_string(),
                format!("--filename={}", path.display()),
                "--rw=write".to_string(),
                format!("--bs={}", BlockSize::K128),
                "--direct=1".to_string(),
                format!("--ioengine={}", self.fio.ioengine),
                format!("--iodepth={}", self.fio.iodepth),
                format!("--loops={PRECONDITION_LOOPS}"),
                "--output-format=json".to_string(),
            ],
        )
    }

    /// Run `operation` on `path`
    pub fn run(&self, path: &Path, operation: DeviceOperation) -> Result<()> {
        let plan = match operation {
            DeviceOperation::SecureErase => self.secure_erase_plan(path),
            DeviceOperation::Precondition => vec![self.precondition_plan(path)],
        };

        info!("{} on {}", operation, path.display());
        for (program, args) in plan {
            let stdout = command::run(&program, &args)?;
            debug!("{} finished: {} bytes of output", program, stdout.len());
        }
        Ok(())
    }
}

impl DeviceOperations for DeviceCommands {
    fn apply(
        &self,
        path: &Path,
        operation: DeviceOperation,
    ) -> std::result::Result<(), OperationError> {
        Ok(self.run(path, operation)?)
    }
}

fn is_nvme(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("nvme"))
}
