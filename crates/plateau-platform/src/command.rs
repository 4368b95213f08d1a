//! Blocking invocation of external tools

use std::ffi::OsStr;
use std::process::Command;

use tracing::debug;

use crate::{PlatformError, Result};

/// Run `program` with `args`, returning stdout on a zero exit status
pub(crate) fn run<I, S>(program: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    debug!("Running {:?}", command);

    let output = command.output().map_err(|e| PlatformError::Spawn {
        program: program.to_string(),
        source: e,
    })?;

    if !output.status.success() {
        return Err(PlatformError::CommandFailed {
            program: program.to_string(),
            code: output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
