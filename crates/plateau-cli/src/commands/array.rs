//! Array command - fan an operation out across array members
//!
//! Every member gets the operation in parallel. When all succeed the array
//! is stopped, recreated and waited on until it is ready; any failure leaves
//! the array untouched and lists the failing members.

use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::Confirm;
use plateau_core::{
    ArrayMember, ArraySpec, DeviceOperation, DeviceOperations, Error, ParallelDeviceOperator,
    Settings,
};
use plateau_platform::{has_elevated_privileges, DeviceCommands, FioOptions, MdadmArray};
use std::path::PathBuf;
use std::time::Instant;

use super::run::print_member_outcomes;

/// Arguments for the array command
pub struct ArrayArgs {
    pub device: PathBuf,
    pub level: u8,
    pub members: Vec<PathBuf>,
    pub operation: DeviceOperation,
    pub skip_confirm: bool,
    pub silent: bool,
    pub settings: Settings,
}

impl ArrayArgs {
    /// Array described by the arguments
    pub fn spec(&self) -> ArraySpec {
        ArraySpec {
            device: self.device.clone(),
            level: self.level,
            members: self.members.iter().map(ArrayMember::new).collect(),
        }
    }
}

/// Execute the array command
pub fn execute(args: ArrayArgs) -> Result<()> {
    let silent = args.silent;
    let spec = args.spec();
    spec.validate()?;
    let config = args.settings.to_config();
    config.validate_array()?;

    if !has_elevated_privileges() {
        #[cfg(unix)]
        bail!(
            "Root privileges required.\n\
             Try running with: sudo plateau array ..."
        );

        #[cfg(not(unix))]
        bail!("Elevated privileges required for raw device access.");
    }

    println_if!(
        silent,
        "{} RAID {} {}",
        style("Array:").bold(),
        spec.level,
        spec.device.display()
    );
    for member in &spec.members {
        println_if!(silent, "  {} {}", style("•").dim(), member);
    }
    println_if!(
        silent,
        "  Operation: {}",
        style(args.operation.to_string()).cyan()
    );

    if !args.skip_confirm {
        println!();
        println!(
            "{}",
            style("╔════════════════════════════════════════════════════════════╗")
                .red()
                .bold()
        );
        println!(
            "{}",
            style("║                        WARNING                             ║")
                .red()
                .bold()
        );
        println!(
            "{}",
            style("║  THE ARRAY WILL BE DESTROYED AND ALL MEMBER DATA LOST!     ║")
                .red()
                .bold()
        );
        println!(
            "{}",
            style("╚════════════════════════════════════════════════════════════╝")
                .red()
                .bold()
        );
        println!();

        let proceed = Confirm::new()
            .with_prompt(format!(
                "Run {} on {} members of {}?",
                args.operation,
                spec.members.len(),
                spec.device.display()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !proceed {
            println!("{}", style("Aborted.").yellow());
            return Ok(());
        }
    }

    let commands = DeviceCommands::new(FioOptions::from(&args.settings.fio));
    let controller = MdadmArray::new(&spec).assume_clean(args.settings.array.assume_clean);
    let operator = ParallelDeviceOperator::new()
        .poll_interval(config.poll_interval)
        .ready_timeout(config.ready_timeout);

    println_if!(
        silent,
        "\n{}",
        style(format!("Running {} on members...", args.operation)).bold()
    );
    let start_time = Instant::now();
    let result = operator.apply_and_recreate(
        &spec.members,
        args.operation,
        |member, op| commands.apply(member.path(), op),
        &controller,
    );

    match result {
        Ok(outcome) => {
            print_member_outcomes(&outcome, silent);
            println_if!(
                silent,
                "  {} Array {} recreated and ready in {:.1}s",
                style("✓").green(),
                spec.device.display(),
                start_time.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(Error::AggregateOperation(outcome)) => {
            print_member_outcomes(&outcome, silent);
            bail!(
                "{} of {} members failed; array left untouched",
                outcome.failures().count(),
                outcome.members.len()
            );
        }
        Err(Error::Timeout { waited }) => bail!(
            "Array {} not ready after {:.0}s",
            spec.device.display(),
            waited.as_secs_f64()
        ),
        Err(e) => bail!("Array operation failed: {}", e),
    }
}
