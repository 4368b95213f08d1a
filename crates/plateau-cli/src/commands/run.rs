//! Run command - prepare a device and drive a steady-state test

use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::Confirm;
use plateau_core::{
    prepare, ArrayMember, ArrayOperationOutcome, ArraySpec, Config, DeviceKind, Error, Outcome,
    ParallelDeviceOperator, Settings, TestKind, TestOrchestrator, TestReport,
};
use plateau_platform::{has_elevated_privileges, DeviceCommands, FioOptions, FioRunner, MdadmArray};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::check::{print_window, round_span};
use crate::progress::{round_bar, round_message};

/// Arguments for the run command
pub struct RunArgs {
    pub target: PathBuf,
    pub test: TestKind,
    pub ssd: bool,
    pub array_level: Option<u8>,
    pub members: Vec<PathBuf>,
    pub window: Option<usize>,
    pub max_rounds: Option<usize>,
    pub runtime: Option<u64>,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub skip_confirm: bool,
    pub silent: bool,
    pub settings: Settings,
    pub cancel_flag: Arc<AtomicBool>,
}

impl RunArgs {
    /// Device kind described by the arguments
    pub fn device_kind(&self) -> DeviceKind {
        match self.array_level {
            Some(level) => DeviceKind::Array(ArraySpec {
                device: self.target.clone(),
                level,
                members: self.members.iter().map(ArrayMember::new).collect(),
            }),
            None if self.ssd => DeviceKind::Ssd {
                path: self.target.clone(),
            },
            None => DeviceKind::Hdd {
                path: self.target.clone(),
            },
        }
    }

    /// Run configuration: settings with command-line overrides applied
    pub fn config(&self) -> Config {
        let mut config = self.settings.to_config();
        if let Some(window) = self.window {
            config = config.window_size(window);
        }
        if let Some(max_rounds) = self.max_rounds {
            config = config.max_rounds(max_rounds);
        }
        config
    }

    /// fio options with the runtime override applied
    pub fn fio_options(&self) -> FioOptions {
        let options = FioOptions::from(&self.settings.fio);
        match self.runtime {
            Some(secs) => options.runtime(Duration::from_secs(secs)),
            None => options,
        }
    }
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let silent = args.silent;

    // Everything that can be rejected without touching the device
    let kind = args.device_kind();
    kind.validate()?;
    let config = args.config();
    if args.runtime == Some(0) {
        bail!("Trial runtime must be at least 1 second");
    }
    let orchestrator = TestOrchestrator::new(args.test, &config)?;
    let fio_options = args.fio_options();
    tracing::debug!("Run configuration: {:?}, fio: {:?}", config, fio_options);

    if !has_elevated_privileges() {
        #[cfg(unix)]
        bail!(
            "Root privileges required.\n\
             Try running with: sudo plateau run ..."
        );

        #[cfg(not(unix))]
        bail!("Elevated privileges required for raw device access.");
    }

    let dv = args.test.dependent_variable();
    println_if!(silent, "{} {}", style("Target:").bold(), kind);
    println_if!(
        silent,
        "  Test: {} (tracking {})",
        style(args.test).cyan(),
        dv.metric
    );
    println_if!(
        silent,
        "  Window: {} rounds, at most {} rounds, {}s per trial",
        config.window_size,
        config.max_rounds,
        fio_options.runtime.as_secs()
    );

    if !matches!(kind, DeviceKind::Hdd { .. }) && !args.skip_confirm {
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
            style("║  THE TARGET WILL BE SECURE ERASED AND OVERWRITTEN!         ║")
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
            .with_prompt(format!("Erase and test {}?", args.target.display()))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !proceed {
            println!("{}", style("Aborted.").yellow());
            return Ok(());
        }
    }

    // Preparation
    println_if!(silent, "\n{}", style("Preparing device...").bold());
    let commands = DeviceCommands::new(fio_options.clone());
    let operator = ParallelDeviceOperator::new()
        .poll_interval(config.poll_interval)
        .ready_timeout(config.ready_timeout);
    let array = match &kind {
        DeviceKind::Array(spec) => {
            Some(MdadmArray::new(spec).assume_clean(args.settings.array.assume_clean))
        }
        _ => None,
    };

    match prepare(&kind, &commands, array.as_ref(), &operator) {
        Ok(Some(outcome)) => print_member_outcomes(&outcome, silent),
        Ok(None) => {}
        Err(Error::AggregateOperation(outcome)) => {
            print_member_outcomes(&outcome, silent);
            bail!("Preparation failed: {}", outcome.failure_summary());
        }
        Err(e) => bail!("Preparation failed: {}", e),
    }
    println_if!(silent, "  {} Device prepared", style("✓").green());

    // Rounds
    println_if!(silent, "\n{}", style("Running rounds...").bold());
    let pb = round_bar(config.max_rounds, silent || args.json);
    let pb_clone = pb.clone();
    let metric = dv.metric;
    let orchestrator = orchestrator.on_round(move |progress| {
        pb_clone.set_position(progress.round as u64 + 1);
        pb_clone.set_message(round_message(progress, metric));
    });

    let run_cancel = orchestrator.cancel_handle();
    let cancel_flag = Arc::clone(&args.cancel_flag);
    let finished = Arc::new(AtomicBool::new(false));
    let finished_for_thread = Arc::clone(&finished);
    std::thread::spawn(move || {
        while !cancel_flag.load(Ordering::SeqCst) {
            if finished_for_thread.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        run_cancel.store(true, Ordering::SeqCst);
    });

    let mut runner = FioRunner::new(kind.test_path(), fio_options);
    let start_time = Instant::now();
    let result = orchestrator.run(&mut runner);
    finished.store(true, Ordering::SeqCst);
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(Error::Cancelled) => {
            println_if!(silent, "\n{}", style("Test cancelled by user.").yellow());
            return Ok(());
        }
        Err(e) => {
            tracing::debug!("Run failed: {:?}", e);
            bail!("Test failed: {}", e)
        }
    };

    if let Some(path) = &args.output {
        let json = report.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if args.json {
        println_if!(silent, "{}", report.to_json_pretty()?);
    } else {
        print_report(&report, &config, start_time.elapsed(), silent);
        if let Some(path) = &args.output {
            println_if!(
                silent,
                "\n  {} Report written to {}",
                style("ℹ").blue(),
                path.display()
            );
        }
    }

    Ok(())
}

/// Per-member lines of an array fan-out
pub fn print_member_outcomes(outcome: &ArrayOperationOutcome, silent: bool) {
    for member in &outcome.members {
        if member.succeeded {
            println_if!(
                silent,
                "  {} {} {}",
                style("✓").green(),
                outcome.operation,
                member.member
            );
        } else {
            println_if!(
                silent,
                "  {} {} {}: {}",
                style("✗").red(),
                outcome.operation,
                member.member,
                member.error_detail.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn print_report(report: &TestReport, config: &Config, elapsed: Duration, silent: bool) {
    let result = report.outcome.result();
    println_if!(silent);
    match &report.outcome {
        Outcome::Steady(_) => println_if!(
            silent,
            "{} {}",
            style("STEADY").green().bold(),
            style(format!(
                "after {} rounds (window {})",
                report.rounds_run(),
                round_span(&result.rounds)
            ))
            .dim()
        ),
        Outcome::RoundsExhausted(_) => println_if!(
            silent,
            "{} {}",
            style("ROUNDS EXHAUSTED").yellow().bold(),
            style(format!(
                "steady state not reached in {} rounds",
                report.rounds_run()
            ))
            .dim()
        ),
    }
    println_if!(silent, "  Elapsed: {:.1}s", elapsed.as_secs_f64());

    print_window(
        result,
        &config.criteria,
        Some(report.dependent_variable.metric),
        silent,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use plateau_core::{DeviceOperation, MemberOutcome};

    fn args() -> RunArgs {
        RunArgs {
            target: PathBuf::from("/dev/sdb"),
            test: TestKind::Iops,
            ssd: true,
            array_level: None,
            members: Vec::new(),
            window: None,
            max_rounds: None,
            runtime: None,
            json: false,
            output: None,
            skip_confirm: true,
            silent: true,
            settings: Settings::default(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn test_device_kind_single() {
        assert!(matches!(args().device_kind(), DeviceKind::Ssd { .. }));

        let hdd = RunArgs {
            ssd: false,
            ..args()
        };
        assert!(matches!(hdd.device_kind(), DeviceKind::Hdd { .. }));
    }

    #[test]
    fn test_device_kind_array() {
        let array = RunArgs {
            target: PathBuf::from("/dev/md0"),
            array_level: Some(1),
            members: vec![PathBuf::from("/dev/sdb"), PathBuf::from("/dev/sdc")],
            ..args()
        };
        match array.device_kind() {
            DeviceKind::Array(spec) => {
                assert_eq!(spec.level, 1);
                assert_eq!(spec.members.len(), 2);
                assert_eq!(spec.device, PathBuf::from("/dev/md0"));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_config_overrides() {
        let defaults = args().config();
        assert_eq!(defaults.window_size, 5);
        assert_eq!(defaults.max_rounds, 25);

        let overridden = RunArgs {
            window: Some(3),
            max_rounds: Some(10),
            ..args()
        }
        .config();
        assert_eq!(overridden.window_size, 3);
        assert_eq!(overridden.max_rounds, 10);
    }

    #[test]
    fn test_fio_runtime_override() {
        assert_eq!(args().fio_options().runtime.as_secs(), 60);
        let short = RunArgs {
            runtime: Some(5),
            ..args()
        };
        assert_eq!(short.fio_options().runtime.as_secs(), 5);
    }

    #[test]
    fn test_invalid_window_rejected_before_device_access() {
        let bad = RunArgs {
            window: Some(10),
            max_rounds: Some(5),
            ..args()
        };
        assert!(execute(bad).is_err());
    }

    #[test]
    fn test_invalid_array_rejected() {
        let bad = RunArgs {
            target: PathBuf::from("/dev/md0"),
            array_level: Some(5),
            members: vec![PathBuf::from("/dev/sdb"), PathBuf::from("/dev/sdc")],
            ..args()
        };
        let err = execute(bad).unwrap_err();
        assert!(err.to_string().contains("RAID 5"));
    }

    #[test]
    fn test_print_member_outcomes_silent() {
        let outcome = ArrayOperationOutcome {
            operation: DeviceOperation::SecureErase,
            members: vec![
                MemberOutcome::success(ArrayMember::new("/dev/sdb")),
                MemberOutcome::failure(ArrayMember::new("/dev/sdc"), "busy"),
            ],
        };
        print_member_outcomes(&outcome, true);
    }
}
