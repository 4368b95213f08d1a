//! Plateau - steady-state performance testing for storage devices
//!
//! # Usage
//!
//! ```bash
//! # Run the IOPS test against an SSD
//! sudo plateau run /dev/nvme0n1
//!
//! # Run the latency test against a RAID 10 array
//! sudo plateau run /dev/md0 --test latency --array-level 10 \
//!     --member /dev/sdb --member /dev/sdc --member /dev/sdd --member /dev/sde
//!
//! # Re-check stored round values offline
//! plateau check 1000 998 999 1000 998
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use clap_mangen::Man;
use console::style;
use plateau_core::{DeviceOperation, Settings, TestKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// Plateau - steady-state performance testing for SSDs, HDDs and RAID arrays
#[derive(Parser)]
#[command(name = "plateau")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Suppress ALL output (implies --quiet and --yes)
    #[arg(long, global = true)]
    silent: bool,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true, value_name = "FILE", env = "PLATEAU_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Device kind for a single-device run
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Solid-state drive: secure erase and precondition before testing
    Ssd,
    /// Hard disk drive: tested as-is
    Hdd,
}

/// Operation to fan out across array members
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OpArg {
    /// Secure erase every member
    Erase,
    /// Sequentially fill every member twice
    Precondition,
}

impl From<OpArg> for DeviceOperation {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Erase => Self::SecureErase,
            OpArg::Precondition => Self::Precondition,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a steady-state test against a device
    Run {
        /// Target device (e.g., /dev/nvme0n1, /dev/sdb, /dev/md0)
        target: PathBuf,

        /// Test to run (iops, latency, throughput)
        #[arg(short, long, default_value = "iops")]
        test: TestKind,

        /// Device kind when not testing an array
        #[arg(short, long, value_enum, default_value = "ssd")]
        kind: KindArg,

        /// RAID level; makes the target a software RAID array
        #[arg(long, value_name = "LEVEL", requires = "members")]
        array_level: Option<u8>,

        /// Array member device (repeat for each member)
        #[arg(long = "member", value_name = "DEVICE", requires = "array_level")]
        members: Vec<PathBuf>,

        /// Rounds in the steady-state window
        #[arg(short, long)]
        window: Option<usize>,

        /// Maximum rounds before giving up
        #[arg(short, long)]
        max_rounds: Option<usize>,

        /// Runtime of each trial in seconds
        #[arg(short, long)]
        runtime: Option<u64>,

        /// Output the report in JSON format
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to a file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Skip confirmation prompt (use with caution!)
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Apply an operation to every array member and recreate the array
    Array {
        /// Array device (e.g., /dev/md0)
        device: PathBuf,

        /// RAID level
        #[arg(short, long)]
        level: u8,

        /// Array member device (repeat for each member)
        #[arg(long = "member", value_name = "DEVICE", required = true)]
        members: Vec<PathBuf>,

        /// Operation to apply to each member
        #[arg(long, value_enum)]
        op: OpArg,

        /// Skip confirmation prompt (use with caution!)
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Check a series of round values for steady state
    Check {
        /// Dependent variable values, oldest first
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<f64>,

        /// Round index of the first value
        #[arg(short, long, default_value_t = 0)]
        start: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Create a configuration file with default values
        #[arg(long)]
        init: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man pages
    Mangen {
        /// Output directory for man pages
        #[arg(short, long, default_value = ".")]
        out_dir: String,
    },
}

fn main() {
    // Set up panic handler for nicer error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    if let Err(e) = run() {
        eprintln!("{} {}", style("Error:").red().bold(), e);

        // Show cause chain in verbose mode
        if std::env::var("RUST_BACKTRACE").is_ok() {
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  {} {}", style("Caused by:").yellow(), cause);
                source = cause.source();
            }
        }

        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // --silent implies --quiet (no logs at all, not even errors to tracing)
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet || cli.silent {
        EnvFilter::new("off")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let silent = cli.silent;
    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(Some(path.clone())),
        None => Settings::load(),
    };
    tracing::debug!("Settings: {:?}", settings);

    // First Ctrl+C requests cancellation between rounds, a second one exits
    let cancel_requested = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel_requested);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            if !silent {
                eprintln!("\n{}", style("Forced exit").red().bold());
            }
            std::process::exit(130);
        }
        if !silent {
            eprintln!(
                "\n{}",
                style("Cancelling after the current round... Press Ctrl+C again to force exit")
                    .yellow()
            );
        }
    })
    .context("Failed to install Ctrl+C handler")?;

    match cli.command {
        Commands::Run {
            target,
            test,
            kind,
            array_level,
            members,
            window,
            max_rounds,
            runtime,
            json,
            output,
            yes,
        } => commands::run::execute(commands::run::RunArgs {
            target,
            test,
            ssd: kind == KindArg::Ssd,
            array_level,
            members,
            window,
            max_rounds,
            runtime,
            json: json || settings.output.json,
            output,
            skip_confirm: yes || silent, // --silent implies --yes
            silent,
            settings,
            cancel_flag: cancel_requested,
        }),
        Commands::Array {
            device,
            level,
            members,
            op,
            yes,
        } => commands::array::execute(commands::array::ArrayArgs {
            device,
            level,
            members,
            operation: op.into(),
            skip_confirm: yes || silent,
            silent,
            settings,
        }),
        Commands::Check {
            values,
            start,
            json,
        } => commands::check::execute(&values, start, json, &settings, silent),
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                silent,
                config_file: cli.config,
            })
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        Commands::Mangen { out_dir } => {
            let cmd = Cli::command();
            let out_path = std::path::Path::new(&out_dir);
            std::fs::create_dir_all(out_path)?;

            let man = Man::new(cmd.clone());
            let mut buffer = Vec::new();
            man.render(&mut buffer)?;
            std::fs::write(out_path.join("plateau.1"), buffer)?;
            if !silent {
                println!("Generated: {}/plateau.1", out_dir);
            }

            for subcommand in cmd.get_subcommands() {
                let name = subcommand.get_name();
                if subcommand.is_hide_set()
                    || name == "completions"
                    || name == "mangen"
                    || name == "help"
                {
                    continue;
                }

                let man = Man::new(subcommand.clone());
                let mut buffer = Vec::new();
                man.render(&mut buffer)?;
                let filename = format!("plateau-{}.1", name);
                std::fs::write(out_path.join(&filename), buffer)?;
                if !silent {
                    println!("Generated: {}/{}", out_dir, filename);
                }
            }

            if !silent {
                println!(
                    "\nInstall with: sudo cp {}/*.1 /usr/local/share/man/man1/",
                    out_dir
                );
            }
            Ok(())
        }
    }
}
