//! Configuration file management command

use anyhow::{Context, Result};
use console::style;
use plateau_core::Settings;
use std::path::PathBuf;

/// Arguments for the config command
pub struct ConfigArgs {
    /// Initialize a new configuration file with defaults
    pub init: bool,
    /// Show the path to the configuration file
    pub path: bool,
    /// Show configuration in JSON format
    pub json: bool,
    /// Suppress output (for scripting)
    pub silent: bool,
    /// Custom configuration file path (overrides default)
    pub config_file: Option<PathBuf>,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    let config_path = args.config_file.clone().or_else(Settings::config_path);

    if args.path {
        if let Some(path) = &config_path {
            if !args.silent {
                println!("{}", path.display());
            }
        } else if !args.silent {
            eprintln!("{}", style("Could not determine config path").yellow());
        }
        return Ok(());
    }

    if args.init {
        return init_config(config_path, args.silent);
    }

    show_config(config_path, args.json, args.silent)
}

/// Write a configuration file with default values
fn init_config(config_path: Option<PathBuf>, silent: bool) -> Result<()> {
    let path = config_path.context("Could not determine configuration directory")?;

    if path.exists() {
        if !silent {
            eprintln!(
                "{} Configuration file already exists at: {}",
                style("Warning:").yellow(),
                path.display()
            );
            eprintln!("Use a text editor to modify it, or delete it to re-initialize.");
        }
        return Ok(());
    }

    let saved_path = Settings::default()
        .save_to_path(Some(path))
        .context("Failed to save configuration file")?;

    if !silent {
        println!(
            "{} Created configuration file at: {}",
            style("Success:").green(),
            saved_path.display()
        );
        println!();
        println!("You can edit this file to customize default settings.");
        println!("Example settings:");
        println!();
        println!("  [steady_state]");
        println!("  window_size = 5         # Rounds in the measurement window");
        println!("  excursion_rule = \"band\" # Bound deviation from the average");
        println!();
        println!("  [fio]");
        println!("  runtime_secs = 30       # Shorter trials");
        println!("  ioengine = \"io_uring\"");
    }

    Ok(())
}

/// Show the current configuration
fn show_config(config_path: Option<PathBuf>, json: bool, silent: bool) -> Result<()> {
    if silent {
        return Ok(());
    }

    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let settings = Settings::load_from_path(config_path.clone());

    if json {
        let json_output = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize settings to JSON")?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("{}", style("Plateau Configuration").bold());
    println!();

    if let Some(path) = &config_path {
        if config_exists {
            println!("  {} {}", style("Config file:").dim(), path.display());
        } else {
            println!(
                "  {} {} {}",
                style("Config file:").dim(),
                path.display(),
                style("(not found, using defaults)").yellow()
            );
        }
    }
    println!();

    let ss = &settings.steady_state;
    println!("{}", style("[steady_state]").cyan());
    println!("  window_size = {}", ss.window_size);
    println!("  max_rounds = {}", ss.max_rounds);
    println!("  excursion_rule = \"{}\"", ss.excursion_rule);
    println!("  excursion_pct = {}", ss.excursion_pct);
    println!("  slope_span = \"{}\"", ss.slope_span);
    println!("  slope_pct = {}", ss.slope_pct);
    println!();

    println!("{}", style("[fio]").cyan());
    println!("  binary = \"{}\"", settings.fio.binary);
    println!("  runtime_secs = {}", settings.fio.runtime_secs);
    println!("  iodepth = {}", settings.fio.iodepth);
    println!("  numjobs = {}", settings.fio.numjobs);
    println!("  ioengine = \"{}\"", settings.fio.ioengine);
    println!();

    println!("{}", style("[array]").cyan());
    println!("  poll_interval_ms = {}", settings.array.poll_interval_ms);
    println!("  ready_timeout_secs = {}", settings.array.ready_timeout_secs);
    println!("  assume_clean = {}", settings.array.assume_clean);
    println!();

    println!("{}", style("[output]").cyan());
    println!("  json = {}", settings.output.json);

    if let Err(e) = settings.to_config().validate() {
        println!();
        println!("{} {}", style("Warning:").yellow(), e);
    }

    if !config_exists {
        println!();
        println!(
            "{}",
            style("Run 'plateau config --init' to create a configuration file.").dim()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plateau_core::{ExcursionRule, SlopeSpan};
    use tempfile::TempDir;

    fn args(config_file: Option<PathBuf>) -> ConfigArgs {
        ConfigArgs {
            init: false,
            path: false,
            json: false,
            silent: true,
            config_file,
        }
    }

    #[test]
    fn test_show_config_silent() {
        assert!(show_config(None, false, true).is_ok());
        assert!(show_config(None, true, true).is_ok());
    }

    #[test]
    fn test_execute_path_flag() {
        let result = execute(ConfigArgs {
            path: true,
            ..args(None)
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_init_creates_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("plateau_config.toml");

        execute(ConfigArgs {
            init: true,
            ..args(Some(path.clone()))
        })
        .unwrap();
        assert!(path.exists());

        // Existing files are left alone
        std::fs::write(&path, "[fio]\nruntime_secs = 5\n").unwrap();
        execute(ConfigArgs {
            init: true,
            ..args(Some(path.clone()))
        })
        .unwrap();
        assert_eq!(Settings::load_from_path(Some(path)).fio.runtime_secs, 5);
    }

    #[test]
    fn test_settings_json_serialization() {
        let json = serde_json::to_string_pretty(&Settings::default()).unwrap();
        assert!(json.contains("window_size"));
        assert!(json.contains("runtime_secs"));
        assert!(json.contains("ready_timeout_secs"));
    }

    #[test]
    fn test_shown_rule_names_parse_back() {
        let shown = format!(
            "[steady_state]\nexcursion_rule = \"{}\"\nslope_span = \"{}\"\n",
            ExcursionRule::Band,
            SlopeSpan::Half
        );
        let settings = Settings::from_toml(&shown).unwrap();
        assert_eq!(settings.steady_state.excursion_rule, ExcursionRule::Band);
        assert_eq!(settings.steady_state.slope_span, SlopeSpan::Half);
    }
}
