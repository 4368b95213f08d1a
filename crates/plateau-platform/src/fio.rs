//! Workload trials through `fio`
//!
//! Each trial is one time-based fio job against the raw device with direct
//! I/O. fio's JSON output is reduced to a [`MeasurementRecord`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use plateau_core::{
    AccessPattern, BlockSize, DirectionStats, FioSettings, LatencyTriple, MeasurementRecord,
    TrialRunner, WorkloadMix,
};
use serde::Deserialize;
use tracing::debug;

use crate::command;
use crate::{PlatformError, Result};

/// Invocation options shared by trials and preconditioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FioOptions {
    /// Path or name of the fio binary
    pub binary: String,
    /// I/O engine (`libaio`, `io_uring`, ...)
    pub ioengine: String,
    /// Outstanding I/O per job
    pub iodepth: u32,
    /// Parallel jobs, reported as one group
    pub numjobs: u32,
    /// Length of each trial
    pub runtime: Duration,
}

impl Default for FioOptions {
    fn default() -> Self {
        Self::from(&FioSettings::default())
    }
}

impl From<&FioSettings> for FioOptions {
    fn from(settings: &FioSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            ioengine: settings.ioengine.clone(),
            iodepth: settings.iodepth,
            numjobs: settings.numjobs,
            runtime: Duration::from_secs(settings.runtime_secs),
        }
    }
}

impl FioOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fio binary
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the I/O engine
    pub fn ioengine(mut self, engine: impl Into<String>) -> Self {
        self.ioengine = engine.into();
        self
    }

    /// Set the queue depth
    pub fn iodepth(mut self, depth: u32) -> Self {
        self.iodepth = depth;
        self
    }

    /// Set the job count
    pub fn numjobs(mut self, jobs: u32) -> Self {
        self.numjobs = jobs;
        self
    }

    /// Set the trial runtime
    pub fn runtime(mut self, runtime: Duration) -> Self {
        self.runtime = runtime;
        self
    }
}

/// Runs workload trials against one device with fio
#[derive(Debug, Clone)]
pub struct FioRunner {
    target: PathBuf,
    options: FioOptions,
}

impl FioRunner {
    /// Create a runner for `target`
    pub fn new(target: impl Into<PathBuf>, options: FioOptions) -> Self {
        Self {
            target: target.into(),
            options,
        }
    }

    /// Device trials run against
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// fio arguments for one trial
    pub fn trial_args(&self, mix: WorkloadMix, block_size: BlockSize) -> Vec<String> {
        let rw = match mix.pattern {
            AccessPattern::Random => "randrw",
            AccessPattern::Sequential => "rw",
        };
        vec![
            format!("--name=plateau-{}-{}", mix.read_pct, block_size),
            format!("--filename={}", self.target.display()),
            format!("--rw={rw}"),
            format!("--rwmixread={}", mix.read_pct),
            format!("--bs={block_size}"),
            "--direct=1".to_string(),
            format!("--ioengine={}", self.options.ioengine),
            format!("--iodepth={}", self.options.iodepth),
            format!("--numjobs={}", self.options.numjobs),
            format!("--runtime={}", self.options.runtime.as_secs().max(1)),
            "--time_based".to_string(),
            "--group_reporting".to_string(),
            "--output-format=json".to_string(),
        ]
    }

    /// Run one trial and parse its results
    pub fn run(&self, mix: WorkloadMix, block_size: BlockSize) -> Result<MeasurementRecord> {
        debug!(
            "fio trial {} bs={} on {}",
            mix,
            block_size,
            self.target.display()
        );
        let stdout = command::run(&self.options.binary, self.trial_args(mix, block_size))?;
        let record = parse_fio_json(&stdout)?;
        debug!(
            "fio trial {} bs={}: {:.0} IOPS, {:.0} KiB/s",
            mix,
            block_size,
            record.total_iops(),
            record.total_bandwidth_kbps()
        );
        Ok(record)
    }
}

impl TrialRunner for FioRunner {
    fn run_trial(
        &mut self,
        mix: WorkloadMix,
        block_size: BlockSize,
    ) -> plateau_core::Result<MeasurementRecord> {
        Ok(self.run(mix, block_size)?)
    }
}

#[derive(Debug, Deserialize)]
struct FioOutput {
    jobs: Vec<FioJob>,
}

#[derive(Debug, Deserialize)]
struct FioJob {
    #[serde(default)]
    error: i64,
    read: FioDirection,
    write: FioDirection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FioDirection {
    io_kbytes: u64,
    bw: f64,
    iops: f64,
    lat_ns: Option<FioLatency>,
    /// Older fio releases report microseconds under `lat`
    lat: Option<FioLatency>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default)]
struct FioLatency {
    min: f64,
    max: f64,
    mean: f64,
}

impl FioLatency {
    fn scaled(self, divisor: f64) -> LatencyTriple {
        LatencyTriple {
            min: self.min / divisor,
            max: self.max / divisor,
            mean: self.mean / divisor,
        }
    }
}

impl From<FioDirection> for DirectionStats {
    fn from(dir: FioDirection) -> Self {
        let latency = match (dir.lat_ns, dir.lat) {
            (Some(ns), _) => ns.scaled(1000.0),
            (None, Some(us)) => us.scaled(1.0),
            (None, None) => LatencyTriple::default(),
        };
        Self {
            io_kbytes: dir.io_kbytes,
            iops: dir.iops,
            bandwidth_kbps: dir.bw,
            latency,
        }
    }
}

/// Parse fio `--output-format=json` output into a measurement record.
///
/// Text before the first `{` (fio warnings) is skipped. Only the first job
/// is read; trials run with `--group_reporting`.
pub fn parse_fio_json(output: &str) -> Result<MeasurementRecord> {
    let start = output
        .find('{')
        .ok_or_else(|| PlatformError::Parse("no JSON object in fio output".to_string()))?;

    let parsed: FioOutput = serde_json::from_str(&output[start..])
        .map_err(|e| PlatformError::Parse(format!("invalid fio JSON: {e}")))?;

    let job = parsed
        .jobs
        .into_iter()
        .next()
        .ok_or_else(|| PlatformError::Parse("fio reported no jobs".to_string()))?;

    if job.error != 0 {
        return Err(PlatformError::Parse(format!(
            "fio job reported error {}",
            job.error
        )));
    }

    Ok(MeasurementRecord {
        read: job.read.into(),
        write: job.write.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "fio version" : "fio-3.36",
      "jobs" : [
        {
          "jobname" : "plateau-65-4k",
          "error" : 0,
          "read" : {
            "io_bytes" : 819200000,
            "io_kbytes" : 800000,
            "bw" : 13333,
            "iops" : 3333.5,
            "lat_ns" : { "min" : 20000, "max" : 950000, "mean" : 61250.5 }
          },
          "write" : {
            "io_kbytes" : 430000,
            "bw" : 7166,
            "iops" : 1791.75,
            "lat_ns" : { "min" : 15000, "max" : 2100000, "mean" : 48000.0 }
          }
        }
      ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let record = parse_fio_json(SAMPLE).unwrap();
        assert_eq!(record.read.io_kbytes, 800000);
        assert_eq!(record.read.bandwidth_kbps, 13333.0);
        assert_eq!(record.read.iops, 3333.5);
        assert_eq!(record.read.latency.min, 20.0);
        assert_eq!(record.read.latency.max, 950.0);
        assert!((record.read.latency.mean - 61.2505).abs() < 1e-9);
        assert_eq!(record.write.latency.mean, 48.0);
        assert_eq!(record.total_iops(), 5125.25);
    }

    #[test]
    fn test_parse_skips_leading_warnings() {
        let output = format!("fio: note: both iodepth >= 1 and synchronous I/O engine\n{SAMPLE}");
        assert!(parse_fio_json(&output).is_ok());
    }

    #[test]
    fn test_parse_legacy_microsecond_latency() {
        let output = r#"{"jobs":[{"read":{"io_kbytes":0,"bw":0,"iops":0,
            "lat":{"min":1.5,"max":9.0,"mean":3.0}},"write":{}}]}"#;
        let record = parse_fio_json(output).unwrap();
        assert_eq!(record.read.latency.mean, 3.0);
        assert_eq!(record.write, DirectionStats::default());
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse_fio_json("fio: failed to open /dev/nvme9n1"),
            Err(PlatformError::Parse(_))
        ));
        assert!(parse_fio_json(r#"{"jobs":[]}"#).is_err());
        assert!(parse_fio_json(r#"{"jobs":[{"read":{}"#).is_err());
        assert!(parse_fio_json(r#"{"jobs":[{"error":5,"read":{},"write":{}}]}"#).is_err());
    }

    #[test]
    fn test_trial_args() {
        let runner = FioRunner::new(
            "/dev/nvme0n1",
            FioOptions::new()
                .ioengine("io_uring")
                .iodepth(16)
                .numjobs(4)
                .runtime(Duration::from_secs(30)),
        );

        let args = runner.trial_args(WorkloadMix::random(65), BlockSize::K4);
        assert!(args.contains(&"--filename=/dev/nvme0n1".to_string()));
        assert!(args.contains(&"--rw=randrw".to_string()));
        assert!(args.contains(&"--rwmixread=65".to_string()));
        assert!(args.contains(&"--bs=4k".to_string()));
        assert!(args.contains(&"--ioengine=io_uring".to_string()));
        assert!(args.contains(&"--iodepth=16".to_string()));
        assert!(args.contains(&"--numjobs=4".to_string()));
        assert!(args.contains(&"--runtime=30".to_string()));
        assert!(args.contains(&"--output-format=json".to_string()));

        let args = runner.trial_args(WorkloadMix::sequential(0), BlockSize::M1);
        assert!(args.contains(&"--rw=rw".to_string()));
        assert!(args.contains(&"--rwmixread=0".to_string()));
        assert!(args.contains(&"--bs=1m".to_string()));
    }

    #[test]
    fn test_options_from_settings() {
        let settings = FioSettings {
            binary: "/opt/fio/bin/fio".to_string(),
            runtime_secs: 5,
            iodepth: 8,
            numjobs: 2,
            ioengine: "psync".to_string(),
        };
        let options = FioOptions::from(&settings);
        assert_eq!(options.binary, "/opt/fio/bin/fio");
        assert_eq!(options.runtime, Duration::from_secs(5));
        assert_eq!(options.iodepth, 8);
        assert_eq!(options.ioengine, "psync");
    }
}
