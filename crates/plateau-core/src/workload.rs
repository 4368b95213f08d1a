//! Workload grid definitions.
//!
//! A steady-state test exercises a device with a fixed grid of workload mixes
//! (rows) and block sizes (columns). Each [`TestKind`] carries its own grid and
//! the single cell whose value is tracked across rounds to decide convergence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::measurement::Metric;

/// Smallest block size a trial may use (one sector)
pub const MIN_BLOCK_SIZE: u64 = 512;

/// Largest block size a trial may use (64 MiB)
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Access pattern of a workload mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPattern {
    /// Random offsets across the device
    #[default]
    Random,
    /// Sequential streaming
    Sequential,
}

/// One row of the workload grid: a read/write ratio and an access pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadMix {
    /// Percentage of reads (0-100); the remainder are writes
    pub read_pct: u8,
    /// Random or sequential access
    pub pattern: AccessPattern,
}

impl WorkloadMix {
    /// Random mix with the given read percentage
    pub const fn random(read_pct: u8) -> Self {
        Self {
            read_pct,
            pattern: AccessPattern::Random,
        }
    }

    /// Sequential mix with the given read percentage
    pub const fn sequential(read_pct: u8) -> Self {
        Self {
            read_pct,
            pattern: AccessPattern::Sequential,
        }
    }

    /// Percentage of writes
    pub fn write_pct(&self) -> u8 {
        100u8.saturating_sub(self.read_pct)
    }

    /// Check the read percentage is in range
    pub fn validate(&self) -> Result<()> {
        if self.read_pct > 100 {
            return Err(Error::InvalidConfig(format!(
                "read percentage {} exceeds 100",
                self.read_pct
            )));
        }
        Ok(())
    }
}

impl fmt::Display for WorkloadMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = match self.pattern {
            AccessPattern::Random => "rand",
            AccessPattern::Sequential => "seq",
        };
        write!(f, "{}/{} {}", self.read_pct, self.write_pct(), pattern)
    }
}

/// Block size of a trial, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockSize(u64);

impl BlockSize {
    /// 512 bytes
    pub const B512: Self = Self(512);
    /// 4 KiB
    pub const K4: Self = Self(4 * 1024);
    /// 8 KiB
    pub const K8: Self = Self(8 * 1024);
    /// 16 KiB
    pub const K16: Self = Self(16 * 1024);
    /// 32 KiB
    pub const K32: Self = Self(32 * 1024);
    /// 64 KiB
    pub const K64: Self = Self(64 * 1024);
    /// 128 KiB
    pub const K128: Self = Self(128 * 1024);
    /// 1 MiB
    pub const M1: Self = Self(1024 * 1024);

    /// Create a block size, checking it is a power of two within bounds
    pub fn new(bytes: u64) -> Result<Self> {
        if !bytes.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "block size must be a power of 2: {bytes}"
            )));
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&bytes) {
            return Err(Error::InvalidConfig(format!(
                "block size {bytes} outside {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE}"
            )));
        }
        Ok(Self(bytes))
    }

    /// Size in bytes
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockSize {
    /// Formats in the suffix style fio accepts (`512`, `4k`, `1m`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.0 >= MB && self.0 % MB == 0 {
            write!(f, "{}m", self.0 / MB)
        } else if self.0 >= KB && self.0 % KB == 0 {
            write!(f, "{}k", self.0 / KB)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for BlockSize {
    type Err = Error;

    /// Parse a size string like "512", "4k", "128K", "1M"
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidConfig("empty block size".to_string()));
        }

        let split_pos = s.find(|c: char| c.is_alphabetic()).unwrap_or(s.len());
        let (num_str, suffix) = s.split_at(split_pos);

        let num: u64 = num_str
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("invalid block size: {s}")))?;

        let multiplier = match suffix.to_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => 1024,
            "M" | "MB" | "MIB" => 1024 * 1024,
            _ => return Err(Error::InvalidConfig(format!("invalid block size: {s}"))),
        };

        let bytes = num
            .checked_mul(multiplier)
            .ok_or_else(|| Error::InvalidConfig(format!("{s} is too large")))?;

        Self::new(bytes)
    }
}

/// Parse a comma-separated list of block sizes, preserving order
pub fn parse_block_sizes(s: &str) -> Result<Vec<BlockSize>> {
    s.split(',').map(|part| part.trim().parse()).collect()
}

/// The grid cell tracked across rounds and the metric read from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentVariable {
    /// Row index into the workload mixes
    pub mix_index: usize,
    /// Column index into the block sizes
    pub block_size_index: usize,
    /// Which scalar of the cell's record to track
    pub metric: Metric,
}

/// The steady-state test variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Random IOPS across read/write mixes and block sizes
    #[default]
    Iops,
    /// Random-access latency at small block sizes
    Latency,
    /// Sequential read and write throughput
    Throughput,
}

const IOPS_READ_PCTS: [u8; 7] = [100, 95, 65, 50, 35, 5, 0];
const LATENCY_READ_PCTS: [u8; 3] = [100, 65, 0];

impl TestKind {
    /// All test kinds, in reporting order
    pub const ALL: [Self; 3] = [Self::Iops, Self::Latency, Self::Throughput];

    /// Workload mixes (rows) in configured order
    pub fn workload_mixes(self) -> Vec<WorkloadMix> {
        match self {
            Self::Iops => IOPS_READ_PCTS.iter().map(|&p| WorkloadMix::random(p)).collect(),
            Self::Latency => LATENCY_READ_PCTS
                .iter()
                .map(|&p| WorkloadMix::random(p))
                .collect(),
            Self::Throughput => vec![WorkloadMix::sequential(100), WorkloadMix::sequential(0)],
        }
    }

    /// Block sizes (columns) in configured order
    pub fn block_sizes(self) -> Vec<BlockSize> {
        match self {
            Self::Iops | Self::Throughput => vec![
                BlockSize::M1,
                BlockSize::K128,
                BlockSize::K64,
                BlockSize::K32,
                BlockSize::K16,
                BlockSize::K8,
                BlockSize::K4,
                BlockSize::B512,
            ],
            Self::Latency => vec![BlockSize::K8, BlockSize::K4, BlockSize::B512],
        }
    }

    /// The tracked cell: pure writes at 4k for IOPS and latency, 1M for throughput
    pub fn dependent_variable(self) -> DependentVariable {
        match self {
            Self::Iops => DependentVariable {
                mix_index: 6,
                block_size_index: 6,
                metric: Metric::TotalIops,
            },
            Self::Latency => DependentVariable {
                mix_index: 2,
                block_size_index: 1,
                metric: Metric::MeanWriteLatency,
            },
            Self::Throughput => DependentVariable {
                mix_index: 1,
                block_size_index: 0,
                metric: Metric::WriteBandwidth,
            },
        }
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Iops => "iops",
            Self::Latency => "latency",
            Self::Throughput => "throughput",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "iops" => Ok(Self::Iops),
            "latency" | "lat" => Ok(Self::Latency),
            "throughput" | "tp" => Ok(Self::Throughput),
            _ => Err(Error::InvalidConfig(format!(
                "Unknown test '{s}'. Use: iops, latency, or throughput"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_parse() {
        assert_eq!("512".parse::<BlockSize>().unwrap(), BlockSize::B512);
        assert_eq!("4k".parse::<BlockSize>().unwrap(), BlockSize::K4);
        assert_eq!("4K".parse::<BlockSize>().unwrap(), BlockSize::K4);
        assert_eq!("128KB".parse::<BlockSize>().unwrap(), BlockSize::K128);
        assert_eq!("1M".parse::<BlockSize>().unwrap(), BlockSize::M1);
        assert_eq!(" 8k ".parse::<BlockSize>().unwrap(), BlockSize::K8);

        assert!("3k".parse::<BlockSize>().is_err());
        assert!("256".parse::<BlockSize>().is_err());
        assert!("128M".parse::<BlockSize>().is_err());
        assert!("4x".parse::<BlockSize>().is_err());
        assert!("".parse::<BlockSize>().is_err());
    }

    #[test]
    fn test_block_size_display() {
        assert_eq!(BlockSize::B512.to_string(), "512");
        assert_eq!(BlockSize::K4.to_string(), "4k");
        assert_eq!(BlockSize::K128.to_string(), "128k");
        assert_eq!(BlockSize::M1.to_string(), "1m");
    }

    #[test]
    fn test_parse_block_sizes_keeps_order() {
        let sizes = parse_block_sizes("1M, 4k,512").unwrap();
        assert_eq!(sizes, vec![BlockSize::M1, BlockSize::K4, BlockSize::B512]);
        assert!(parse_block_sizes("4k,5k").is_err());
    }

    #[test]
    fn test_workload_mix() {
        let mix = WorkloadMix::random(65);
        assert_eq!(mix.write_pct(), 35);
        assert_eq!(mix.to_string(), "65/35 rand");
        assert!(mix.validate().is_ok());
        assert!(WorkloadMix::random(101).validate().is_err());
        assert_eq!(WorkloadMix::sequential(0).to_string(), "0/100 seq");
    }

    #[test]
    fn test_dependent_variable_in_grid() {
        for kind in TestKind::ALL {
            let dv = kind.dependent_variable();
            let mixes = kind.workload_mixes();
            let sizes = kind.block_sizes();
            assert!(dv.mix_index < mixes.len(), "{kind}");
            assert!(dv.block_size_index < sizes.len(), "{kind}");
            // Every test tracks a pure-write cell
            assert_eq!(mixes[dv.mix_index].read_pct, 0, "{kind}");
        }
    }

    #[test]
    fn test_iops_tracks_4k_random_write() {
        let dv = TestKind::Iops.dependent_variable();
        assert_eq!(TestKind::Iops.block_sizes()[dv.block_size_index], BlockSize::K4);
        assert_eq!(
            TestKind::Iops.workload_mixes()[dv.mix_index],
            WorkloadMix::random(0)
        );
    }

    #[test]
    fn test_mixes_in_decreasing_read_order() {
        let mixes = TestKind::Iops.workload_mixes();
        assert!(mixes.windows(2).all(|w| w[0].read_pct > w[1].read_pct));
    }

    #[test]
    fn test_test_kind_from_str() {
        assert_eq!("iops".parse::<TestKind>().unwrap(), TestKind::Iops);
        assert_eq!("LAT".parse::<TestKind>().unwrap(), TestKind::Latency);
        assert_eq!("tp".parse::<TestKind>().unwrap(), TestKind::Throughput);
        assert!("bogus".parse::<TestKind>().is_err());
    }
}
