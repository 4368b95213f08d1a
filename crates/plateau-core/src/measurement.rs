//! Measurement records, per-round matrices and round history.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::workload::{BlockSize, WorkloadMix};

/// Minimum, maximum and mean latency of one direction, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyTriple {
    /// Minimum latency (us)
    pub min: f64,
    /// Maximum latency (us)
    pub max: f64,
    /// Mean latency (us)
    pub mean: f64,
}

/// Results of one I/O direction (read or write) of a trial
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectionStats {
    /// Total I/O transferred in KiB
    pub io_kbytes: u64,
    /// Operations per second
    pub iops: f64,
    /// Throughput in KiB/s
    pub bandwidth_kbps: f64,
    /// Completion latency
    pub latency: LatencyTriple,
}

/// Results of a single workload-mix / block-size trial
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Read side of the trial
    pub read: DirectionStats,
    /// Write side of the trial
    pub write: DirectionStats,
}

impl MeasurementRecord {
    /// Read plus write IOPS
    pub fn total_iops(&self) -> f64 {
        self.read.iops + self.write.iops
    }

    /// Read plus write throughput in KiB/s
    pub fn total_bandwidth_kbps(&self) -> f64 {
        self.read.bandwidth_kbps + self.write.bandwidth_kbps
    }

    /// Read plus write I/O in KiB
    pub fn total_io_kbytes(&self) -> u64 {
        self.read.io_kbytes + self.write.io_kbytes
    }

    /// Extract a scalar metric from this record
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::ReadIops => self.read.iops,
            Metric::WriteIops => self.write.iops,
            Metric::TotalIops => self.total_iops(),
            Metric::ReadBandwidth => self.read.bandwidth_kbps,
            Metric::WriteBandwidth => self.write.bandwidth_kbps,
            Metric::TotalBandwidth => self.total_bandwidth_kbps(),
            Metric::MeanReadLatency => self.read.latency.mean,
            Metric::MeanWriteLatency => self.write.latency.mean,
        }
    }
}

/// A scalar that can be read from a [`MeasurementRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Read IOPS
    ReadIops,
    /// Write IOPS
    WriteIops,
    /// Read + write IOPS
    TotalIops,
    /// Read throughput (KiB/s)
    ReadBandwidth,
    /// Write throughput (KiB/s)
    WriteBandwidth,
    /// Read + write throughput (KiB/s)
    TotalBandwidth,
    /// Mean read latency (us)
    MeanReadLatency,
    /// Mean write latency (us)
    MeanWriteLatency,
}

impl Metric {
    /// Unit label for display
    pub fn unit(self) -> &'static str {
        match self {
            Self::ReadIops | Self::WriteIops | Self::TotalIops => "IOPS",
            Self::ReadBandwidth | Self::WriteBandwidth | Self::TotalBandwidth => "KiB/s",
            Self::MeanReadLatency | Self::MeanWriteLatency => "us",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadIops => "read IOPS",
            Self::WriteIops => "write IOPS",
            Self::TotalIops => "total IOPS",
            Self::ReadBandwidth => "read bandwidth",
            Self::WriteBandwidth => "write bandwidth",
            Self::TotalBandwidth => "total bandwidth",
            Self::MeanReadLatency => "mean read latency",
            Self::MeanWriteLatency => "mean write latency",
        };
        write!(f, "{name}")
    }
}

/// One round's results: rows are workload mixes, columns are block sizes.
///
/// Built only by the round collector, so the cell grid always matches the
/// row and column labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementMatrix {
    mixes: Vec<WorkloadMix>,
    block_sizes: Vec<BlockSize>,
    cells: Vec<Vec<MeasurementRecord>>,
}

impl MeasurementMatrix {
    pub(crate) fn from_parts(
        mixes: Vec<WorkloadMix>,
        block_sizes: Vec<BlockSize>,
        cells: Vec<Vec<MeasurementRecord>>,
    ) -> Self {
        debug_assert_eq!(cells.len(), mixes.len());
        debug_assert!(cells.iter().all(|row| row.len() == block_sizes.len()));
        Self {
            mixes,
            block_sizes,
            cells,
        }
    }

    /// Row labels
    pub fn mixes(&self) -> &[WorkloadMix] {
        &self.mixes
    }

    /// Column labels
    pub fn block_sizes(&self) -> &[BlockSize] {
        &self.block_sizes
    }

    /// (rows, columns)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.mixes.len(), self.block_sizes.len())
    }

    /// Record at `[mix_index][block_size_index]`
    pub fn cell(&self, mix_index: usize, block_size_index: usize) -> Option<&MeasurementRecord> {
        self.cells.get(mix_index)?.get(block_size_index)
    }

    /// Iterate rows in configured order
    pub fn rows(&self) -> impl Iterator<Item = (&WorkloadMix, &[MeasurementRecord])> {
        self.mixes.iter().zip(self.cells.iter().map(Vec::as_slice))
    }
}

/// Append-only sequence of round matrices, indexed by round number
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundHistory {
    rounds: Vec<MeasurementMatrix>,
}

impl RoundHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, matrix: MeasurementMatrix) {
        self.rounds.push(matrix);
    }

    /// Number of completed rounds
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// Whether no round has completed
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Matrix of round `index`
    pub fn get(&self, index: usize) -> Option<&MeasurementMatrix> {
        self.rounds.get(index)
    }

    /// Most recent round
    pub fn last(&self) -> Option<&MeasurementMatrix> {
        self.rounds.last()
    }

    /// Iterate rounds in order
    pub fn iter(&self) -> std::slice::Iter<'_, MeasurementMatrix> {
        self.rounds.iter()
    }

    /// Rounds in `[start, end)` (e.g. the steady-state window)
    pub fn range(&self, start: usize, end: usize) -> &[MeasurementMatrix] {
        let end = end.min(self.rounds.len());
        let start = start.min(end);
        &self.rounds[start..end]
    }
}

impl<'a> IntoIterator for &'a RoundHistory {
    type Item = &'a MeasurementMatrix;
    type IntoIter = std::slice::Iter<'a, MeasurementMatrix>;

    fn into_iter(self) -> Self::IntoIter {
        self.rounds.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(read_iops: f64, write_iops: f64) -> MeasurementRecord {
        MeasurementRecord {
            read: DirectionStats {
                io_kbytes: 400,
                iops: read_iops,
                bandwidth_kbps: read_iops * 4.0,
                latency: LatencyTriple {
                    min: 10.0,
                    max: 900.0,
                    mean: 85.5,
                },
            },
            write: DirectionStats {
                io_kbytes: 100,
                iops: write_iops,
                bandwidth_kbps: write_iops * 4.0,
                latency: LatencyTriple {
                    min: 12.0,
                    max: 1500.0,
                    mean: 120.25,
                },
            },
        }
    }

    #[test]
    fn test_record_metrics() {
        let r = record(300.0, 100.0);
        assert_eq!(r.metric(Metric::ReadIops), 300.0);
        assert_eq!(r.metric(Metric::WriteIops), 100.0);
        assert_eq!(r.metric(Metric::TotalIops), 400.0);
        assert_eq!(r.metric(Metric::WriteBandwidth), 400.0);
        assert_eq!(r.metric(Metric::TotalBandwidth), 1600.0);
        assert_eq!(r.metric(Metric::MeanReadLatency), 85.5);
        assert_eq!(r.metric(Metric::MeanWriteLatency), 120.25);
        assert_eq!(r.total_io_kbytes(), 500);
    }

    #[test]
    fn test_metric_units() {
        assert_eq!(Metric::TotalIops.unit(), "IOPS");
        assert_eq!(Metric::WriteBandwidth.unit(), "KiB/s");
        assert_eq!(Metric::MeanWriteLatency.unit(), "us");
    }

    #[test]
    fn test_matrix_cells() {
        let mixes = vec![WorkloadMix::random(100), WorkloadMix::random(0)];
        let sizes = vec![BlockSize::K4, BlockSize::M1];
        let cells = vec![
            vec![record(1.0, 0.0), record(2.0, 0.0)],
            vec![record(0.0, 3.0), record(0.0, 4.0)],
        ];
        let matrix = MeasurementMatrix::from_parts(mixes, sizes, cells);

        assert_eq!(matrix.dimensions(), (2, 2));
        assert_eq!(matrix.cell(1, 1).unwrap().write.iops, 4.0);
        assert_eq!(matrix.cell(0, 1).unwrap().read.iops, 2.0);
        assert!(matrix.cell(2, 0).is_none());
        assert!(matrix.cell(0, 2).is_none());

        let row_labels: Vec<u8> = matrix.rows().map(|(mix, _)| mix.read_pct).collect();
        assert_eq!(row_labels, vec![100, 0]);
    }

    #[test]
    fn test_history_append_and_range() {
        let mut history = RoundHistory::new();
        assert!(history.is_empty());

        for i in 0..6 {
            let matrix = MeasurementMatrix::from_parts(
                vec![WorkloadMix::random(0)],
                vec![BlockSize::K4],
                vec![vec![record(0.0, f64::from(i))]],
            );
            history.push(matrix);
        }

        assert_eq!(history.len(), 6);
        assert_eq!(history.last().unwrap().cell(0, 0).unwrap().write.iops, 5.0);
        assert_eq!(history.range(2, 5).len(), 3);
        assert_eq!(history.range(4, 100).len(), 2);
        assert!(history.range(10, 12).is_empty());
        assert_eq!(history.iter().count(), 6);
    }

    #[test]
    fn test_record_serializes_by_role() {
        let json = serde_json::to_value(record(1.0, 2.0)).unwrap();
        assert_eq!(json["write"]["iops"], 2.0);
        assert_eq!(json["read"]["latency"]["mean"], 85.5);
    }
}
