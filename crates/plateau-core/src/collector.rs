//! Round collection: one trial per workload-mix / block-size cell.

use tracing::debug;

use crate::error::{Error, Result};
use crate::measurement::{MeasurementMatrix, MeasurementRecord};
use crate::workload::{BlockSize, WorkloadMix};

/// Runs exactly one external workload trial against the device under test.
///
/// Implementations fail with [`Error::ToolInvocation`] when the workload
/// generator cannot be run or produces malformed output.
pub trait TrialRunner {
    /// Run one trial and return its measurements
    fn run_trial(&mut self, mix: WorkloadMix, block_size: BlockSize) -> Result<MeasurementRecord>;
}

impl<F> TrialRunner for F
where
    F: FnMut(WorkloadMix, BlockSize) -> Result<MeasurementRecord>,
{
    fn run_trial(&mut self, mix: WorkloadMix, block_size: BlockSize) -> Result<MeasurementRecord> {
        self(mix, block_size)
    }
}

/// Runs complete rounds over a fixed workload grid
#[derive(Debug, Clone)]
pub struct RoundMeasurementCollector {
    mixes: Vec<WorkloadMix>,
    block_sizes: Vec<BlockSize>,
}

impl RoundMeasurementCollector {
    /// Create a collector for the given grid
    pub fn new(mixes: Vec<WorkloadMix>, block_sizes: Vec<BlockSize>) -> Result<Self> {
        if mixes.is_empty() {
            return Err(Error::InvalidConfig("workload mix list is empty".to_string()));
        }
        if block_sizes.is_empty() {
            return Err(Error::InvalidConfig("block size list is empty".to_string()));
        }
        for mix in &mixes {
            mix.validate()?;
        }
        Ok(Self { mixes, block_sizes })
    }

    /// Workload mixes (rows)
    pub fn mixes(&self) -> &[WorkloadMix] {
        &self.mixes
    }

    /// Block sizes (columns)
    pub fn block_sizes(&self) -> &[BlockSize] {
        &self.block_sizes
    }

    /// Number of trials in one round
    pub fn trials_per_round(&self) -> usize {
        self.mixes.len() * self.block_sizes.len()
    }

    /// Run one full round.
    ///
    /// Trials run sequentially, mixes outer and block sizes inner, because
    /// they share the state of the device under test. The first failing
    /// trial aborts the round and no partial matrix is returned.
    pub fn run_round<R>(&self, runner: &mut R) -> Result<MeasurementMatrix>
    where
        R: TrialRunner + ?Sized,
    {
        let mut cells = Vec::with_capacity(self.mixes.len());

        for &mix in &self.mixes {
            let mut row = Vec::with_capacity(self.block_sizes.len());
            for &block_size in &self.block_sizes {
                debug!("Running trial {} bs={}", mix, block_size);
                let record = runner.run_trial(mix, block_size)?;
                row.push(record);
            }
            cells.push(row);
        }

        Ok(MeasurementMatrix::from_parts(
            self.mixes.clone(),
            self.block_sizes.clone(),
            cells,
        ))
    }
}
