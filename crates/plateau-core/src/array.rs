//! Parallel operations on the members of a redundant array.
//!
//! Preparing an array target means running the same single-device operation
//! (secure erase or precondition) on every member at once, waiting for all of
//! them, and only recreating the logical array if every member succeeded.
//!
//! ## Concurrency
//!
//! One scoped worker thread is spawned per member with no concurrency limit.
//! Each worker sends exactly one outcome message on a shared channel. The
//! coordinator joins every worker before reading the channel, so a failing
//! member never cancels its siblings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, OperationError, Result};

/// Default interval between readiness polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum wait for an array to report ready
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(600);

/// One physical device participating in an array
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayMember(PathBuf);

impl ArrayMember {
    /// Create a member from a device path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Device path of the member
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ArrayMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Single-device operation applied during preparation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOperation {
    /// Workload-independent preconditioning (fill the device twice)
    Precondition,
    /// Return the device to its fresh-out-of-box state
    SecureErase,
}

impl fmt::Display for DeviceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition => write!(f, "precondition"),
            Self::SecureErase => write!(f, "secure erase"),
        }
    }
}

/// Result of the operation on one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberOutcome {
    /// The member operated on
    pub member: ArrayMember,
    /// Whether the operation succeeded
    pub succeeded: bool,
    /// Error detail reported by the failing tool
    pub error_detail: Option<String>,
}

impl MemberOutcome {
    /// Successful outcome
    pub fn success(member: ArrayMember) -> Self {
        Self {
            member,
            succeeded: true,
            error_detail: None,
        }
    }

    /// Failed outcome with a detail message
    pub fn failure(member: ArrayMember, detail: impl Into<String>) -> Self {
        Self {
            member,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// Outcomes of a fan-out, one per member in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayOperationOutcome {
    /// The operation that was applied
    pub operation: DeviceOperation,
    /// Per-member outcomes
    pub members: Vec<MemberOutcome>,
}

impl ArrayOperationOutcome {
    /// Whether every member succeeded
    pub fn is_success(&self) -> bool {
        self.members.iter().all(|m| m.succeeded)
    }

    /// Members that failed
    pub fn failures(&self) -> impl Iterator<Item = &MemberOutcome> {
        self.members.iter().filter(|m| !m.succeeded)
    }

    /// `member: detail` for each failure, comma separated
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|m| {
                format!(
                    "{}: {}",
                    m.member,
                    m.error_detail.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Lifecycle of the logical array managed by the storage controller
#[cfg_attr(test, mockall::automock)]
pub trait ArrayController {
    /// Whether the logical array currently exists
    fn exists(&self) -> Result<bool>;

    /// Create the logical array from its members
    fn create(&self) -> Result<()>;

    /// Tear down the logical array
    fn destroy(&self) -> Result<()>;

    /// Whether the array is assembled and idle
    fn is_ready(&self) -> Result<bool>;
}

/// Fans single-device operations out over array members
#[derive(Debug, Clone, Copy)]
pub struct ParallelDeviceOperator {
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl Default for ParallelDeviceOperator {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

impl ParallelDeviceOperator {
    /// Create an operator with default polling settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the readiness poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum wait for readiness
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Run `op` on every member concurrently and collect the outcomes.
    ///
    /// Member failures are reported in the outcome, not as an error; the
    /// call only fails for an empty or duplicated member set.
    pub fn apply_to_members<F>(
        &self,
        members: &[ArrayMember],
        operation: DeviceOperation,
        op: F,
    ) -> Result<ArrayOperationOutcome>
    where
        F: Fn(&ArrayMember, DeviceOperation) -> std::result::Result<(), OperationError> + Sync,
    {
        validate_members(members)?;
        info!("Starting {} on {} array members", operation, members.len());

        let (tx, rx) = mpsc::channel::<(usize, std::result::Result<(), OperationError>)>();
        let mut slots: Vec<Option<MemberOutcome>> = vec![None; members.len()];

        thread::scope(|scope| {
            let op = &op;
            let handles: Vec<_> = members
                .iter()
                .enumerate()
                .map(|(index, member)| {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        debug!("Worker started: {} on {}", operation, member);
                        let result = op(member, operation);
                        // The receiver outlives every worker
                        let _ = tx.send((index, result));
                    })
                })
                .collect();

            for (index, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    slots[index] = Some(MemberOutcome::failure(
                        members[index].clone(),
                        "worker panicked",
                    ));
                }
            }
        });
        drop(tx);

        for (index, result) in rx {
            debug_assert!(slots[index].is_none(), "member reported twice");
            let member = members[index].clone();
            slots[index] = Some(match result {
                Ok(()) => MemberOutcome::success(member),
                Err(e) => {
                    warn!("{} failed on {}: {}", operation, member, e);
                    MemberOutcome::failure(member, e.0)
                }
            });
        }

        let members = slots
            .into_iter()
            .zip(members)
            .map(|(slot, member)| {
                slot.unwrap_or_else(|| {
                    MemberOutcome::failure(member.clone(), "no outcome reported")
                })
            })
            .collect();

        let outcome = ArrayOperationOutcome { operation, members };
        info!(
            "{} finished: {} of {} members succeeded",
            operation,
            outcome.members.len() - outcome.failures().count(),
            outcome.members.len()
        );
        Ok(outcome)
    }

    /// Fan out `op`, then recreate the array and wait until it is ready.
    ///
    /// Any member failure yields [`Error::AggregateOperation`] and the array
    /// is left untouched.
    pub fn apply_and_recreate<F, C>(
        &self,
        members: &[ArrayMember],
        operation: DeviceOperation,
        op: F,
        controller: &C,
    ) -> Result<ArrayOperationOutcome>
    where
        F: Fn(&ArrayMember, DeviceOperation) -> std::result::Result<(), OperationError> + Sync,
        C: ArrayController + ?Sized,
    {
        let outcome = self.apply_to_members(members, operation, op)?;
        if !outcome.is_success() {
            return Err(Error::AggregateOperation(outcome));
        }

        self.recreate(controller)?;
        Ok(outcome)
    }

    /// Destroy the array if present, create it, and wait for readiness
    pub fn recreate<C>(&self, controller: &C) -> Result<()>
    where
        C: ArrayController + ?Sized,
    {
        if controller.exists()? {
            info!("Destroying existing array");
            controller.destroy()?;
        }
        info!("Creating array");
        controller.create()?;
        self.wait_until_ready(controller)
    }

    /// Poll `is_ready` until it reports true or the timeout elapses
    pub fn wait_until_ready<C>(&self, controller: &C) -> Result<()>
    where
        C: ArrayController + ?Sized,
    {
        let start = Instant::now();
        loop {
            if controller.is_ready()? {
                debug!("Array ready after {:?}", start.elapsed());
                return Ok(());
            }
            let waited = start.elapsed();
            if waited >= self.ready_timeout {
                return Err(Error::Timeout { waited });
            }
            thread::sleep(self.poll_interval.min(self.ready_timeout - waited));
        }
    }
}

fn validate_members(members: &[ArrayMember]) -> Result<()> {
    if members.is_empty() {
        return Err(Error::InvalidConfig("array has no members".to_string()));
    }
    let mut seen = members.iter().collect::<Vec<_>>();
    seen.sort();
    if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
        return Err(Error::InvalidConfig(format!(
            "duplicate array member: {}",
            pair[0]
        )));
    }
    Ok(())
}
