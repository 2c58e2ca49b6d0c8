//! Lifecycle state and run outcomes.

use gip_report::TerminationRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a mapper instance.
///
/// `Idle -> Starting -> Running -> Stopping -> Idle`; an idle instance can be
/// started again.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapperState {
    /// No worker
    Idle = 0,
    /// Device opening and controller connecting
    Starting = 1,
    /// Worker iterating
    Running = 2,
    /// Stop requested, worker finishing its iteration and tearing down
    Stopping = 3,
}

impl MapperState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for MapperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `MapperState` shared between the controller and its worker.
#[derive(Debug)]
pub(crate) struct AtomicMapperState(AtomicU8);

impl AtomicMapperState {
    pub(crate) fn new(state: MapperState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> MapperState {
        MapperState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: MapperState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunExit {
    /// `stop()` was requested by the caller
    Stopped,
    /// A converted report carried a termination sentinel
    Sentinel(TerminationRequest),
    /// An iteration step failed
    Failed {
        /// Error text
        error: String,
        /// Diagnostic record written for the failure, if any
        diagnostic: Option<PathBuf>,
    },
}

/// Outcome of one run, produced by the worker as it exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Reports handed to the controller sink
    pub reports_forwarded: u64,
    /// Exit cause
    pub exit: RunExit,
}

impl RunSummary {
    pub fn is_failure(&self) -> bool {
        matches!(self.exit, RunExit::Failed { .. })
    }

    pub fn termination_request(&self) -> Option<TerminationRequest> {
        match self.exit {
            RunExit::Sentinel(request) => Some(request),
            _ => None,
        }
    }
}
