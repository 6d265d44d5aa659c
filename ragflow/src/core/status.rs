//! Component state and edge kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a connection between two sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// An ordinary edge of the acyclic part of the graph.
    #[default]
    Forward,
    /// A back edge that closes a declared loop.
    Loop,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Loop => write!(f, "loop"),
        }
    }
}

/// The execution state of a component within one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    /// Mandatory inputs are missing or an upstream sender may still deliver.
    #[default]
    Waiting,
    /// All inputs are settled; the component can be scheduled.
    Ready,
    /// The component is executing.
    Running,
    /// The component has run and has no fresh input.
    Completed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl ComponentState {
    /// Returns true if the component has run at least once.
    #[must_use]
    pub fn has_run(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the component can be picked by the scheduler.
    #[must_use]
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Ready)
    }
}
