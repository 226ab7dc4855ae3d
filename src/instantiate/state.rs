//! Lifecycle of one instantiation request

use crate::{Result, TuneconfError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    SourceSelected,
    DatasetResolved,
    Validated,
    Copying,
    Rewriting,
    Done,
    Failed,
}

impl Phase {
    /// The only phase reachable from this one on success
    fn successor(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::SourceSelected),
            Phase::SourceSelected => Some(Phase::DatasetResolved),
            Phase::DatasetResolved => Some(Phase::Validated),
            Phase::Validated => Some(Phase::Copying),
            Phase::Copying => Some(Phase::Rewriting),
            Phase::Rewriting => Some(Phase::Done),
            Phase::Done | Phase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::SourceSelected => "source_selected",
            Phase::DatasetResolved => "dataset_resolved",
            Phase::Validated => "validated",
            Phase::Copying => "copying",
            Phase::Rewriting => "rewriting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Linear state machine with a record of every phase entered
#[derive(Debug, Clone)]
pub struct StateMachine {
    history: Vec<Phase>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            history: vec![Phase::Idle],
        }
    }
}

impl StateMachine {
    pub fn current(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Move to `next`, which must be the successor of the current phase
    pub fn advance(&mut self, next: Phase) -> Result<()> {
        let current = self.current();
        if current.successor() != Some(next) {
            return Err(TuneconfError::Generic(anyhow::anyhow!(
                "illegal transition from {} to {}",
                current,
                next
            )));
        }
        tracing::debug!(from = %current, to = %next, "Phase transition");
        self.history.push(next);
        Ok(())
    }

    /// Any non-terminal phase may fail
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.history.push(Phase::Failed);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
