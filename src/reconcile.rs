//! Shared bookkeeping for declarative reconciliation.
//!
//! A reconciler computes a list of changes from desired and current state,
//! then issues one API call per change. Calls are independent: a failure is
//! recorded and the remaining changes are still attempted. Nothing is rolled
//! back; running the reconciler again converges whatever was left behind.

use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::Result;

/// The result of applying one change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeOutcome<T> {
    pub change: T,
    /// The platform error message when the call failed.
    pub error: Option<String>,
}

impl<T> ChangeOutcome<T> {
    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened when reconciling one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport<T> {
    /// Name of the reconciled entity.
    pub target: String,
    /// True when the changes were only planned.
    pub dry_run: bool,
    pub outcomes: Vec<ChangeOutcome<T>>,
}

impl<T> ReconcileReport<T> {
    /// An empty report.
    pub fn new(target: impl Into<String>, dry_run: bool) -> Self {
        Self {
            target: target.into(),
            dry_run,
            outcomes: Vec::new(),
        }
    }

    /// Whether the entity already matched its desired state.
    pub fn is_converged(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether every change succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ChangeOutcome::is_success)
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ChangeOutcome<T>> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Changes that were planned or applied.
    pub fn changes(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().map(|o| &o.change)
    }
}

impl<T: fmt::Display> ReconcileReport<T> {
    /// Record planned changes without applying them.
    pub fn record_planned(&mut self, changes: Vec<T>) {
        for change in changes {
            info!(entity = %self.target, "planned: {}", change);
            self.outcomes.push(ChangeOutcome {
                change,
                error: None,
            });
        }
    }

    /// Apply each change with `apply`, recording every outcome.
    pub fn apply_each<F>(&mut self, changes: Vec<T>, mut apply: F)
    where
        F: FnMut(&T) -> Result<()>,
    {
        for change in changes {
            let error = match apply(&change) {
                Ok(()) => {
                    info!(entity = %self.target, "applied: {}", change);
                    None
                }
                Err(e) => {
                    warn!(entity = %self.target, error = %e, "failed: {}", change);
                    Some(e.to_string())
                }
            };
            self.outcomes.push(ChangeOutcome { change, error });
        }
    }
}

impl<T: fmt::Display> fmt::Display for ReconcileReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcomes.is_empty() {
            return writeln!(f, "{}: up to date", self.target);
        }
        let verb = if self.dry_run { "would apply" } else { "applied" };
        writeln!(f, "{}: {} {} change(s)", self.target, verb, self.outcomes.len())?;
        for outcome in &self.outcomes {
            match &outcome.error {
                None => writeln!(f, "  - {}", outcome.change)?,
                Some(error) => writeln!(f, "  ! {} ({})", outcome.change, error)?,
            }
        }
        Ok(())
    }
}

/// Outcome of reconciling one configuration file.
#[derive(Debug)]
pub struct FileResult<T> {
    pub path: PathBuf,
    pub result: Result<ReconcileReport<T>>,
}

impl<T> FileResult<T> {
    /// Whether the file loaded and every change succeeded.
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_success())
    }
}
