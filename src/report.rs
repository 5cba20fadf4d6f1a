use std::fmt::{self, Display};
use tracing::error;

use crate::NormalizeError;

/// Which of the two snapshots a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

impl Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Before => "before",
            Side::After => "after",
        })
    }
}

/// Receives failures that were recovered from by falling back to the empty snapshot
pub trait Reporter {
    fn report(&self, side: Side, error: &NormalizeError);
}

/// Reports through `tracing` at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, side: Side, err: &NormalizeError) {
        match err {
            NormalizeError::Parse(e) => {
                error!(%side, error = %e, "Could not parse snapshot, comparing it as empty")
            }
            NormalizeError::Prune(e) => error!(
                %side,
                selector = %e.selector,
                error = %e.source,
                "Could not strip selector, comparing snapshot as empty"
            ),
        }
    }
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn report(&self, side: Side, error: &NormalizeError) {
        (**self).report(side, error)
    }
}
