//! Decide whether two markup snapshots are the same page state once known-noisy regions,
//! named by selector expressions, have been stripped from both.
//!
//! ```
//! use stripdom::XPathComparator;
//!
//! let mut comparator = XPathComparator::new(
//!     r#"<div id="1"><span>X</span></div>"#,
//!     r#"<div id="2"><span>X</span></div>"#,
//! )
//! .expression("//@id");
//! assert!(comparator.evaluate());
//! ```

/// The before/after equivalence decision
mod comparator;
/// Parse, prune and serialize one snapshot
mod normalize;
/// Selector-driven removal of nodes and attributes
mod pruning;
/// Where recoverable failures go
mod report;
/// Ignore-rule files
pub mod rules;
#[cfg(test)]
mod tests;

pub use comparator::{Comparator, Verdict, XPathComparator};
pub use normalize::{normalize, try_normalize, NormalizeError};
pub use pruning::{prune, PruneError, PruneStats};
pub use report::{Reporter, Side, TracingReporter};
