use tracing::{debug, span, Level};

use crate::normalize::{normalize, try_normalize};
use crate::report::{Reporter, Side, TracingReporter};

/// A strategy deciding whether two snapshots of a page are the same state
pub trait Comparator {
    fn original_dom(&self) -> &str;
    fn new_dom(&self) -> &str;
    fn set_original_dom(&mut self, dom: String);
    fn set_new_dom(&mut self, dom: String);

    /// Run the strategy over the stored snapshots
    fn is_equivalent(&mut self) -> bool;

    /// Exact equality of the stored snapshots
    fn compare(&self) -> bool {
        self.original_dom() == self.new_dom()
    }
}

/// Outcome of [`XPathComparator::verdict`], which keeps normalization failures apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Equivalent,
    NotEquivalent,
    /// At least one snapshot could not be parsed or pruned
    Inconclusive,
}

/// Compares two snapshots after removing every element and attribute matched by a list of
/// selector expressions from both.
///
/// Failures never escape [`evaluate`](Self::evaluate): a snapshot that cannot be parsed or
/// pruned is reported to the [`Reporter`] and compared as the empty string. Two snapshots that
/// both fail are therefore equivalent; use [`verdict`](Self::verdict) to tell that case apart.
#[derive(Debug, Clone, Default)]
pub struct XPathComparator<R = TracingReporter> {
    original_dom: String,
    new_dom: String,
    expressions: Vec<String>,
    reporter: R,
}

impl XPathComparator {
    pub fn new(original_dom: impl Into<String>, new_dom: impl Into<String>) -> Self {
        Self::with_reporter(original_dom, new_dom, TracingReporter)
    }

    /// A comparator with no snapshots yet and the given ignore rules
    pub fn with_expressions<I, S>(expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expressions: expressions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

impl<R: Reporter> XPathComparator<R> {
    pub fn with_reporter(
        original_dom: impl Into<String>,
        new_dom: impl Into<String>,
        reporter: R,
    ) -> Self {
        Self {
            original_dom: original_dom.into(),
            new_dom: new_dom.into(),
            expressions: Vec::new(),
            reporter,
        }
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.add_expression(expression);
        self
    }

    pub fn add_expression(&mut self, expression: impl Into<String>) {
        self.expressions.push(expression.into());
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Normalize one snapshot with this comparator's expressions, falling back to `""`
    pub fn strip_expressions(&self, dom: &str, side: Side) -> String {
        normalize(dom, &self.expressions, side, &self.reporter)
    }

    /// Replace both stored snapshots by their normalized forms and compare them.
    ///
    /// Normalized text is a fixed point, so calling this again yields the same answer.
    pub fn evaluate(&mut self) -> bool {
        let span = span!(Level::DEBUG, "Comparing snapshots", expressions = self.expressions.len());
        let _enter = span.enter();
        self.original_dom = self.strip_expressions(&self.original_dom, Side::Before);
        self.new_dom = self.strip_expressions(&self.new_dom, Side::After);
        let equivalent = self.compare();
        debug!(equivalent, "Compared snapshots");
        equivalent
    }

    /// Compare without touching the stored snapshots, reporting failures as
    /// [`Verdict::Inconclusive`] instead of comparing them as empty
    pub fn verdict(&self) -> Verdict {
        let before = try_normalize(&self.original_dom, &self.expressions);
        let after = try_normalize(&self.new_dom, &self.expressions);
        match (before, after) {
            (Ok(a), Ok(b)) if a == b => Verdict::Equivalent,
            (Ok(_), Ok(_)) => Verdict::NotEquivalent,
            (before, after) => {
                if let Err(e) = before {
                    self.reporter.report(Side::Before, &e);
                }
                if let Err(e) = after {
                    self.reporter.report(Side::After, &e);
                }
                Verdict::Inconclusive
            }
        }
    }
}

impl<R: Reporter> Comparator for XPathComparator<R> {
    fn original_dom(&self) -> &str {
        &self.original_dom
    }

    fn new_dom(&self) -> &str {
        &self.new_dom
    }

    fn set_original_dom(&mut self, dom: String) {
        self.original_dom = dom;
    }

    fn set_new_dom(&mut self, dom: String) {
        self.new_dom = dom;
    }

    fn is_equivalent(&mut self) -> bool {
        self.evaluate()
    }
}
