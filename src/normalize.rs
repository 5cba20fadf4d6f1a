use html::{parse_document, ParseError};
use thiserror::Error;
use tracing::{span, Level};

use crate::pruning::{prune, PruneError};
use crate::report::{Reporter, Side};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NormalizeError {
    #[error("could not parse snapshot")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Prune(#[from] PruneError),
}

/// Parse `markup`, strip everything `selectors` match and serialize what is left
pub fn try_normalize<S: AsRef<str>>(markup: &str, selectors: &[S]) -> Result<String, NormalizeError> {
    let mut document = parse_document(markup)?;
    prune(&mut document, selectors)?;
    Ok(document.serialize())
}

/// Like [`try_normalize`], but never fails: on any error the partially pruned tree is thrown
/// away, the error goes to `reporter` and the empty string is returned instead.
pub fn normalize<S: AsRef<str>>(
    markup: &str,
    selectors: &[S],
    side: Side,
    reporter: &impl Reporter,
) -> String {
    let span = span!(Level::DEBUG, "Normalizing", %side);
    let _enter = span.enter();
    try_normalize(markup, selectors).unwrap_or_else(|err| {
        reporter.report(side, &err);
        String::new()
    })
}
