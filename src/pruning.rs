use html::{Document, NodeData};
use thiserror::Error;
use tracing::{debug, span, trace, Level};
use xpath::{Match, Selector, SelectorError};

/// A selector could not be evaluated; no further selectors were applied
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("could not evaluate selector {selector:?}")]
pub struct PruneError {
    pub selector: String,
    #[source]
    pub source: SelectorError,
}

/// What one [`prune`] call did to the document
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub selectors: usize,
    pub removed_nodes: usize,
    pub removed_attributes: usize,
    /// Matches that were already gone when their turn came
    pub already_detached: usize,
    /// Text, comment and similar matches, which are left in place
    pub skipped: usize,
}

enum Removal {
    Node,
    Attribute,
    AlreadyDetached,
    Skipped,
}

impl PruneStats {
    fn record(&mut self, removal: Removal) {
        match removal {
            Removal::Node => self.removed_nodes += 1,
            Removal::Attribute => self.removed_attributes += 1,
            Removal::AlreadyDetached => self.already_detached += 1,
            Removal::Skipped => self.skipped += 1,
        }
    }
}

/// Remove from `document` every element and attribute matched by `selectors`, in order.
///
/// Each selector is evaluated against the tree as the previous selectors left it. Its matches
/// are a snapshot: an entry whose node (or an ancestor of it) has meanwhile been removed is
/// skipped rather than treated as an error. The first selector that fails to evaluate aborts
/// the whole call.
pub fn prune<S: AsRef<str>>(
    document: &mut Document,
    selectors: &[S],
) -> Result<PruneStats, PruneError> {
    let span = span!(Level::DEBUG, "Pruning", selectors = selectors.len());
    let _enter = span.enter();
    let mut stats = PruneStats::default();
    for text in selectors {
        let text = text.as_ref();
        let fail = |source| PruneError {
            selector: text.to_string(),
            source,
        };
        let selector = Selector::parse(text).map_err(fail)?;
        let matches = selector.select(document).map_err(fail)?;
        trace!(selector = selector.as_str(), matches = matches.len(), "Removing matches");
        for m in matches {
            trace!(%m, "Removing match");
            stats.record(remove_match(document, m));
        }
        stats.selectors += 1;
    }
    debug!(?stats, "Pruned document");
    Ok(stats)
}

fn remove_match(document: &mut Document, m: Match) -> Removal {
    match m {
        Match::Attribute { owner, name } => {
            if document.remove_attribute(owner, &name) {
                Removal::Attribute
            } else {
                Removal::AlreadyDetached
            }
        }
        Match::Node(id) => match document.data(id) {
            NodeData::Element(_) => {
                if document.remove_node(id) {
                    Removal::Node
                } else {
                    Removal::AlreadyDetached
                }
            }
            _ => {
                trace!(node = id.index(), "Leaving non-element match in place");
                Removal::Skipped
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::parse_document;

    fn pruned(markup: &str, selectors: &[&str]) -> (String, PruneStats) {
        let mut doc = parse_document(markup).unwrap();
        let stats = prune(&mut doc, selectors).unwrap();
        (doc.serialize(), stats)
    }

    #[test]
    fn test_nested_matches_in_one_selector() {
        let (out, stats) = pruned("<div><div><div>x</div></div></div><p/>", &["//div"]);
        assert_eq!(out, "<p/>");
        assert_eq!(stats.removed_nodes, 1);
        assert_eq!(stats.already_detached, 2);
    }

    #[test]
    fn test_later_selectors_see_earlier_removals() {
        let (out, stats) = pruned(
            r#"<div class="ad"><span>x</span></div>"#,
            &["//div[@class='ad']", "//div[@class='ad']/span"],
        );
        assert_eq!(out, "");
        assert_eq!(
            stats,
            PruneStats {
                selectors: 2,
                removed_nodes: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_attribute_of_removed_element() {
        let (out, stats) = pruned(
            r#"<a><b id="1"><c id="2"/></b></a>"#,
            &["//b | //@id"],
        );
        assert_eq!(out, "<a/>");
        assert_eq!(stats.removed_nodes, 1);
        assert_eq!(stats.already_detached, 2);
    }

    #[test]
    fn test_text_matches_are_left_alone() {
        let (out, stats) = pruned("<p>keep<!--c--></p>", &["//text()", "//comment()", "/"]);
        assert_eq!(out, "<p>keep<!--c--></p>");
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn test_failure_aborts_remaining_selectors() {
        let mut doc = parse_document(r#"<p id="1"><b/></p>"#).unwrap();
        let err = prune(&mut doc, &["//b", "//p[", "//@id"]).unwrap_err();
        assert_eq!(err.selector, "//p[");
        assert_eq!(err.source, SelectorError::Syntax { offset: 3 });
        // The first selector ran, the third never did
        assert_eq!(doc.serialize(), r#"<p id="1"/>"#);
    }

    #[test]
    fn test_no_selectors() {
        let (out, stats) = pruned("<a><b/></a>", &[]);
        assert_eq!(out, "<a><b/></a>");
        assert_eq!(stats, PruneStats::default());
    }
}
