//! Markup documents as a mutable arena tree.
//!
//! [`parse_document`] turns markup text into a [`Document`], which can be navigated, pruned
//! with [`Document::remove_node`] and [`Document::remove_attribute`], and written back out with
//! [`Document::serialize`]. Pruning is the only kind of mutation offered: a document never
//! gains nodes after parsing.

mod dom;
mod parsing;
mod serialize;

pub use dom::*;
pub use parsing::{parse_document, ParseError};
