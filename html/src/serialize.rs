use std::fmt::{self, Display, Write};

use super::dom::*;

impl Document {
    /// Serialize every connected node back to markup text
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    fn write_node(&self, f: &mut impl Write, id: NodeId) -> fmt::Result {
        let mut pending = vec![Visit::Open(id)];
        while let Some(visit) = pending.pop() {
            let id = match visit {
                Visit::Close(name) => {
                    write!(f, "</{}>", name)?;
                    continue;
                }
                Visit::Open(id) => id,
            };
            match self.data(id) {
                NodeData::Document => {}
                NodeData::Doctype(decl) => write!(f, "<!DOCTYPE {}>", decl)?,
                NodeData::Text(text) => f.write_str(text)?,
                NodeData::Comment(text) => write!(f, "<!--{}-->", text)?,
                NodeData::Element(element) => {
                    write!(f, "<{}", element.tag_name)?;
                    for (name, value) in element.attributes.iter() {
                        write_attribute(f, name, value)?;
                    }
                    if self.children(id).is_empty() {
                        f.write_str("/>")?;
                        continue;
                    }
                    f.write_char('>')?;
                    pending.push(Visit::Close(&element.tag_name));
                }
            }
            pending.extend(self.children(id).iter().rev().map(|&child| Visit::Open(child)));
        }
        Ok(())
    }
}

/// Work left for the serializer: a node to write, or an end tag owed to an element
enum Visit<'a> {
    Open(NodeId),
    Close(&'a str),
}

/// Values are double-quoted unless they hold a `"` and no `'`
fn write_attribute(f: &mut impl Write, name: &str, value: &str) -> fmt::Result {
    match (value.contains('"'), value.contains('\'')) {
        (true, false) => write!(f, " {}='{}'", name, value),
        (true, true) => write!(f, " {}=\"{}\"", name, value.replace('"', "&quot;")),
        _ => write!(f, " {}=\"{}\"", name, value),
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root())
    }
}
