/// Handle to a node inside a [`Document`]. Only meaningful for the document that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag_name: String,
    pub attributes: Attributes,
}

impl Element {
    pub fn new(name: impl Into<String>, attributes: Option<Attributes>) -> Self {
        Self {
            tag_name: name.into(),
            attributes: attributes.unwrap_or_default(),
        }
    }
}

/// Attributes in source order. Names are unique; the first occurrence of a name wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes(pub Vec<(String, String)>);

impl Attributes {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns `false` (and keeps the existing value) if `name` is already present
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push((name, value.into()));
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|(k, _)| k != name);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Builds an [`Attributes`] list in the given order, e.g. `attributes!("id" => 1, "class" => "ad")`
#[macro_export]
macro_rules! attributes {
    ($($k:expr => $v:expr),* $(,)?) => {
        $crate::Attributes(vec![$(($k.to_string(), $v.to_string())),*])
    };
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// A parsed markup document stored as an arena.
///
/// Nodes are never freed: removing a node only unlinks it from its parent, so every [`NodeId`]
/// handed out stays valid for the lifetime of the document. A node is *connected* when its
/// chain of parents reaches the document node; detached subtrees keep their internal links but
/// are invisible to navigation from the root and to serialization.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: vec![],
                data: NodeData::Document,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub(crate) fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: vec![],
            data,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append character data to `parent`, extending its last child if that is already text
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        self.append(parent, NodeData::Text(text.to_string()));
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id) {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Every node below `id` in document (pre-)order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root() {
                return true;
            }
            match self.nodes.get(current.0).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Number of nodes reachable from the root, not counting the document node or attributes
    pub fn node_count(&self) -> usize {
        self.descendants(self.root()).len()
    }

    /// The concatenation of all text below (or at) `id`
    pub fn string_value(&self, id: NodeId) -> String {
        match self.data(id) {
            NodeData::Text(text) | NodeData::Comment(text) => text.clone(),
            NodeData::Doctype(_) => String::new(),
            NodeData::Document | NodeData::Element(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match self.data(d) {
                    NodeData::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Unlink `id` (and with it, its subtree) from its parent.
    ///
    /// Returns `false` without touching the tree when the node is the document node, or is no
    /// longer connected because it or one of its ancestors was removed before. Text nodes left
    /// side by side by the removal are merged, so the tree stays the one its serialization
    /// parses back to.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if id == self.root() || !self.is_connected(id) {
            return false;
        }
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return false;
        };
        let siblings = &mut self.nodes[parent.0].children;
        let Some(index) = siblings.iter().position(|&c| c == id) else {
            return true;
        };
        siblings.remove(index);
        if index > 0 && index < siblings.len() {
            let (before, after) = (siblings[index - 1], siblings[index]);
            self.merge_text(parent, before, after);
        }
        true
    }

    /// Fold text node `after` into its preceding sibling `before` when both are text
    fn merge_text(&mut self, parent: NodeId, before: NodeId, after: NodeId) {
        let tail = match &self.nodes[after.0].data {
            NodeData::Text(text) if matches!(self.data(before), NodeData::Text(_)) => text.clone(),
            _ => return,
        };
        if let NodeData::Text(text) = &mut self.nodes[before.0].data {
            text.push_str(&tail);
        }
        self.nodes[after.0].parent = None;
        self.nodes[parent.0].children.retain(|&c| c != after);
    }

    /// Remove attribute `name` from element `id`.
    ///
    /// Returns `false` without touching the tree when `id` is not a connected element or the
    /// attribute is already gone.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        if !self.is_connected(id) {
            return false;
        }
        match self.nodes.get_mut(id.0).map(|n| &mut n.data) {
            Some(NodeData::Element(element)) => element.attributes.remove(name),
            _ => false,
        }
    }
}
