//! In-memory [`RenderTree`] used by tests, the devtools outline and headless hosts.

use slotmap::{SlotMap, new_key_type};

use crate::error::BindError;
use crate::render_api::{EventKind, EventKinds, Listener, NodeKind, Property, RenderTree};
use crate::value::Value;

new_key_type! {
    pub struct NodeId;
}

struct NodeData {
    kind: NodeKind,
    attributes: Vec<(String, String)>,
    /// Text nodes only.
    data: String,
    value: String,
    checked: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(EventKind, Listener)>,
    events: EventKinds,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            data: String::new(),
            value: String::new(),
            checked: false,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
            events: EventKinds::empty(),
        }
    }
}

/// Element builder for [`Document::mount`].
#[derive(Clone, Debug)]
pub struct El {
    kind: NodeKind,
    attributes: Vec<(String, String)>,
    data: String,
    children: Vec<El>,
}

impl El {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element(tag.into()),
            attributes: Vec::new(),
            data: String::new(),
            children: Vec::new(),
        }
    }

    /// A text node.
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            attributes: Vec::new(),
            data: data.into(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: El) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = El>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A tree of elements and text nodes stored in a slot map.
///
/// Classes live in the `class` attribute as space separated tokens, like in
/// HTML. Setting `textContent` on an element replaces its children with a
/// single text node.
pub struct Document {
    nodes: SlotMap<NodeId, NodeData>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl Document {
    /// An empty document with a `<body>` root.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData::new(NodeKind::Element("body".into())));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.nodes.insert(NodeData::new(NodeKind::Element(tag.into())))
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        let mut node = NodeData::new(NodeKind::Text);
        node.data = data.into();
        self.nodes.insert(node)
    }

    /// Builds `el` and appends it to `parent`, returning the new node.
    pub fn mount(&mut self, parent: NodeId, el: El) -> NodeId {
        let node = self.build(el);
        self.append_child(parent, node);
        node
    }

    /// Builds `el` as a detached subtree.
    pub fn build(&mut self, el: El) -> NodeId {
        let mut data = NodeData::new(el.kind);
        data.attributes = el.attributes;
        data.data = el.data;
        let node = self.nodes.insert(data);
        for child in el.children {
            let child = self.build(child);
            self.append_child(node, child);
        }
        node
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text => None,
        }
    }

    /// Own data of a text node.
    pub fn data(&self, node: NodeId) -> Option<&str> {
        let n = self.nodes.get(node)?;
        matches!(n.kind, NodeKind::Text).then_some(n.data.as_str())
    }

    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|n| n.value.as_str())
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.checked)
    }

    pub fn events(&self, node: NodeId) -> EventKinds {
        self.nodes.get(node).map(|n| n.events).unwrap_or_default()
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// First node below `root` (inclusive) carrying `name="value"`.
    pub fn find_by_attribute(&self, root: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|&n| self.attribute(n, name).as_deref() == Some(value))
    }

    /// Element children only, skipping text nodes.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|&c| self.tag(c).is_some())
            .collect()
    }

    /// Runs every listener for `kind` on `node`.
    ///
    /// All listeners run even if one fails; the first failure is returned
    /// after every failure has been logged.
    pub fn dispatch(&self, node: NodeId, kind: EventKind) -> Result<usize, BindError> {
        let Some(data) = self.nodes.get(node) else {
            log::warn!("dispatch of `{kind}` to a node that no longer exists");
            return Ok(0);
        };
        if !data.events.contains(kind.into()) {
            return Ok(0);
        }
        let listeners: Vec<Listener> = data
            .listeners
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| l.clone())
            .collect();

        let mut first_error = None;
        for listener in &listeners {
            if let Err(err) = listener(kind) {
                log::error!("`{kind}` listener failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(listeners.len()),
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != node);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        match n.kind {
            NodeKind::Text => out.push_str(&n.data),
            NodeKind::Element(_) => {
                for &child in &n.children {
                    self.collect_text(child, out);
                }
            }
        }
    }
}

/// Text written for `textContent` and `value`: `null` and absent both clear.
fn display_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => v.to_string(),
    }
}

impl RenderTree for Document {
    type Node = NodeId;

    fn create(&mut self, kind: &NodeKind) -> NodeId {
        self.nodes.insert(NodeData::new(kind.clone()))
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node).map(|n| n.kind.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .get(node)?
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.nodes
            .get(node)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        match n.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => value.clone_into(v),
            None => n.attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.attributes.retain(|(k, _)| k != name);
        }
    }

    fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn set_property(&mut self, node: NodeId, property: Property, value: Option<&Value>) {
        let Some(kind) = self.nodes.get(node).map(|n| n.kind.clone()) else {
            return;
        };
        match property {
            Property::TextContent => {
                let text = display_text(value);
                if kind == NodeKind::Text {
                    if let Some(n) = self.nodes.get_mut(node) {
                        n.data = text;
                    }
                    return;
                }
                // Reuse a lone text child so repeated writes keep node identity.
                let children = self.children(node);
                if let [only] = children[..]
                    && self.data(only).is_some()
                    && !text.is_empty()
                {
                    if let Some(n) = self.nodes.get_mut(only) {
                        n.data = text;
                    }
                    return;
                }
                for child in children {
                    self.remove_child(node, child);
                    self.dispose(child);
                }
                if !text.is_empty() {
                    let child = self.create_text(text);
                    self.append_child(node, child);
                }
            }
            Property::Value => {
                if let Some(n) = self.nodes.get_mut(node) {
                    n.value = display_text(value);
                }
            }
            Property::Checked => {
                if let Some(n) = self.nodes.get_mut(node) {
                    n.checked = value.is_some_and(Value::is_truthy);
                }
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            log::warn!("insert_before on a node that no longer exists");
            return;
        }
        self.detach(child);
        let Some(p) = self.nodes.get_mut(parent) else {
            return;
        };
        let at = reference
            .and_then(|r| p.children.iter().position(|&c| c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child) == Some(parent) {
            self.detach(child);
        }
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|t| t == class))
    }

    fn set_class(&mut self, node: NodeId, class: &str, present: bool) {
        let mut classes = self.classes(node);
        let had = classes.iter().any(|c| c == class);
        match (had, present) {
            (false, true) => classes.push(class.to_owned()),
            (true, false) => classes.retain(|c| c != class),
            _ => return,
        }
        if classes.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    fn listen(&mut self, node: NodeId, kind: EventKind, listener: Listener) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.listeners.push((kind, listener));
            n.events |= kind.into();
        }
    }

    fn dispose(&mut self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if let Some(data) = self.nodes.remove(n) {
                stack.extend(data.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_mount_and_text() {
        let mut doc = Document::new();
        let root = doc.root();
        let ul = doc.mount(
            root,
            El::new("ul")
                .child(El::new("li").child(El::text("a")))
                .child(El::new("li").child(El::text("b"))),
        );
        assert_eq!(doc.children(root), [ul]);
        assert_eq!(doc.text(root), "ab");
        assert_eq!(doc.len(), 6);
    }

    #[test]
    fn test_insert_before_and_fallback_append() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.mount(root, El::new("a"));
        let c = doc.mount(root, El::new("c"));
        let b = doc.create_element("b");
        doc.insert_before(root, b, Some(c));
        assert_eq!(doc.children(root), [a, b, c]);

        let stray = doc.create_element("x");
        let d = doc.create_element("d");
        doc.insert_before(root, d, Some(stray));
        assert_eq!(doc.children(root), [a, b, c, d]);
        assert_eq!(doc.next_sibling(b), Some(c));
        assert_eq!(doc.next_sibling(d), None);
    }

    #[test]
    fn test_text_content_replaces_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.mount(root, El::new("p").child(El::new("b").child(El::text("old"))));
        doc.set_property(p, Property::TextContent, Some(&Value::from("new")));
        assert_eq!(doc.text(p), "new");
        assert!(doc.element_children(p).is_empty());

        let text_child = doc.children(p)[0];
        doc.set_property(p, Property::TextContent, Some(&Value::from(7)));
        assert_eq!(doc.children(p), [text_child]);
        assert_eq!(doc.text(p), "7");

        doc.set_property(p, Property::TextContent, None);
        assert!(doc.children(p).is_empty());
    }

    #[test]
    fn test_null_text_and_value_render_empty() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.mount(root, El::new("p").child(El::text("old")));
        doc.set_property(p, Property::TextContent, Some(&Value::Null));
        assert_eq!(doc.text(p), "");

        let input = doc.mount(root, El::new("input"));
        doc.set_property(input, Property::Value, Some(&Value::from("x")));
        doc.set_property(input, Property::Value, Some(&Value::Null));
        assert_eq!(doc.value(input), Some(""));
    }

    #[test]
    fn test_classes() {
        let mut doc = Document::new();
        let root = doc.root();
        let n = doc.mount(root, El::new("div").attr("class", "page"));
        doc.set_class(n, "ca-visible", true);
        doc.set_class(n, "ca-visible", true);
        assert_eq!(doc.attribute(n, "class").as_deref(), Some("page ca-visible"));
        doc.set_class(n, "page", false);
        doc.set_class(n, "ca-visible", false);
        assert_eq!(doc.attribute(n, "class"), None);
        assert!(!doc.has_class(n, "ca-visible"));
    }

    #[test]
    fn test_dispose_frees_subtree() {
        let mut doc = Document::new();
        let root = doc.root();
        let ul = doc.mount(root, El::new("ul").child(El::new("li").child(El::text("x"))));
        assert_eq!(doc.len(), 4);
        doc.dispose(ul);
        assert_eq!(doc.len(), 1);
        assert!(doc.children(root).is_empty());
        assert!(!doc.contains(ul));
    }

    #[test]
    fn test_dispatch_runs_every_listener() {
        let mut doc = Document::new();
        let root = doc.root();
        let button = doc.mount(root, El::new("button"));
        let hits = Rc::new(Cell::new(0));

        let failing: Listener = Rc::new(|_| {
            Err(BindError::NotCallable {
                path: "nope".into(),
                found: "nothing".into(),
            })
        });
        doc.listen(button, EventKind::Click, failing);
        let counting: Listener = {
            let hits = hits.clone();
            Rc::new(move |_| {
                hits.set(hits.get() + 1);
                Ok(())
            })
        };
        doc.listen(button, EventKind::Click, counting);

        assert!(doc.dispatch(button, EventKind::Click).is_err());
        assert_eq!(hits.get(), 1);
        assert_eq!(doc.dispatch(button, EventKind::Submit), Ok(0));
        assert_eq!(doc.events(button), EventKinds::CLICK);
    }
}
