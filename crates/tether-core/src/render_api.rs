use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::error::BindError;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Text,
}

/// Node properties that are set directly instead of as a named attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Property {
    TextContent,
    Value,
    Checked,
}

impl Property {
    /// `text` is accepted as shorthand for `textContent`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "textContent" | "text" => Some(Property::TextContent),
            "value" => Some(Property::Value),
            "checked" => Some(Property::Checked),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::TextContent => "textContent",
            Property::Value => "value",
            Property::Checked => "checked",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    MouseDown,
    MouseUp,
    MouseOver,
    MouseEnter,
    MouseLeave,
    Submit,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Click,
        EventKind::MouseDown,
        EventKind::MouseUp,
        EventKind::MouseOver,
        EventKind::MouseEnter,
        EventKind::MouseLeave,
        EventKind::Submit,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::MouseDown => "mousedown",
            EventKind::MouseUp => "mouseup",
            EventKind::MouseOver => "mouseover",
            EventKind::MouseEnter => "mouseenter",
            EventKind::MouseLeave => "mouseleave",
            EventKind::Submit => "submit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// Set of event kinds a node listens for.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        const CLICK = 1 << 0;
        const MOUSE_DOWN = 1 << 1;
        const MOUSE_UP = 1 << 2;
        const MOUSE_OVER = 1 << 3;
        const MOUSE_ENTER = 1 << 4;
        const MOUSE_LEAVE = 1 << 5;
        const SUBMIT = 1 << 6;
    }
}

impl From<EventKind> for EventKinds {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Click => EventKinds::CLICK,
            EventKind::MouseDown => EventKinds::MOUSE_DOWN,
            EventKind::MouseUp => EventKinds::MOUSE_UP,
            EventKind::MouseOver => EventKinds::MOUSE_OVER,
            EventKind::MouseEnter => EventKinds::MOUSE_ENTER,
            EventKind::MouseLeave => EventKinds::MOUSE_LEAVE,
            EventKind::Submit => EventKinds::SUBMIT,
        }
    }
}

impl EventKinds {
    pub fn kinds(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(move |k| self.contains(EventKinds::from(*k)))
    }
}

pub type Listener = Rc<dyn Fn(EventKind) -> Result<(), BindError>>;

/// The render tree the bindings write into.
///
/// This is the whole contract between the binding machinery and a host
/// platform: nodes are opaque copyable handles, and every mutation goes
/// through this trait.
pub trait RenderTree: 'static {
    type Node: Copy + Eq + Hash + fmt::Debug + 'static;

    fn create(&mut self, kind: &NodeKind) -> Self::Node;
    fn kind(&self, node: Self::Node) -> Option<NodeKind>;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<String>;
    /// All attributes in declaration order.
    fn attributes(&self, node: Self::Node) -> Vec<(String, String)>;
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: Self::Node, name: &str);

    /// Text content of a node and its descendants.
    fn text(&self, node: Self::Node) -> String;
    /// `None` clears the property.
    fn set_property(&mut self, node: Self::Node, property: Property, value: Option<&Value>);

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&n| n == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Inserts `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of `parent`.
    fn insert_before(&mut self, parent: Self::Node, child: Self::Node, reference: Option<Self::Node>);

    fn append_child(&mut self, parent: Self::Node, child: Self::Node) {
        self.insert_before(parent, child, None)
    }

    fn remove_child(&mut self, parent: Self::Node, child: Self::Node);

    fn has_class(&self, node: Self::Node, class: &str) -> bool;
    fn set_class(&mut self, node: Self::Node, class: &str, present: bool);

    fn listen(&mut self, node: Self::Node, kind: EventKind, listener: Listener);

    /// Releases a detached subtree. Hosts with garbage-collected nodes can ignore this.
    fn dispose(&mut self, _node: Self::Node) {}

    /// `root` and everything below it, in document order.
    fn descendants(&self, root: Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).into_iter().rev());
        }
        out
    }
}
