//! Repeated subtrees.
//!
//! A node declaring `item in path` is a prototype: it is captured once as a
//! [`Template`], replaced in the tree by an empty text anchor, and never
//! rendered itself. Each reconciliation synthesizes one instance per element
//! of the source collection, inserts it before the anchor, and re-applies the
//! template's bindings with that element in scope.
//!
//! Instances are identified by position only. Reordering the source shows up
//! as per-position value changes, not as moved instances.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::error::BindError;
use crate::path::{self, Path};
use crate::registry::{BindCx, Binding, Change, bind_event, write_sink, write_visibility};
use crate::render_api::{NodeKind, Property, RenderTree};
use crate::store::ModelStore;
use crate::syntax::{
    self, BIND_ATTRS, BindDecl, FOR_EACH_ATTRS, RepeatDecl, VISIBLE_IF_ATTRS, VisibilityDecl,
    is_declaration_attr, parse_bindings, parse_visibility,
};
use crate::value::Value;

/// Reserved leading key addressing the current element.
pub const THIS: &str = "this";

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateNode {
    pub kind: NodeKind,
    /// Static attributes, declaration attributes removed.
    pub attributes: Vec<(String, String)>,
    /// Text nodes only.
    pub text: Option<String>,
    pub bindings: Vec<BindDecl>,
    pub visibility: Option<VisibilityDecl>,
    /// Index of the parent in [`Template::nodes`]; `None` for the root.
    pub parent: Option<usize>,
}

/// Immutable description of a prototype subtree, flattened in pre-order.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    nodes: Vec<TemplateNode>,
}

impl Template {
    /// Captures `root` and its descendants.
    ///
    /// A malformed declaration anywhere inside fails the whole capture.
    /// Nested repeat declarations are not expanded: they are logged and
    /// stripped.
    pub fn capture<T: RenderTree>(
        tree: &T,
        root: T::Node,
        declaration: &str,
    ) -> Result<Self, BindError> {
        let mut nodes = Vec::new();
        let mut stack = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let index = nodes.len();
            nodes.push(capture_node(tree, node, parent, declaration)?);
            stack.extend(
                tree.children(node)
                    .into_iter()
                    .rev()
                    .map(|child| (child, Some(index))),
            );
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    /// Global models the template reads, excluding anything item-relative.
    pub fn dependencies(&self, decl: &RepeatDecl) -> BTreeSet<String> {
        let value_paths = self.nodes.iter().flat_map(|n| {
            n.bindings
                .iter()
                .filter(|b| matches!(b, BindDecl::Value { .. }))
                .map(BindDecl::path)
        });
        let visibility_paths = self
            .nodes
            .iter()
            .filter_map(|n| n.visibility.as_ref().map(|v| &v.path));
        value_paths
            .chain(visibility_paths)
            .filter(|p| !is_item_relative(decl, p) && !is_index_alias(decl, p))
            .map(|p| p.model().to_owned())
            .collect()
    }

    /// Builds a detached copy; the first returned node is the root.
    pub fn instantiate<T: RenderTree>(&self, tree: &mut T) -> Vec<T::Node> {
        let mut built: Vec<T::Node> = Vec::with_capacity(self.nodes.len());
        for tn in &self.nodes {
            let node = tree.create(&tn.kind);
            for (name, value) in &tn.attributes {
                tree.set_attribute(node, name, value);
            }
            if let Some(text) = &tn.text {
                tree.set_property(node, Property::TextContent, Some(&Value::from(text.as_str())));
            }
            if let Some(parent) = tn.parent {
                tree.append_child(built[parent], node);
            }
            built.push(node);
        }
        built
    }
}

fn capture_node<T: RenderTree>(
    tree: &T,
    node: T::Node,
    parent: Option<usize>,
    declaration: &str,
) -> Result<TemplateNode, BindError> {
    let fail = |reason: String| BindError::Template {
        declaration: declaration.to_owned(),
        reason,
    };
    let kind = tree
        .kind(node)
        .ok_or_else(|| fail("template node no longer exists".to_owned()))?;

    if kind == NodeKind::Text {
        return Ok(TemplateNode {
            kind,
            attributes: Vec::new(),
            text: Some(tree.text(node)),
            bindings: Vec::new(),
            visibility: None,
            parent,
        });
    }

    if parent.is_some()
        && let Some(nested) = syntax::declaration(tree, node, &FOR_EACH_ATTRS)
    {
        log::warn!("nested repeat `{nested}` inside `{declaration}` is not expanded");
    }
    let bindings = match syntax::declaration(tree, node, &BIND_ATTRS) {
        Some(src) => parse_bindings(&src).map_err(|e| fail(e.to_string()))?,
        None => Vec::new(),
    };
    let visibility = syntax::declaration(tree, node, &VISIBLE_IF_ATTRS)
        .map(|src| parse_visibility(&src))
        .transpose()
        .map_err(|e| fail(e.to_string()))?;
    let attributes = tree
        .attributes(node)
        .into_iter()
        .filter(|(name, _)| !is_declaration_attr(name))
        .collect();

    Ok(TemplateNode {
        kind,
        attributes,
        text: None,
        bindings,
        visibility,
        parent,
    })
}

fn is_item_relative(decl: &RepeatDecl, path: &Path) -> bool {
    let model = path.model();
    model == THIS || model == decl.item
}

fn is_index_alias(decl: &RepeatDecl, path: &Path) -> bool {
    decl.index.as_deref() == Some(path.model())
}

/// Resolution context for one instance.
struct Scope<'a> {
    decl: &'a RepeatDecl,
    element: &'a Value,
    index: usize,
}

impl Scope<'_> {
    fn resolve(&self, store: &ModelStore, path: &Path) -> Option<Value> {
        if is_item_relative(self.decl, path) {
            return path::resolve(self.element, path.rest()).map(Cow::into_owned);
        }
        if is_index_alias(self.decl, path) {
            let index = Value::from(self.index);
            return path::resolve(&index, path.rest()).map(Cow::into_owned);
        }
        store.resolve(path)
    }
}

/// Rewrites an item-relative handler to an absolute store path.
fn absolute_handler(decl: &RepeatDecl, handler: &Path, key: &str) -> Path {
    if is_item_relative(decl, handler) {
        decl.path.child(key).join(handler.rest())
    } else {
        handler.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatState {
    Uninitialized,
    Synced,
}

struct Instance<N> {
    /// List index or map key of the element this instance was built for.
    key: String,
    /// Pre-order, root first.
    nodes: Vec<N>,
}

impl<N: Copy> Instance<N> {
    fn root(&self) -> N {
        self.nodes[0]
    }
}

pub struct Repeat<T: RenderTree> {
    declaration: String,
    decl: RepeatDecl,
    template: Template,
    parent: T::Node,
    anchor: T::Node,
    instances: Vec<Instance<T::Node>>,
    state: RepeatState,
}

impl<T: RenderTree> Repeat<T> {
    /// Captures `node` as the template and swaps it for the insertion anchor.
    pub fn capture(
        tree: &mut T,
        node: T::Node,
        declaration: String,
        decl: RepeatDecl,
    ) -> Result<Self, BindError> {
        let parent = tree
            .parent(node)
            .ok_or_else(|| BindError::Detached {
                declaration: declaration.clone(),
            })?;
        let template = Template::capture(tree, node, &declaration)?;

        let anchor = tree.create(&NodeKind::Text);
        tree.insert_before(parent, anchor, Some(node));
        tree.remove_child(parent, node);
        tree.dispose(node);
        log::debug!(
            "captured repeat `{declaration}` ({} template nodes)",
            template.nodes.len()
        );

        Ok(Self {
            declaration,
            decl,
            template,
            parent,
            anchor,
            instances: Vec::new(),
            state: RepeatState::Uninitialized,
        })
    }

    pub fn declaration(&self) -> &str {
        &self.declaration
    }

    pub fn decl(&self) -> &RepeatDecl {
        &self.decl
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn state(&self) -> RepeatState {
        self.state
    }

    pub fn parent(&self) -> T::Node {
        self.parent
    }

    pub fn anchor(&self) -> T::Node {
        self.anchor
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Root node of every live instance, in order.
    pub fn roots(&self) -> Vec<T::Node> {
        self.instances.iter().map(Instance::root).collect()
    }

    /// Brings the instances in line with the current source collection.
    ///
    /// An absent source counts as empty. A present source that is neither a
    /// list nor a map is an error and leaves the instances untouched.
    pub fn reconcile(&mut self, cx: &mut BindCx<'_, T>) -> Result<(), BindError> {
        let entries: Vec<(String, Value)> = match cx.store.resolve(&self.decl.path) {
            None => Vec::new(),
            Some(Value::List(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Some(Value::Map(entries)) => entries.into_iter().collect(),
            Some(other) => {
                return Err(BindError::NotACollection {
                    path: self.decl.path.to_string(),
                    found: other.kind(),
                });
            }
        };

        self.truncate(cx.tree, entries.len());

        for (index, (key, element)) in entries.iter().enumerate() {
            match self.instances.get(index) {
                Some(existing) if existing.key == *key => {}
                Some(existing) => {
                    // Map position now holds another key; handlers captured the old one.
                    let stale = existing.root();
                    let fresh = self.synthesize(cx.tree, cx.store, key, stale);
                    cx.tree.remove_child(self.parent, stale);
                    cx.tree.dispose(stale);
                    self.instances[index] = fresh;
                }
                None => {
                    let fresh = self.synthesize(cx.tree, cx.store, key, self.anchor);
                    self.instances.push(fresh);
                }
            }

            let scope = Scope {
                decl: &self.decl,
                element,
                index,
            };
            apply_instance(cx, &self.template, &self.instances[index].nodes, &scope);
        }

        if self.state == RepeatState::Uninitialized {
            log::debug!(
                "repeat `{}` synced with {} instance(s)",
                self.declaration,
                self.instances.len()
            );
        }
        self.state = RepeatState::Synced;
        Ok(())
    }

    fn synthesize(
        &self,
        tree: &mut T,
        store: &ModelStore,
        key: &str,
        before: T::Node,
    ) -> Instance<T::Node> {
        let nodes = self.template.instantiate(tree);
        for (tn, &node) in self.template.nodes.iter().zip(&nodes) {
            for binding in &tn.bindings {
                if let BindDecl::Event { kind, handler } = binding {
                    let handler = absolute_handler(&self.decl, handler, key);
                    bind_event(tree, store, node, *kind, handler);
                }
            }
        }
        let instance = Instance {
            key: key.to_owned(),
            nodes,
        };
        tree.insert_before(self.parent, instance.root(), Some(before));
        instance
    }

    /// Detaches and disposes every instance at or beyond `len`.
    fn truncate(&mut self, tree: &mut T, len: usize) {
        if self.instances.len() <= len {
            return;
        }
        for instance in self.instances.split_off(len) {
            let root = instance.root();
            tree.remove_child(self.parent, root);
            tree.dispose(root);
        }
    }
}

fn apply_instance<T: RenderTree>(
    cx: &mut BindCx<'_, T>,
    template: &Template,
    nodes: &[T::Node],
    scope: &Scope<'_>,
) {
    for (tn, &node) in template.nodes.iter().zip(nodes) {
        for binding in &tn.bindings {
            if let BindDecl::Value { sink, path } = binding {
                let value = scope.resolve(cx.store, path);
                write_sink(cx.tree, node, sink, value.as_ref());
            }
        }
        if let Some(vis) = &tn.visibility {
            let value = scope.resolve(cx.store, &vis.path);
            write_visibility(
                cx.tree,
                node,
                &cx.config.visible_class,
                vis.negate,
                value.as_ref(),
            );
        }
    }
}

/// Shared handle registering a [`Repeat`] with the registry.
///
/// The same repeat may be registered under several models.
pub struct RepeatBinding<T: RenderTree>(Rc<RefCell<Repeat<T>>>);

impl<T: RenderTree> Clone for RepeatBinding<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: RenderTree> RepeatBinding<T> {
    pub fn new(repeat: Repeat<T>) -> Self {
        Self(Rc::new(RefCell::new(repeat)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&Repeat<T>) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Every model this repeat has to follow: the source model first.
    pub fn models(&self) -> Vec<String> {
        let repeat = self.0.borrow();
        let source = repeat.decl.path.model().to_owned();
        let mut models = vec![source.clone()];
        models.extend(
            repeat
                .template
                .dependencies(&repeat.decl)
                .into_iter()
                .filter(|m| *m != source),
        );
        models
    }
}

impl<T: RenderTree> Binding<T> for RepeatBinding<T> {
    fn apply(&mut self, cx: &mut BindCx<'_, T>, _change: &Change<'_>) -> Result<(), BindError> {
        self.0.borrow_mut().reconcile(cx)
    }
}
