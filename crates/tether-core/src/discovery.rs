//! One-time scan turning declaration attributes into registered bindings.

use crate::error::BindError;
use crate::registry::{AttributeBinding, Registry, VisibilityBinding, bind_event};
use crate::render_api::RenderTree;
use crate::repeat::{Repeat, RepeatBinding};
use crate::store::ModelStore;
use crate::syntax::{
    self, BIND_ATTRS, BindDecl, FOR_EACH_ATTRS, FOR_INDEX_ATTRS, VISIBLE_IF_ATTRS,
    parse_bindings, parse_repeat, parse_visibility,
};

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Attribute and property bindings registered.
    pub bindings: usize,
    pub events: usize,
    pub visibility: usize,
    pub repeats: usize,
    pub errors: Vec<BindError>,
}

impl DiscoveryReport {
    fn fail(&mut self, err: BindError) {
        log::warn!("{err}");
        self.errors.push(err);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scans `root` and everything below it.
///
/// Repeats are captured first, so declarations inside a prototype end up in
/// its template rather than being bound once globally. Then attribute and
/// event bindings, then visibility bindings, each in document order.
///
/// Scanning the same subtree twice registers its bindings twice.
pub fn discover<T: RenderTree>(
    tree: &mut T,
    store: &ModelStore,
    registry: &mut Registry<T>,
    root: T::Node,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    discover_repeats(tree, registry, root, &mut report);

    for node in tree.descendants(root) {
        let Some(src) = syntax::declaration(tree, node, &BIND_ATTRS) else {
            continue;
        };
        let decls = match parse_bindings(&src) {
            Ok(decls) => decls,
            Err(err) => {
                report.fail(err);
                continue;
            }
        };
        for decl in decls {
            match decl {
                BindDecl::Value { sink, path } => {
                    log::debug!("bind {sink:?} <- {path}");
                    let model = path.model().to_owned();
                    registry.register(model, AttributeBinding { node, sink, path });
                    report.bindings += 1;
                }
                BindDecl::Event { kind, handler } => {
                    log::debug!("listen `{kind}` -> {handler}");
                    bind_event(tree, store, node, kind, handler);
                    report.events += 1;
                }
            }
        }
    }

    for node in tree.descendants(root) {
        let Some(src) = syntax::declaration(tree, node, &VISIBLE_IF_ATTRS) else {
            continue;
        };
        match parse_visibility(&src) {
            Ok(decl) => {
                log::debug!("visible-if {src}");
                registry.register(decl.path.model().to_owned(), VisibilityBinding { node, decl });
                report.visibility += 1;
            }
            Err(err) => report.fail(err),
        }
    }

    log::debug!(
        "discovered {} binding(s), {} event(s), {} visibility, {} repeat(s), {} error(s)",
        report.bindings,
        report.events,
        report.visibility,
        report.repeats,
        report.errors.len()
    );
    report
}

/// Captures repeat declarations one at a time, outermost first.
///
/// Each capture removes the prototype, so the tree is re-scanned after every
/// step. A failed declaration has its attributes stripped and the scan moves on.
fn discover_repeats<T: RenderTree>(
    tree: &mut T,
    registry: &mut Registry<T>,
    root: T::Node,
    report: &mut DiscoveryReport,
) {
    loop {
        let next = tree.descendants(root).into_iter().find_map(|node| {
            syntax::declaration(tree, node, &FOR_EACH_ATTRS).map(|src| (node, src))
        });
        let Some((node, src)) = next else {
            break;
        };
        let index = syntax::declaration(tree, node, &FOR_INDEX_ATTRS);
        let captured = parse_repeat(&src, index.as_deref())
            .and_then(|decl| Repeat::capture(tree, node, src.clone(), decl));
        match captured {
            Ok(repeat) => {
                let binding = RepeatBinding::new(repeat);
                let models = binding.models();
                log::debug!("repeat `{src}` follows {models:?}");
                for model in models {
                    registry.register(model, binding.clone());
                }
                report.repeats += 1;
            }
            Err(err) => {
                report.fail(err);
                for name in FOR_EACH_ATTRS.iter().chain(&FOR_INDEX_ATTRS) {
                    tree.remove_attribute(node, name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, El};

    #[test]
    fn test_counts_and_order() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.mount(
            root,
            El::new("div")
                .attr("bind", "title: page.title, click: actions.save")
                .attr("visible-if", "page.ready")
                .child(
                    El::new("ul").child(
                        El::new("li")
                            .attr("for-each", "x in page.items")
                            .attr("bind", "text: this, title: page.title"),
                    ),
                ),
        );
        let store = ModelStore::new();
        let mut registry = Registry::new();
        let report = discover(&mut doc, &store, &mut registry, root);

        assert!(report.is_clean());
        assert_eq!(report.repeats, 1);
        // The template's own binding is not registered globally.
        assert_eq!(report.bindings, 1);
        assert_eq!(report.events, 1);
        assert_eq!(report.visibility, 1);
        // Repeat, attribute, visibility.
        assert_eq!(registry.count("page"), 3);
        assert_eq!(registry.count("actions"), 0);
    }

    #[test]
    fn test_bad_declarations_are_reported_and_skipped() {
        let mut doc = Document::new();
        let root = doc.root();
        let ok = doc.mount(root, El::new("p").attr("bind", "text: msg"));
        doc.mount(root, El::new("p").attr("bind", "what"));
        doc.mount(root, El::new("p").attr("data-ca-visible-if", "!"));
        let bad_repeat = doc.mount(root, El::new("li").attr("for-each", "items"));
        let store = ModelStore::new();
        let mut registry = Registry::new();

        let report = discover(&mut doc, &store, &mut registry, root);
        assert_eq!(report.errors.len(), 3);
        assert!(matches!(report.errors[0], BindError::Syntax { .. }));
        assert_eq!(report.bindings, 1);
        assert_eq!(registry.count("msg"), 1);
        assert!(doc.contains(ok));
        // The broken repeat stays in the tree as a plain node.
        assert_eq!(doc.attribute(bad_repeat, "for-each"), None);
        assert_eq!(doc.parent(bad_repeat), Some(root));
    }

    #[test]
    fn test_repeat_on_root_is_detached() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.set_attribute(root, "for-each", "x in xs");
        let store = ModelStore::new();
        let mut registry = Registry::new();
        let report = discover(&mut doc, &store, &mut registry, root);
        assert_eq!(
            report.errors,
            [BindError::Detached {
                declaration: "x in xs".into()
            }]
        );
        assert_eq!(report.repeats, 0);
    }

    #[test]
    fn test_sibling_repeats_keep_their_places() {
        let mut doc = Document::new();
        let root = doc.root();
        let ul = doc.mount(
            root,
            El::new("ul")
                .child(El::new("li").attr("for-each", "a in first"))
                .child(El::new("li").attr("for-each", "b in second")),
        );
        let store = ModelStore::new();
        let mut registry = Registry::new();
        let report = discover(&mut doc, &store, &mut registry, root);
        assert_eq!(report.repeats, 2);
        assert_eq!(registry.count("first"), 1);
        assert_eq!(registry.count("second"), 1);
        // Both prototypes replaced by anchors.
        assert_eq!(doc.children(ul).len(), 2);
        assert!(doc.element_children(ul).is_empty());
    }
}
