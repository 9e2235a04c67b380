use std::collections::HashMap;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::error::BindError;
use crate::path::Path;
use crate::render_api::{EventKind, Listener, RenderTree};
use crate::store::ModelStore;
use crate::syntax::{Sink, VisibilityDecl};
use crate::value::Value;

/// What a binding gets to work with while it runs.
pub struct BindCx<'a, T: RenderTree> {
    pub tree: &'a mut T,
    pub store: &'a ModelStore,
    pub config: &'a RuntimeConfig,
}

/// The model change a binding is being notified about.
#[derive(Clone, Copy, Debug)]
pub struct Change<'a> {
    pub model: &'a str,
    pub new: Option<&'a Value>,
    pub old: Option<&'a Value>,
}

/// Something that re-projects the store onto the render tree when its model changes.
pub trait Binding<T: RenderTree> {
    fn apply(&mut self, cx: &mut BindCx<'_, T>, change: &Change<'_>) -> Result<(), BindError>;
}

struct FnBinding<F>(F);

impl<T, F> Binding<T> for FnBinding<F>
where
    T: RenderTree,
    F: FnMut(&mut BindCx<'_, T>, &Change<'_>) -> Result<(), BindError>,
{
    fn apply(&mut self, cx: &mut BindCx<'_, T>, change: &Change<'_>) -> Result<(), BindError> {
        (self.0)(cx, change)
    }
}

#[derive(Debug, Default)]
pub struct NotifyReport {
    pub invoked: usize,
    pub errors: Vec<BindError>,
}

/// Bindings per model name, in registration order.
pub struct Registry<T: RenderTree> {
    bindings: HashMap<String, Vec<Box<dyn Binding<T>>>>,
}

impl<T: RenderTree> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RenderTree> Registry<T> {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn register(&mut self, model: impl Into<String>, binding: impl Binding<T> + 'static) {
        self.bindings
            .entry(model.into())
            .or_default()
            .push(Box::new(binding));
    }

    pub fn register_fn<F>(&mut self, model: impl Into<String>, f: F)
    where
        F: FnMut(&mut BindCx<'_, T>, &Change<'_>) -> Result<(), BindError> + 'static,
    {
        self.register(model, FnBinding(f));
    }

    /// Number of bindings registered under `model`.
    pub fn count(&self, model: &str) -> usize {
        self.bindings.get(model).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Runs every binding of `change.model`.
    ///
    /// A failing binding is logged and recorded; the remaining ones still run.
    pub fn notify(&mut self, cx: &mut BindCx<'_, T>, change: &Change<'_>) -> NotifyReport {
        let mut report = NotifyReport::default();
        let Some(bindings) = self.bindings.get_mut(change.model) else {
            return report;
        };
        for binding in bindings.iter_mut() {
            report.invoked += 1;
            if let Err(err) = binding.apply(cx, change) {
                log::error!("binding on model `{}` failed: {err}", change.model);
                report.errors.push(err);
            }
        }
        report
    }
}

/// Writes `value` into `sink`. Absent removes the attribute or clears the property.
pub fn write_sink<T: RenderTree>(tree: &mut T, node: T::Node, sink: &Sink, value: Option<&Value>) {
    match (sink, value) {
        (Sink::Attribute(name), Some(value)) => tree.set_attribute(node, name, &value.to_string()),
        (Sink::Attribute(name), None) => tree.remove_attribute(node, name),
        (Sink::Property(property), value) => tree.set_property(node, *property, value),
    }
}

/// Toggles the configured visibility class from the truthiness of `value`.
pub fn write_visibility<T: RenderTree>(
    tree: &mut T,
    node: T::Node,
    class: &str,
    negate: bool,
    value: Option<&Value>,
) {
    let truthy = value.is_some_and(Value::is_truthy);
    tree.set_class(node, class, truthy != negate);
}

/// Attribute or direct-property binding against the global store.
#[derive(Debug)]
pub struct AttributeBinding<N> {
    pub node: N,
    pub sink: Sink,
    pub path: Path,
}

impl<T: RenderTree> Binding<T> for AttributeBinding<T::Node> {
    fn apply(&mut self, cx: &mut BindCx<'_, T>, _change: &Change<'_>) -> Result<(), BindError> {
        let value = cx.store.resolve(&self.path);
        write_sink(cx.tree, self.node, &self.sink, value.as_ref());
        Ok(())
    }
}

/// Presence-class binding; `!path` shows the node while the path is falsy.
#[derive(Debug)]
pub struct VisibilityBinding<N> {
    pub node: N,
    pub decl: VisibilityDecl,
}

impl<T: RenderTree> Binding<T> for VisibilityBinding<T::Node> {
    fn apply(&mut self, cx: &mut BindCx<'_, T>, _change: &Change<'_>) -> Result<(), BindError> {
        let value = cx.store.resolve(&self.decl.path);
        write_visibility(
            cx.tree,
            self.node,
            &cx.config.visible_class,
            self.decl.negate,
            value.as_ref(),
        );
        Ok(())
    }
}

/// Subscribes `node` to `kind` with a handler looked up at dispatch time.
///
/// The handler path is resolved on every event, so replacing the callable in
/// the store swaps the handler without re-registering.
pub fn bind_event<T: RenderTree>(
    tree: &mut T,
    store: &ModelStore,
    node: T::Node,
    kind: EventKind,
    handler: Path,
) {
    tree.listen(node, kind, event_listener(store.clone(), handler));
}

pub(crate) fn event_listener(store: ModelStore, handler: Path) -> Listener {
    Rc::new(move |kind| match store.resolve(&handler) {
        Some(Value::Callable(h)) => {
            log::trace!("`{kind}` -> {handler}");
            h.call(&store);
            Ok(())
        }
        other => Err(BindError::NotCallable {
            path: handler.to_string(),
            found: other.map_or_else(|| "nothing".to_owned(), |v| v.kind().to_string()),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, El};
    use crate::render_api::Property;
    use serde_json::json;
    use std::cell::RefCell;

    fn cx_parts() -> (Document, ModelStore, RuntimeConfig) {
        (Document::new(), ModelStore::new(), RuntimeConfig::default())
    }

    #[test]
    fn test_notify_runs_in_registration_order() {
        let (mut doc, store, config) = cx_parts();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::<Document>::new();
        for i in 0..3 {
            let log = log.clone();
            registry.register_fn("m", move |_cx, _change| {
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        let mut cx = BindCx {
            tree: &mut doc,
            store: &store,
            config: &config,
        };
        let change = Change {
            model: "m",
            new: None,
            old: None,
        };
        let report = registry.notify(&mut cx, &change);
        assert_eq!(report.invoked, 3);
        assert_eq!(*log.borrow(), [0, 1, 2]);
        assert_eq!(registry.count("m"), 3);
        assert_eq!(registry.count("other"), 0);
    }

    #[test]
    fn test_failing_binding_does_not_starve_siblings() {
        let (mut doc, store, config) = cx_parts();
        let ran = Rc::new(RefCell::new(false));
        let mut registry = Registry::<Document>::new();
        registry.register_fn("m", |_cx, _change| {
            Err(BindError::NotACollection {
                path: "m".into(),
                found: crate::ValueKind::Number,
            })
        });
        {
            let ran = ran.clone();
            registry.register_fn("m", move |_cx, _change| {
                *ran.borrow_mut() = true;
                Ok(())
            });
        }
        let mut cx = BindCx {
            tree: &mut doc,
            store: &store,
            config: &config,
        };
        let change = Change {
            model: "m",
            new: None,
            old: None,
        };
        let report = registry.notify(&mut cx, &change);
        assert_eq!(report.invoked, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(*ran.borrow());
    }

    #[test]
    fn test_attribute_and_property_sinks() {
        let (mut doc, store, config) = cx_parts();
        let root = doc.root();
        let a = doc.mount(root, El::new("a"));
        store.set("link", json!({"url": "/home", "label": "Home"}));

        let mut href = AttributeBinding {
            node: a,
            sink: Sink::Attribute("href".into()),
            path: Path::parse("link.url"),
        };
        let mut label = AttributeBinding {
            node: a,
            sink: Sink::Property(Property::TextContent),
            path: Path::parse("link.label"),
        };
        let mut cx = BindCx {
            tree: &mut doc,
            store: &store,
            config: &config,
        };
        let change = Change {
            model: "link",
            new: None,
            old: None,
        };
        href.apply(&mut cx, &change).unwrap();
        label.apply(&mut cx, &change).unwrap();
        assert_eq!(doc.attribute(a, "href").as_deref(), Some("/home"));
        assert_eq!(doc.text(a), "Home");

        store.set("link", json!({}));
        let mut cx = BindCx {
            tree: &mut doc,
            store: &store,
            config: &config,
        };
        href.apply(&mut cx, &change).unwrap();
        assert_eq!(doc.attribute(a, "href"), None);
    }

    #[test]
    fn test_visibility_with_negation() {
        let (mut doc, store, config) = cx_parts();
        let root = doc.root();
        let shown = doc.mount(root, El::new("p"));
        let hidden = doc.mount(root, El::new("p"));
        store.set("user", json!({"loggedIn": true}));

        let mut bindings = [
            VisibilityBinding {
                node: shown,
                decl: crate::syntax::parse_visibility("user.loggedIn").unwrap(),
            },
            VisibilityBinding {
                node: hidden,
                decl: crate::syntax::parse_visibility("!user.loggedIn").unwrap(),
            },
        ];
        let change = Change {
            model: "user",
            new: None,
            old: None,
        };
        for b in &mut bindings {
            let mut cx = BindCx {
                tree: &mut doc,
                store: &store,
                config: &config,
            };
            b.apply(&mut cx, &change).unwrap();
        }
        assert!(doc.has_class(shown, "ca-visible"));
        assert!(!doc.has_class(hidden, "ca-visible"));

        // Absent counts as falsy.
        store.remove("user");
        for b in &mut bindings {
            let mut cx = BindCx {
                tree: &mut doc,
                store: &store,
                config: &config,
            };
            b.apply(&mut cx, &change).unwrap();
        }
        assert!(!doc.has_class(shown, "ca-visible"));
        assert!(doc.has_class(hidden, "ca-visible"));
    }

    #[test]
    fn test_event_handler_is_late_bound() {
        let (mut doc, store, _config) = cx_parts();
        let root = doc.root();
        let button = doc.mount(root, El::new("button"));
        bind_event(&mut doc, &store, button, EventKind::Click, Path::parse("actions.go"));

        // Not there yet: reported, not swallowed.
        assert!(matches!(
            doc.dispatch(button, EventKind::Click),
            Err(BindError::NotCallable { .. })
        ));

        store.set("actions", Value::map([("go", Value::callable(|s| s.set("hits", 1)))]));
        doc.dispatch(button, EventKind::Click).unwrap();
        assert_eq!(store.get("hits"), Some(Value::from(1)));

        store.set("actions", Value::map([("go", Value::callable(|s| s.set("hits", 2)))]));
        doc.dispatch(button, EventKind::Click).unwrap();
        assert_eq!(store.get("hits"), Some(Value::from(2)));

        store.set("actions", json!({"go": "not a function"}));
        assert_eq!(
            doc.dispatch(button, EventKind::Click),
            Err(BindError::NotCallable {
                path: "actions.go".into(),
                found: "text".into(),
            })
        );
    }
}
