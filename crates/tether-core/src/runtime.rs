use web_time::Instant;

use crate::config::RuntimeConfig;
use crate::digest::{Digest, Ticker, TickReport};
use crate::discovery::{self, DiscoveryReport};
use crate::error::BindError;
use crate::path::Path;
use crate::registry::{BindCx, Binding, Change, Registry, bind_event};
use crate::render_api::{EventKind, RenderTree};
use crate::store::ModelStore;

/// Owns everything one bound tree needs: the store handle, the bindings,
/// the tree itself and the digest state.
///
/// There is no global instance; hosts create one per tree and drive it with
/// [`Runtime::tick`], [`Runtime::poll`] or [`Runtime::run_while`].
pub struct Runtime<T: RenderTree> {
    config: RuntimeConfig,
    store: ModelStore,
    registry: Registry<T>,
    tree: T,
    digest: Digest,
    ticker: Ticker,
}

impl<T: RenderTree> Runtime<T> {
    pub fn new(tree: T) -> Self {
        Self::with_config(tree, RuntimeConfig::default())
    }

    pub fn with_config(tree: T, config: RuntimeConfig) -> Self {
        let ticker = Ticker::new(config.tick_interval);
        Self {
            config,
            store: ModelStore::new(),
            registry: Registry::new(),
            tree,
            digest: Digest::new(),
            ticker,
        }
    }

    /// Shares an existing store, e.g. one already loaded from JSON.
    pub fn with_store(mut self, store: ModelStore) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<T> {
        &mut self.registry
    }

    pub fn ticks(&self) -> u64 {
        self.digest.ticks()
    }

    /// Scans `root` for declarations and registers their bindings. Scanning the
    /// same subtree twice registers everything twice.
    pub fn discover(&mut self, root: T::Node) -> DiscoveryReport {
        discovery::discover(&mut self.tree, &self.store, &mut self.registry, root)
    }

    /// Wires `kind` on `node` to the callable at `handler`, resolved per event.
    pub fn bind_event(
        &mut self,
        node: T::Node,
        kind: EventKind,
        handler: &str,
    ) -> Result<(), BindError> {
        let path = Path::parse(handler.trim());
        if path.is_degenerate() {
            return Err(BindError::EmptyPath {
                declaration: handler.to_owned(),
            });
        }
        bind_event(&mut self.tree, &self.store, node, kind, path);
        Ok(())
    }

    pub fn register(&mut self, model: impl Into<String>, binding: impl Binding<T> + 'static) {
        self.registry.register(model, binding);
    }

    pub fn register_fn<F>(&mut self, model: impl Into<String>, f: F)
    where
        F: FnMut(&mut BindCx<'_, T>, &Change<'_>) -> Result<(), BindError> + 'static,
    {
        self.registry.register_fn(model, f);
    }

    /// Runs one digest tick now, regardless of the schedule.
    pub fn tick(&mut self) -> TickReport {
        let mut cx = BindCx {
            tree: &mut self.tree,
            store: &self.store,
            config: &self.config,
        };
        self.digest.tick(&mut self.registry, &mut cx)
    }

    /// Ticks if the interval has elapsed at `now`. For hosts that own the
    /// event loop (a frame callback, a UI timer).
    pub fn poll(&mut self, now: Instant) -> Option<TickReport> {
        self.ticker.due(now).then(|| self.tick())
    }

    /// Blocks the current thread, ticking at the configured interval until
    /// `keep_going` returns false. Native hosts only.
    pub fn run_while(&mut self, mut keep_going: impl FnMut(&mut Self, &TickReport) -> bool) {
        loop {
            if let Some(report) = self.poll(Instant::now())
                && !keep_going(self, &report)
            {
                break;
            }
            std::thread::sleep(self.ticker.until_next(Instant::now()));
        }
    }

    pub fn into_tree(self) -> T {
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, El};
    use crate::value::Value;
    use web_time::Duration;

    #[test]
    fn test_poll_follows_interval() {
        let config = RuntimeConfig::default().tick_interval(Duration::from_millis(20));
        let mut rt = Runtime::with_config(Document::new(), config);
        let start = Instant::now();
        assert!(rt.poll(start).is_some());
        assert!(rt.poll(start + Duration::from_millis(5)).is_none());
        assert!(rt.poll(start + Duration::from_millis(20)).is_some());
        assert_eq!(rt.ticks(), 2);
    }

    #[test]
    fn test_bind_event_rejects_empty_handler() {
        let mut rt = Runtime::new(Document::new());
        let root = rt.tree().root();
        let button = rt.tree_mut().mount(root, El::new("button"));
        assert!(matches!(
            rt.bind_event(button, EventKind::Click, " "),
            Err(BindError::EmptyPath { .. })
        ));
        rt.bind_event(button, EventKind::Click, "ui.press").unwrap();
        rt.store()
            .set("ui", Value::map([("press", Value::callable(|s| s.set("pressed", true)))]));
        rt.tree().dispatch(button, EventKind::Click).unwrap();
        assert_eq!(rt.store().get("pressed"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_run_while_stops_on_request() {
        let config = RuntimeConfig::default().tick_interval(Duration::from_millis(1));
        let mut rt = Runtime::with_config(Document::new(), config);
        rt.store().set("n", 0);
        rt.run_while(|rt, report| {
            rt.store().update("n", |n| *n = Value::from(report.tick as f64));
            report.tick < 3
        });
        assert_eq!(rt.ticks(), 3);
    }
}
