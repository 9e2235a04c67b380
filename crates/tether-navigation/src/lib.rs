//! Hashbang routing over pages declared in the tree.
//!
//! Pages are nodes with the `ca-page` class and a `data-ca-route` (or
//! `route`) attribute. Exactly one page carries the visibility class at a
//! time: the one matching the current hash, or the `*` page as a fallback.
//!
//! ```rust
//! use tether_core::*;
//! use tether_navigation::HashRouter;
//!
//! let mut doc = Document::new();
//! let body = doc.root();
//! let home = doc.mount(body, El::new("section").attr("class", "ca-page").attr("route", "/"));
//! let about = doc.mount(body, El::new("section").attr("class", "ca-page").attr("route", "/about"));
//!
//! let mut router = HashRouter::new(&RuntimeConfig::default());
//! router.discover_pages(&doc, body);
//! router.start(&mut doc);
//! assert!(doc.has_class(home, "ca-visible"));
//!
//! router.navigate(&mut doc, "about");
//! assert_eq!(router.current(), "!/about");
//! assert!(doc.has_class(about, "ca-visible"));
//! assert!(!doc.has_class(home, "ca-visible"));
//! ```

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tether_core::{RenderTree, RuntimeConfig};

pub const PAGE_CLASS: &str = "ca-page";
pub const ROUTE_ATTRS: [&str; 2] = ["data-ca-route", "route"];
pub const LINK_ATTR: &str = "data-ca-link";
pub const FALLBACK_ROUTE: &str = "*";

/// Turns a path into a hashbang location: `about` and `/about` both become
/// `!/about`; an existing `!/` prefix is kept.
pub fn build_url(path: &str) -> String {
    if path.starts_with("!/") {
        return path.to_owned();
    }
    let mut url = String::from("!");
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);
    url
}

type RouteListener = Rc<dyn Fn(&str)>;

#[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
struct SavedHistory {
    current: String,
    back: Vec<String>,
}

pub struct HashRouter<T: RenderTree> {
    /// Declaration order; a duplicate route replaces the page in place.
    routes: Vec<(String, T::Node)>,
    hash: String,
    history: Vec<String>,
    visible_class: String,
    listeners: Vec<RouteListener>,
}

impl<T: RenderTree> HashRouter<T> {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            routes: Vec::new(),
            hash: String::new(),
            history: Vec::new(),
            visible_class: config.visible_class.clone(),
            listeners: Vec::new(),
        }
    }

    /// Registers every page below `root`. Returns the number of routes added.
    pub fn discover_pages(&mut self, tree: &T, root: T::Node) -> usize {
        let mut added = 0;
        for node in tree.descendants(root) {
            if !tree.has_class(node, PAGE_CLASS) {
                continue;
            }
            let route = ROUTE_ATTRS
                .iter()
                .filter_map(|name| tree.attribute(node, name))
                .find(|r| !r.is_empty());
            match route {
                Some(route) => {
                    self.add_route(route, node);
                    added += 1;
                }
                None => log::warn!("page {node:?} has no route and can never be shown"),
            }
        }
        added
    }

    pub fn add_route(&mut self, route: impl Into<String>, page: T::Node) {
        let route = route.into();
        match self.routes.iter_mut().find(|(r, _)| *r == route) {
            Some((_, existing)) => {
                log::warn!("route `{route}` already exists; replacing the old page");
                *existing = page;
            }
            None => self.routes.push((route, page)),
        }
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, T::Node)> {
        self.routes.iter().map(|(r, n)| (r.as_str(), *n))
    }

    /// Page for `route` (a leading `!` is ignored), else the `*` page.
    pub fn match_route(&self, route: &str) -> Option<T::Node> {
        let route = route.strip_prefix('!').unwrap_or(route);
        self.page(route).or_else(|| self.page(FALLBACK_ROUTE))
    }

    fn page(&self, route: &str) -> Option<T::Node> {
        self.routes
            .iter()
            .find(|(r, _)| r == route)
            .map(|(_, n)| *n)
    }

    /// Current hash without the leading `#`.
    pub fn current(&self) -> &str {
        &self.hash
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Calls `f` with the new hash after every hash change.
    pub fn subscribe(&mut self, f: impl Fn(&str) + 'static) {
        self.listeners.push(Rc::new(f));
    }

    /// Moves to `path`: `/` and the empty path stay `/`, anything else goes
    /// through [`build_url`].
    pub fn navigate(&mut self, tree: &mut T, path: &str) -> bool {
        let location = if path == "/" || path.is_empty() {
            "/".to_owned()
        } else {
            build_url(path)
        };
        self.set_hash(tree, &location)
    }

    /// Host-side hash change, e.g. the user edited the address bar.
    ///
    /// Setting the hash it already has is not a change. Returns whether a
    /// page was activated.
    pub fn set_hash(&mut self, tree: &mut T, hash: &str) -> bool {
        let hash = hash.strip_prefix('#').unwrap_or(hash);
        if hash == self.hash {
            return false;
        }
        let previous = std::mem::replace(&mut self.hash, hash.to_owned());
        self.history.push(previous);
        self.changed(tree)
    }

    /// Returns to the previous hash. False when there is no history.
    pub fn back(&mut self, tree: &mut T) -> bool {
        let Some(previous) = self.history.pop() else {
            return false;
        };
        self.hash = previous;
        self.changed(tree);
        true
    }

    fn changed(&mut self, tree: &mut T) -> bool {
        log::debug!("route -> `{}`", self.hash);
        let activated = self.start(tree);
        let hash = self.hash.clone();
        for listener in self.listeners.clone() {
            listener(&hash);
        }
        activated
    }

    /// Shows the page matching `path` and hides every other page.
    pub fn activate(&self, tree: &mut T, path: &str) -> bool {
        let Some(target) = self.match_route(path) else {
            log::warn!("no page matches `{path}` and there is no `*` page");
            return false;
        };
        for (_, page) in &self.routes {
            tree.set_class(*page, &self.visible_class, false);
        }
        tree.set_class(target, &self.visible_class, true);
        true
    }

    /// Activates the page for the current hash, or `/` when there is none.
    /// Leaves the pages alone when nothing matches.
    pub fn start(&self, tree: &mut T) -> bool {
        let path = if self.hash.is_empty() { "/" } else { self.hash.as_str() };
        self.match_route(path).is_some() && self.activate(tree, path)
    }

    /// Navigates to the `href` of a `data-ca-link` node. Returns false for
    /// any other node, so the host can fall back to default handling.
    pub fn follow_link(&mut self, tree: &mut T, node: T::Node) -> bool {
        if tree.attribute(node, LINK_ATTR).is_none() {
            return false;
        }
        let href = tree.attribute(node, "href").unwrap_or_default();
        self.navigate(tree, &href);
        true
    }

    /// Current hash and back stack as JSON.
    pub fn history_json(&self) -> String {
        let saved = SavedHistory {
            current: self.hash.clone(),
            back: self.history.clone(),
        };
        serde_json::to_string(&saved).unwrap_or("{}".into())
    }

    /// Restores what [`history_json`](Self::history_json) produced, then
    /// activates the restored page.
    pub fn restore_history(&mut self, tree: &mut T, json: &str) -> Result<(), serde_json::Error> {
        let saved: SavedHistory = serde_json::from_str(json)?;
        self.hash = saved.current;
        self.history = saved.back;
        self.start(tree);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tether_core::{Document, El, NodeId};

    fn pages(routes: &[&str]) -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let body = doc.root();
        let nodes = routes
            .iter()
            .map(|r| {
                doc.mount(
                    body,
                    El::new("section")
                        .attr("class", PAGE_CLASS)
                        .attr("data-ca-route", *r),
                )
            })
            .collect();
        (doc, nodes)
    }

    fn visible(doc: &Document, nodes: &[NodeId]) -> Vec<bool> {
        nodes
            .iter()
            .map(|&n| doc.has_class(n, "ca-visible"))
            .collect()
    }

    #[test]
    fn test_build_url() {
        assert_eq!(build_url("about"), "!/about");
        assert_eq!(build_url("/about"), "!/about");
        assert_eq!(build_url("!/about"), "!/about");
        assert_eq!(build_url("!about"), "!/!about");
    }

    #[test]
    fn test_match_strips_bang_and_falls_back() {
        let (mut doc, nodes) = pages(&["/", "/about"]);
        let mut router = HashRouter::new(&RuntimeConfig::default());
        router.discover_pages(&doc, doc.root());

        assert_eq!(router.match_route("!/about"), Some(nodes[1]));
        assert_eq!(router.match_route("/about"), Some(nodes[1]));
        assert_eq!(router.match_route("/missing"), None);

        let body = doc.root();
        let fallback = doc.mount(
            body,
            El::new("section").attr("class", PAGE_CLASS).attr("route", "*"),
        );
        router.discover_pages(&doc, fallback);
        assert_eq!(router.match_route("/missing"), Some(fallback));
    }

    #[test]
    fn test_pages_without_route_or_duplicated() {
        let (mut doc, nodes) = pages(&["/", "/"]);
        let body = doc.root();
        doc.mount(body, El::new("section").attr("class", PAGE_CLASS));
        let mut router = HashRouter::new(&RuntimeConfig::default());
        assert_eq!(router.discover_pages(&doc, body), 2);
        // Later declaration wins.
        assert_eq!(router.routes().collect::<Vec<_>>(), [("/", nodes[1])]);
    }

    #[test]
    fn test_navigation_toggles_pages_and_notifies() {
        let (mut doc, nodes) = pages(&["/", "/about", "*"]);
        let mut router = HashRouter::new(&RuntimeConfig::default());
        router.discover_pages(&doc, doc.root());
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            router.subscribe(move |path| seen.borrow_mut().push(path.to_owned()));
        }

        assert!(router.start(&mut doc));
        assert_eq!(visible(&doc, &nodes), [true, false, false]);

        assert!(router.navigate(&mut doc, "/about"));
        assert_eq!(visible(&doc, &nodes), [false, true, false]);

        assert!(router.set_hash(&mut doc, "#!/nowhere"));
        assert_eq!(visible(&doc, &nodes), [false, false, true]);

        assert!(!router.navigate(&mut doc, "nowhere"));
        assert!(router.navigate(&mut doc, ""));
        assert_eq!(router.current(), "/");
        assert_eq!(visible(&doc, &nodes), [true, false, false]);

        assert_eq!(*seen.borrow(), ["!/about", "!/nowhere", "/"]);
    }

    #[test]
    fn test_back_and_persisted_history() {
        let (mut doc, nodes) = pages(&["/", "/a", "/b"]);
        let mut router = HashRouter::new(&RuntimeConfig::default());
        router.discover_pages(&doc, doc.root());
        router.start(&mut doc);
        router.navigate(&mut doc, "a");
        router.navigate(&mut doc, "b");
        assert_eq!(router.history(), ["", "!/a"]);

        assert!(router.back(&mut doc));
        assert_eq!(router.current(), "!/a");
        assert_eq!(visible(&doc, &nodes), [false, true, false]);

        let saved = router.history_json();
        let mut restored = HashRouter::new(&RuntimeConfig::default());
        restored.discover_pages(&doc, doc.root());
        restored.restore_history(&mut doc, &saved).unwrap();
        assert_eq!(restored.current(), "!/a");
        assert!(restored.back(&mut doc));
        assert_eq!(visible(&doc, &nodes), [true, false, false]);
        assert!(!restored.back(&mut doc));

        assert!(restored.restore_history(&mut doc, "not json").is_err());
    }

    #[test]
    fn test_follow_link() {
        let (mut doc, nodes) = pages(&["/", "/about"]);
        let body = doc.root();
        let link = doc.mount(
            body,
            El::new("a").attr("data-ca-link", "").attr("href", "/about"),
        );
        let plain = doc.mount(body, El::new("a").attr("href", "/about"));
        let mut router = HashRouter::new(&RuntimeConfig::default());
        router.discover_pages(&doc, body);

        assert!(!router.follow_link(&mut doc, plain));
        assert_eq!(router.current(), "");
        assert!(router.follow_link(&mut doc, link));
        assert_eq!(router.current(), "!/about");
        assert_eq!(visible(&doc, &nodes), [false, true]);
    }
}
