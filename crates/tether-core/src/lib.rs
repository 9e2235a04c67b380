//! # Models, Bindings, and the Digest
//!
//! Tether keeps a render tree in sync with plain data. There are three main
//! pieces:
//!
//! - `ModelStore`: named values the application reads and writes freely.
//! - declaration attributes: `bind`, `visible-if` and `for-each` on nodes,
//!   turned into bindings by `Runtime::discover`.
//! - the digest: a periodic tick that compares every model against the
//!   previous tick's snapshot and re-runs the bindings of the ones that changed.
//!
//! Writes never notify anything by themselves. A change becomes visible at
//! the next tick.
//!
//! ## Binding a list
//!
//! ```rust
//! use tether_core::*;
//! use serde_json::json;
//!
//! let mut rt = Runtime::new(Document::new());
//! let body = rt.tree().root();
//! let ul = rt.tree_mut().mount(
//!     body,
//!     El::new("ul").child(
//!         El::new("li")
//!             .attr("for-each", "item in list")
//!             .attr("bind", "this.name to text"),
//!     ),
//! );
//!
//! rt.discover(body);
//! rt.store().set("list", json!([{ "name": "a" }]));
//! rt.tick();
//!
//! let items = rt.tree().element_children(ul);
//! assert_eq!(items.len(), 1);
//! assert_eq!(rt.tree().text(items[0]), "a");
//! ```
//!
//! ## Declarations
//!
//! - `bind="attr: path"` or `bind="path to attr"`, comma separated.
//!   `textContent`/`text`, `value` and `checked` are set as properties,
//!   anything else as an attribute. Event names (`click`, `submit`, ...)
//!   take a handler path instead.
//! - `visible-if="path"` or `visible-if="!path"` toggles the `ca-visible`
//!   class.
//! - `for-each="item in path"` repeats the node per element. Inside it,
//!   `this.x` and `item.x` read from the element and `for-index="i"` names
//!   the position.
//!
//! Every attribute also accepts the `data-ca-` prefix.
//!
//! ## Handlers
//!
//! Event handlers are callables stored in the model and looked up on every
//! event, so swapping one in the store takes effect immediately:
//!
//! ```rust
//! use tether_core::*;
//!
//! let store = ModelStore::new();
//! store.set(
//!     "actions",
//!     Value::map([("add", Value::callable(|s| s.update("count", |c| {
//!         *c = Value::from(c.as_f64().unwrap_or(0.0) + 1.0);
//!     })))]),
//! );
//! ```

pub mod config;
pub mod digest;
pub mod discovery;
pub mod dom;
pub mod error;
pub mod path;
pub mod prelude;
pub mod registry;
pub mod render_api;
pub mod repeat;
pub mod runtime;
pub mod store;
pub mod syntax;
pub mod value;

pub use config::*;
pub use digest::*;
pub use discovery::*;
pub use dom::*;
pub use error::*;
pub use path::Path;
pub use registry::*;
pub use render_api::*;
pub use repeat::{Repeat, RepeatBinding, RepeatState, Template};
pub use runtime::*;
pub use store::*;
pub use value::*;
