pub use crate::config::RuntimeConfig;
pub use crate::digest::TickReport;
pub use crate::discovery::DiscoveryReport;
pub use crate::dom::{Document, El, NodeId};
pub use crate::error::{BindError, ConfigError};
pub use crate::path::Path;
pub use crate::registry::{BindCx, Binding, Change};
pub use crate::render_api::{EventKind, NodeKind, Property, RenderTree};
pub use crate::runtime::Runtime;
pub use crate::store::ModelStore;
pub use crate::value::{Handler, Value, ValueKind};
