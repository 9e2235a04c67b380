use thiserror::Error;

use crate::value::ValueKind;

/// Usage errors raised while discovering or applying bindings.
///
/// None of these stop the digest loop: the failing binding is reported and
/// its siblings still run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindError {
    #[error("malformed binding `{declaration}`: {reason}")]
    Syntax {
        declaration: String,
        reason: &'static str,
    },

    #[error("binding `{declaration}` has an empty path")]
    EmptyPath { declaration: String },

    #[error("repeat source `{path}` is a {found}, expected a list or map")]
    NotACollection { path: String, found: ValueKind },

    #[error("handler `{path}` is not callable (resolved to {found})")]
    NotCallable { path: String, found: String },

    #[error("repeat `{declaration}` failed: {reason}")]
    Template { declaration: String, reason: String },

    #[error("repeat `{declaration}` is declared on a node without a parent")]
    Detached { declaration: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tick interval must be greater than zero")]
    ZeroInterval,
}
