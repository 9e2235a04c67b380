//! Parsing of the declarative binding attributes.
//!
//! | attribute | syntax |
//! |---|---|
//! | `data-ca-bind` / `bind` | `attr: path` or `path to attr`, comma separated |
//! | `data-ca-visible-if` / `visible-if` | `path` or `!path` |
//! | `data-ca-for-each` / `for-each` | `item in path` |
//! | `data-ca-for-index` / `for-index` | index alias for the sibling `for-each` |
//!
//! A bind target naming one of the recognized event kinds (`click`,
//! `mousedown`, `mouseup`, `mouseover`, `mouseenter`, `mouseleave`,
//! `submit`) declares an event handler instead of a value binding.

use crate::error::BindError;
use crate::path::Path;
use crate::render_api::{EventKind, Property, RenderTree};

pub const BIND_ATTRS: [&str; 2] = ["data-ca-bind", "bind"];
pub const VISIBLE_IF_ATTRS: [&str; 2] = ["data-ca-visible-if", "visible-if"];
pub const FOR_EACH_ATTRS: [&str; 2] = ["data-ca-for-each", "for-each"];
pub const FOR_INDEX_ATTRS: [&str; 2] = ["data-ca-for-index", "for-index"];

/// Reads the first non-empty spelling of a declaration attribute.
pub fn declaration<T: RenderTree>(tree: &T, node: T::Node, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| tree.attribute(node, n))
        .find(|v| !v.is_empty())
}

pub fn is_declaration_attr(name: &str) -> bool {
    [BIND_ATTRS, VISIBLE_IF_ATTRS, FOR_EACH_ATTRS, FOR_INDEX_ATTRS]
        .iter()
        .any(|names| names.contains(&name))
}

/// Where a value binding writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sink {
    Attribute(String),
    Property(Property),
}

#[derive(Clone, Debug, PartialEq)]
pub enum BindDecl {
    Value { sink: Sink, path: Path },
    Event { kind: EventKind, handler: Path },
}

impl BindDecl {
    pub fn path(&self) -> &Path {
        match self {
            BindDecl::Value { path, .. } => path,
            BindDecl::Event { handler, .. } => handler,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityDecl {
    pub negate: bool,
    pub path: Path,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RepeatDecl {
    pub item: String,
    pub path: Path,
    pub index: Option<String>,
}

fn syntax(declaration: &str, reason: &'static str) -> BindError {
    BindError::Syntax {
        declaration: declaration.trim().to_owned(),
        reason,
    }
}

fn parse_path(declaration: &str, expr: &str) -> Result<Path, BindError> {
    let path = Path::parse(expr);
    if path.is_degenerate() {
        return Err(BindError::EmptyPath {
            declaration: declaration.trim().to_owned(),
        });
    }
    Ok(path)
}

/// Parses a `bind` attribute value.
pub fn parse_bindings(src: &str) -> Result<Vec<BindDecl>, BindError> {
    src.split(',').map(parse_binding).collect()
}

fn parse_binding(part: &str) -> Result<BindDecl, BindError> {
    // `path to attr` wins over `attr: path` when both could apply.
    let (target, expr) = if let Some((expr, target)) = part.split_once(" to ") {
        (target.trim(), expr.trim())
    } else if let Some((target, expr)) = part.split_once(':') {
        (target.trim(), expr.trim())
    } else {
        return Err(syntax(part, "expected `attr: path` or `path to attr`"));
    };

    if target.is_empty() {
        return Err(syntax(part, "missing binding target"));
    }
    if expr.is_empty() {
        return Err(BindError::EmptyPath {
            declaration: part.trim().to_owned(),
        });
    }
    let path = parse_path(part, expr)?;

    if let Some(kind) = EventKind::from_name(target) {
        return Ok(BindDecl::Event {
            kind,
            handler: path,
        });
    }
    let sink = match Property::from_name(target) {
        Some(property) => Sink::Property(property),
        None => Sink::Attribute(target.to_owned()),
    };
    Ok(BindDecl::Value { sink, path })
}

/// Parses a `visible-if` attribute value.
pub fn parse_visibility(src: &str) -> Result<VisibilityDecl, BindError> {
    let src = src.trim();
    let (negate, expr) = match src.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, src),
    };
    Ok(VisibilityDecl {
        negate,
        path: parse_path(src, expr)?,
    })
}

/// Parses a `for-each` attribute value; `index` comes from the sibling
/// `for-index` attribute.
pub fn parse_repeat(src: &str, index: Option<&str>) -> Result<RepeatDecl, BindError> {
    let Some((item, expr)) = src.split_once(" in ") else {
        return Err(syntax(src, "expected `item in path`"));
    };
    let item = item.trim();
    if item.is_empty() {
        return Err(syntax(src, "missing item alias"));
    }
    let index = index
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(str::to_owned);
    Ok(RepeatDecl {
        item: item.to_owned(),
        path: parse_path(src, expr.trim())?,
        index,
    })
}
