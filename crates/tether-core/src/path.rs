use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::value::Value;

/// Ordered key sequence into the model store.
///
/// The first key names the model; the remaining keys walk into it. Index keys
/// are kept as text and parsed when they meet a list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    keys: SmallVec<[String; 4]>,
}

impl Path {
    /// Splits `expr` on `.`, `[` and `]`, dropping empty tokens, so
    /// `user.items[2].name` becomes `user`, `items`, `2`, `name`.
    ///
    /// Input without any token yields a single empty key; see
    /// [`Path::is_degenerate`].
    pub fn parse(expr: &str) -> Self {
        let mut keys: SmallVec<[String; 4]> = expr
            .split(['.', '[', ']'])
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();
        if keys.is_empty() {
            keys.push(String::new());
        }
        Self { keys }
    }

    pub fn from_keys<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        let mut keys: SmallVec<[String; 4]> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            keys.push(String::new());
        }
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The model name (first key).
    pub fn model(&self) -> &str {
        &self.keys[0]
    }

    /// Keys after the model name.
    pub fn rest(&self) -> &[String] {
        &self.keys[1..]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True for the single-empty-key path produced by empty input. Such a path
    /// names no model and must not be registered.
    pub fn is_degenerate(&self) -> bool {
        self.keys.len() == 1 && self.keys[0].is_empty()
    }

    pub fn child(&self, key: impl Into<String>) -> Path {
        let mut keys = self.keys.clone();
        keys.push(key.into());
        Path { keys }
    }

    pub fn join(&self, tail: &[String]) -> Path {
        let mut keys = self.keys.clone();
        keys.extend(tail.iter().cloned());
        Path { keys }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keys.join("."))
    }
}

/// Walks `keys` from `root`, stopping with `None` at the first missing key.
///
/// A trailing `length` key on a list, map or text that has no such child
/// yields the length as a number.
pub fn resolve<'a>(root: &'a Value, keys: &[String]) -> Option<Cow<'a, Value>> {
    let mut current = root;
    for (i, key) in keys.iter().enumerate() {
        match current.child(key) {
            Some(next) => current = next,
            None if key == "length" && i + 1 == keys.len() => {
                return current.len().map(|n| Cow::Owned(Value::from(n)));
            }
            None => return None,
        }
    }
    Some(Cow::Borrowed(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(p: &Path) -> Vec<&str> {
        p.keys().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_parse_dotted_and_indexed() {
        let p = Path::parse("user.items[2].name");
        assert_eq!(keys(&p), ["user", "items", "2", "name"]);
        assert_eq!(p.model(), "user");
        assert_eq!(p.to_string(), "user.items.2.name");
    }

    #[test]
    fn test_parse_drops_empty_tokens() {
        assert_eq!(keys(&Path::parse("a..b[[0]]")), ["a", "b", "0"]);
        assert_eq!(keys(&Path::parse("[0]")), ["0"]);
    }

    #[test]
    fn test_parse_empty_is_degenerate() {
        let p = Path::parse("");
        assert!(p.is_degenerate());
        assert_eq!(keys(&p), [""]);
        assert!(Path::parse(".[]").is_degenerate());
        assert!(!Path::parse("a").is_degenerate());
    }

    #[test]
    fn test_resolve_walks_maps_and_lists() {
        let root = Value::from(json!({"items": [{"name": "a"}, {"name": "b"}]}));
        let p = Path::parse("items[1].name");
        assert_eq!(resolve(&root, p.keys()).as_deref(), Some(&Value::from("b")));
    }

    #[test]
    fn test_resolve_missing_prefix_is_absent() {
        let root = Value::from(json!({"items": []}));
        for expr in ["items.0.name", "nope.deeper.still", "items.x", "items.-1"] {
            let p = Path::parse(expr);
            assert!(resolve(&root, p.keys()).is_none(), "{expr}");
        }
        // Scalars have no children.
        let scalar = Value::from(5);
        assert!(resolve(&scalar, &["a".to_owned()]).is_none());
    }

    #[test]
    fn test_list_indices_must_be_canonical() {
        let root = Value::from(json!({"xs": ["a", "b"]}));
        for expr in ["xs.01", "xs[+1]", "xs.1e0", "xs. 1"] {
            let p = Path::parse(expr);
            assert!(resolve(&root, p.keys()).is_none(), "{expr}");
        }
        assert_eq!(
            resolve(&root, Path::parse("xs.0").keys()).as_deref(),
            Some(&Value::from("a"))
        );
        assert_eq!(
            resolve(&root, Path::parse("xs[1]").keys()).as_deref(),
            Some(&Value::from("b"))
        );
    }

    #[test]
    fn test_resolve_keeps_falsy_leaves() {
        let root = Value::from(json!({"count": 0, "flag": false, "name": ""}));
        for (expr, expected) in [("count", json!(0)), ("flag", json!(false)), ("name", json!(""))] {
            let p = Path::parse(expr);
            assert_eq!(
                resolve(&root, p.keys()).map(Cow::into_owned),
                Some(Value::from(expected))
            );
        }
    }

    #[test]
    fn test_resolve_length() {
        let root = Value::from(json!({"list": [1, 2, 3], "word": "héllo", "m": {"length": "own"}}));
        let get = |expr: &str| resolve(&root, Path::parse(expr).keys()).map(Cow::into_owned);
        assert_eq!(get("list.length"), Some(Value::from(3)));
        assert_eq!(get("word.length"), Some(Value::from(5)));
        assert_eq!(get("m.length"), Some(Value::from("own")));
        assert_eq!(get("list.length.x"), None);
    }
}
