use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use crate::path::{self, Path};
use crate::value::Value;

/// Model name to value, in registration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Models {
    entries: Vec<(String, Value)>,
}

impl Models {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replaces an existing model in place (keeping its position) or appends a new one.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(i).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a full path (model name first) against the models.
    pub fn resolve(&self, path: &Path) -> Option<Cow<'_, Value>> {
        let root = self.get(path.model())?;
        path::resolve(root, path.rest())
    }
}

/// Shared handle to the application's models.
///
/// Cloning the handle shares the same models. Writes never notify anyone:
/// bindings see them when the digest loop next compares the store against its
/// snapshot.
#[derive(Clone, Debug, Default)]
pub struct ModelStore(Rc<RefCell<Models>>);

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().set(name, value.into());
    }

    /// Mutates a model in place, creating it as `Null` first if missing.
    ///
    /// The store is borrowed mutably while `f` runs; `f` must not call back
    /// into this store.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut models = self.0.borrow_mut();
        let index = match models.entries.iter().position(|(n, _)| n == name) {
            Some(i) => i,
            None => {
                models.entries.push((name.to_owned(), Value::Null));
                models.entries.len() - 1
            }
        };
        f(&mut models.entries[index].1)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.borrow().names().map(str::to_owned).collect()
    }

    /// Resolves a full path (model name first) to an owned value.
    pub fn resolve(&self, path: &Path) -> Option<Value> {
        self.0.borrow().resolve(path).map(Cow::into_owned)
    }

    /// Borrow-scoped read access without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&Models) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Deep copy of every model.
    pub fn snapshot(&self) -> Models {
        self.0.borrow().clone()
    }

    pub fn load_json(&self, name: impl Into<String>, text: &str) -> Result<(), serde_json::Error> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        self.set(name, Value::from(json));
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let models = self.0.borrow();
        serde_json::Value::Object(
            models
                .iter()
                .map(|(name, v)| (name.to_owned(), serde_json::Value::from(v)))
                .collect(),
        )
    }
}
