//! Named filter functions callable from queries as `:name(args)`.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use json_context_value::Value;

/// Signature of a named filter: receives the current value and the
/// evaluated arguments.
pub type FilterFn = dyn Fn(&Value, &[Value]) -> Value;

/// Registry of named filters.
#[derive(Clone, Default)]
pub struct Filters {
    map: HashMap<String, Rc<FilterFn>>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `filter` under `name`, replacing any previous entry.
    pub fn insert<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        self.map.insert(name.into(), Rc::new(filter));
    }

    /// Builder form of [`Filters::insert`].
    pub fn with<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        self.insert(name, filter);
        self
    }

    pub fn get(&self, name: &str) -> Option<Rc<FilterFn>> {
        self.map.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.map.remove(name).is_some()
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.map.keys().collect();
        names.sort();
        f.debug_struct("Filters").field("names", &names).finish()
    }
}
