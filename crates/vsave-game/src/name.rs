// name.rs — process-wide interned names
//
// Class names, map names and sound sequence names are compared constantly,
// so every distinct spelling is stored once and shared.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

static NAME_POOL: Mutex<Option<HashSet<Arc<str>>>> = Mutex::new(None);

/// An interned name. The empty name means "none".
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(text: &str) -> Self {
        let mut guard = NAME_POOL.lock();
        let pool = guard.get_or_insert_with(HashSet::new);
        if let Some(existing) = pool.get(text) {
            return Name(existing.clone());
        }
        let shared: Arc<str> = Arc::from(text);
        pool.insert(shared.clone());
        Name(shared)
    }

    pub fn none() -> Self {
        Name::new("")
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Name {
    fn default() -> Self {
        Name::none()
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", &*self.0)
    }
}
