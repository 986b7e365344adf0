// object.rs — level objects, their arena and the class registry
//
// Objects reference each other by `ObjectId` instead of by pointer. An id
// is unique for the life of the process, so references survive objects
// moving between levels.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use vsave_common::error::{SaveError, SaveResult};

use crate::archive::Serializable;

static NEXT_OBJECT_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a level object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A serializable level object (actor, thinker, ...).
pub trait SaveObject: Serializable + Any {
    /// Class name recorded in the save and looked up in the registry on load.
    fn class_name(&self) -> &'static str;

    /// Player-controlled objects are rebuilt from player state on load.
    fn is_player(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Decides which objects stay out of the saved graph.
pub type SkipPredicate = dyn Fn(&dyn SaveObject) -> bool;

/// Default predicate: player objects are not saved.
pub fn skip_players(obj: &dyn SaveObject) -> bool {
    obj.is_player()
}

// ============================================================
// ObjectArena
// ============================================================

/// All objects of one level, iterated in creation order.
#[derive(Default)]
pub struct ObjectArena {
    objects: BTreeMap<ObjectId, Box<dyn SaveObject>>,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, obj: Box<dyn SaveObject>) -> ObjectId {
        let id = ObjectId::next();
        self.objects.insert(id, obj);
        id
    }

    /// Re-insert an object taken from another arena under its old id.
    pub fn adopt(&mut self, id: ObjectId, obj: Box<dyn SaveObject>) {
        self.objects.insert(id, obj);
    }

    pub fn take(&mut self, id: ObjectId) -> Option<Box<dyn SaveObject>> {
        self.objects.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&dyn SaveObject> {
        self.objects.get(&id).map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut (dyn SaveObject + 'static)> {
        self.objects.get_mut(&id).map(|b| b.as_mut())
    }

    /// Typed access to an object.
    pub fn get_as<T: SaveObject>(&self, id: ObjectId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref()
    }

    pub fn get_as_mut<T: SaveObject>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &dyn SaveObject)> {
        self.objects.iter().map(|(&id, b)| (id, b.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ============================================================
// ClassRegistry
// ============================================================

pub type ClassFactory = fn() -> Box<dyn SaveObject>;

/// Maps saved class names back to constructors of empty objects.
#[derive(Default, Clone)]
pub struct ClassRegistry {
    factories: HashMap<&'static str, ClassFactory>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class_name: &'static str, factory: ClassFactory) {
        self.factories.insert(class_name, factory);
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Construct an empty shell of `class_name`.
    pub fn create(&self, class_name: &str) -> SaveResult<Box<dyn SaveObject>> {
        match self.factories.get(class_name) {
            Some(factory) => Ok(factory()),
            None => Err(SaveError::UnknownClass(class_name.to_string())),
        }
    }
}
