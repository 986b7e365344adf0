#![allow(clippy::new_without_default, clippy::len_without_is_empty)]

pub mod name;
pub mod archive;
pub mod object;
pub mod script;
pub mod codec;
pub mod g_local;
pub mod g_content;
pub mod g_save;

pub use archive::{Archive, Serializable, StructKind};
pub use g_local::Level;
pub use name::Name;
pub use object::{ClassRegistry, ObjectArena, ObjectId, SaveObject};
