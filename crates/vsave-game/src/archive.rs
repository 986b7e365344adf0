// archive.rs — typed field I/O shared by saving and loading
//
// Every serializable type describes its fields once, in order, against an
// `Archive`. The same code path writes when saving and reads when loading;
// implementations decide which way the data flows.

use vsave_common::error::SaveResult;

use crate::name::Name;
use crate::object::ObjectId;
use crate::script::ScriptId;

/// The two fixed level arrays a struct reference can point into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructKind {
    Sector,
    Line,
}

impl StructKind {
    pub fn table_name(self) -> &'static str {
        match self {
            StructKind::Sector => "sector",
            StructKind::Line => "line",
        }
    }
}

/// Bidirectional field reader/writer.
pub trait Archive {
    fn is_loading(&self) -> bool;

    fn int(&mut self, v: &mut i32) -> SaveResult<()>;

    fn float(&mut self, v: &mut f32) -> SaveResult<()>;

    /// Interned name, stored as an index into the pass's name table.
    fn name(&mut self, v: &mut Name) -> SaveResult<()>;

    /// Free text; interned into the save's string table when one is attached.
    fn string(&mut self, v: &mut String) -> SaveResult<()>;

    /// Reference to another object in the same level.
    fn object(&mut self, v: &mut Option<ObjectId>) -> SaveResult<()>;

    /// Reference to a running script.
    fn script(&mut self, v: &mut Option<ScriptId>) -> SaveResult<()>;

    /// Index into one of the level's fixed arrays.
    fn struct_ref(&mut self, kind: StructKind, v: &mut Option<u32>) -> SaveResult<()>;

    /// Element count of a variable-length list. Loading rejects negative
    /// counts and counts above `max`.
    fn count(&mut self, what: &'static str, len: usize, max: i32) -> SaveResult<usize>;

    fn vec3(&mut self, v: &mut [f32; 3]) -> SaveResult<()> {
        for c in v.iter_mut() {
            self.float(c)?;
        }
        Ok(())
    }

    fn bool(&mut self, v: &mut bool) -> SaveResult<()> {
        let mut i = *v as i32;
        self.int(&mut i)?;
        *v = i != 0;
        Ok(())
    }
}

/// A type that can describe its fields to an `Archive`.
pub trait Serializable {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()>;
}

/// Serialize a list, resizing it with `T::default()` when loading.
pub fn serialize_vec<T: Serializable + Default>(
    ar: &mut dyn Archive,
    what: &'static str,
    list: &mut Vec<T>,
    max: i32,
) -> SaveResult<()> {
    let count = ar.count(what, list.len(), max)?;
    if ar.is_loading() {
        list.clear();
        list.resize_with(count, T::default);
    }
    for item in list.iter_mut() {
        item.serialize(ar)?;
    }
    Ok(())
}
