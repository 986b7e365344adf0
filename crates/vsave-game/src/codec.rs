// codec.rs — object graph codec: reference tables and the two archive ends
//
// Pointers between level objects become integer indices. Three reference
// spaces are kept apart: objects, names and script handles. Index 0 is
// always "none". Negative object indices name player slots, resolved by
// position on load instead of through the table.

use std::collections::HashMap;
use std::hash::Hash;

use vsave_common::common::com_dprintf;
use vsave_common::error::{check_count, SaveError, SaveResult};
use vsave_common::savefiles::MAX_SAVE_NAMES;
use vsave_common::sizebuf::{SectionReader, SectionWriter};
use vsave_common::strings::{StringInterner, StringTable};

use crate::archive::{Archive, StructKind};
use crate::name::Name;
use crate::object::{ObjectId, SaveObject, SkipPredicate};
use crate::script::ScriptId;

/// Number of player slots addressable by negative object references.
pub const MAXPLAYERS: usize = 8;

// ============================================================
// Generic reference tables
// ============================================================

/// Write side: assigns 1-based slots in registration order.
#[derive(Debug)]
pub struct RefExporter<K> {
    order: Vec<K>,
    slots: HashMap<K, i32>,
}

impl<K: Clone + Eq + Hash> Default for RefExporter<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            slots: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> RefExporter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of `key`, allocating the next one on first sight.
    pub fn register(&mut self, key: K) -> i32 {
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        self.order.push(key.clone());
        let slot = self.order.len() as i32;
        self.slots.insert(key, slot);
        slot
    }

    pub fn index_of(&self, key: &K) -> Option<i32> {
        self.slots.get(key).copied()
    }

    /// Registered keys; slot `i` is `keys()[i - 1]`.
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Read side: resolves 1-based slots, failing on anything out of range.
#[derive(Debug)]
pub struct RefImporter<V> {
    table: &'static str,
    entries: Vec<V>,
}

impl<V: Clone> RefImporter<V> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, v: V) {
        self.entries.push(v);
    }

    pub fn resolve(&self, index: i32) -> SaveResult<V> {
        if index < 1 {
            return Err(SaveError::BadIndex { table: self.table, index });
        }
        self.entries
            .get(index as usize - 1)
            .cloned()
            .ok_or(SaveError::BadIndex { table: self.table, index })
    }

    pub fn entries(&self) -> &[V] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================
// Object references
// ============================================================

/// Write-side object table with player slot singletons.
pub struct ObjectExporter {
    table: RefExporter<ObjectId>,
    players: Vec<Option<ObjectId>>,
}

impl ObjectExporter {
    pub fn new(players: &[Option<ObjectId>]) -> Self {
        Self {
            table: RefExporter::new(),
            players: players.iter().take(MAXPLAYERS).copied().collect(),
        }
    }

    /// Register `obj` unless `skip` excludes it. Idempotent.
    pub fn register(&mut self, id: ObjectId, obj: &dyn SaveObject, skip: &SkipPredicate) -> Option<i32> {
        if let Some(slot) = self.table.index_of(&id) {
            return Some(slot);
        }
        if skip(obj) {
            return None;
        }
        Some(self.table.register(id))
    }

    /// Encode a reference: 0 for none, `-(slot + 1)` for a player, else the
    /// table slot. Unregistered objects degrade to 0.
    pub fn reference(&self, v: Option<ObjectId>) -> i32 {
        let Some(id) = v else {
            return 0;
        };
        if let Some(slot) = self.players.iter().position(|p| *p == Some(id)) {
            return -(slot as i32 + 1);
        }
        match self.table.index_of(&id) {
            Some(slot) => slot,
            None => {
                com_dprintf(&format!("reference to unsaved object {:?} written as null\n", id));
                0
            }
        }
    }

    pub fn ids(&self) -> &[ObjectId] {
        self.table.keys()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Read-side object table.
pub struct ObjectImporter {
    table: RefImporter<ObjectId>,
    players: Vec<Option<ObjectId>>,
}

impl ObjectImporter {
    pub fn new(players: &[Option<ObjectId>]) -> Self {
        Self {
            table: RefImporter::new("object"),
            players: players.iter().take(MAXPLAYERS).copied().collect(),
        }
    }

    pub fn push(&mut self, id: ObjectId) {
        self.table.push(id);
    }

    pub fn ids(&self) -> &[ObjectId] {
        self.table.entries()
    }

    pub fn resolve(&self, index: i32) -> SaveResult<Option<ObjectId>> {
        if index == 0 {
            return Ok(None);
        }
        if index < 0 {
            let slot = (-(index as i64) - 1) as usize;
            if slot >= MAXPLAYERS {
                return Err(SaveError::BadIndex { table: "player", index });
            }
            let player = self.players.get(slot).copied().flatten();
            if player.is_none() {
                com_dprintf(&format!("player slot {} is empty, reference cleared\n", slot));
            }
            return Ok(player);
        }
        self.table.resolve(index).map(Some)
    }
}

// ============================================================
// SaveWriter
// ============================================================

/// Archive end that writes one map payload.
pub struct SaveWriter<'a> {
    out: SectionWriter,
    strings: Option<&'a mut StringInterner>,
    /// Offsets of interned string indices in `out`
    string_refs: Vec<usize>,
    pub objects: ObjectExporter,
    pub names: RefExporter<Name>,
    pub scripts: RefExporter<ScriptId>,
}

impl<'a> SaveWriter<'a> {
    pub fn new(out: SectionWriter, strings: Option<&'a mut StringInterner>, players: &[Option<ObjectId>]) -> Self {
        Self {
            out,
            strings,
            string_refs: Vec::new(),
            objects: ObjectExporter::new(players),
            names: RefExporter::new(),
            scripts: RefExporter::new(),
        }
    }

    pub fn strings_interned(&self) -> bool {
        self.strings.is_some()
    }

    pub fn out(&mut self) -> &mut SectionWriter {
        &mut self.out
    }

    pub fn segment(&mut self, tag: i32) {
        self.out.write_long(tag);
    }

    /// Append the name table and return its offset.
    pub fn write_name_table(&mut self) -> usize {
        let pos = self.out.tell();
        self.out.write_long(self.names.len() as i32);
        for name in self.names.keys() {
            self.out.write_string(name.as_str());
        }
        pos
    }

    /// Append where every interned string index sits, so the payload can be
    /// moved onto another string table without decoding it.
    pub fn write_string_refs(&mut self) {
        self.out.write_long(self.string_refs.len() as i32);
        for &pos in &self.string_refs {
            self.out.write_long(pos as i32);
        }
    }

    pub fn into_section(self) -> SectionWriter {
        self.out
    }
}

impl Archive for SaveWriter<'_> {
    fn is_loading(&self) -> bool {
        false
    }

    fn int(&mut self, v: &mut i32) -> SaveResult<()> {
        self.out.write_long(*v);
        Ok(())
    }

    fn float(&mut self, v: &mut f32) -> SaveResult<()> {
        self.out.write_float(*v);
        Ok(())
    }

    fn name(&mut self, v: &mut Name) -> SaveResult<()> {
        let idx = if v.is_none() { 0 } else { self.names.register(v.clone()) };
        self.out.write_long(idx);
        Ok(())
    }

    fn string(&mut self, v: &mut String) -> SaveResult<()> {
        match self.strings {
            Some(ref mut interner) => {
                let idx = interner.intern(v);
                self.string_refs.push(self.out.tell());
                self.out.write_long(idx);
            }
            None => self.out.write_string(v),
        }
        Ok(())
    }

    fn object(&mut self, v: &mut Option<ObjectId>) -> SaveResult<()> {
        let idx = self.objects.reference(*v);
        self.out.write_long(idx);
        Ok(())
    }

    fn script(&mut self, v: &mut Option<ScriptId>) -> SaveResult<()> {
        let idx = match *v {
            None => 0,
            Some(id) => self.scripts.index_of(&id).unwrap_or_else(|| {
                com_dprintf(&format!("reference to unsaved script {:?} written as null\n", id));
                0
            }),
        };
        self.out.write_long(idx);
        Ok(())
    }

    fn struct_ref(&mut self, _kind: StructKind, v: &mut Option<u32>) -> SaveResult<()> {
        self.out.write_long(v.map_or(0, |i| i as i32 + 1));
        Ok(())
    }

    fn count(&mut self, _what: &'static str, len: usize, _max: i32) -> SaveResult<usize> {
        self.out.write_long(len as i32);
        Ok(len)
    }
}

// ============================================================
// SaveReader
// ============================================================

/// Archive end that reads one map payload.
pub struct SaveReader<'a> {
    input: SectionReader,
    strings: Option<&'a StringTable>,
    pub objects: ObjectImporter,
    pub names: RefImporter<Name>,
    pub scripts: RefImporter<ScriptId>,
    num_sectors: u32,
    num_lines: u32,
}

impl<'a> SaveReader<'a> {
    pub fn new(input: SectionReader, players: &[Option<ObjectId>]) -> Self {
        Self {
            input,
            strings: None,
            objects: ObjectImporter::new(players),
            names: RefImporter::new("name"),
            scripts: RefImporter::new("script"),
            num_sectors: 0,
            num_lines: 0,
        }
    }

    /// String fields are table indices from here on.
    pub fn set_string_table(&mut self, table: &'a StringTable) {
        self.strings = Some(table);
    }

    /// Bounds for struct references.
    pub fn set_geometry(&mut self, num_sectors: usize, num_lines: usize) {
        self.num_sectors = num_sectors as u32;
        self.num_lines = num_lines as u32;
    }

    pub fn input(&mut self) -> &mut SectionReader {
        &mut self.input
    }

    pub fn expect_segment(&mut self, tag: i32) -> SaveResult<()> {
        let found = self.input.read_long()?;
        if found != tag {
            return Err(SaveError::Segment { expected: tag, found });
        }
        Ok(())
    }

    /// Load the name table stored at `offset` without moving the read position.
    pub fn read_name_table(&mut self, offset: i32) -> SaveResult<()> {
        let resume = self.input.tell();
        if offset < 0 || offset as usize > self.input.len() {
            return Err(SaveError::Corrupt(format!("name table offset {} out of range", offset)));
        }
        self.input.seek(offset as usize)?;
        let count = check_count("name", self.input.read_long()?, MAX_SAVE_NAMES)?;
        for _ in 0..count {
            let text = self.input.read_string()?;
            self.names.push(Name::new(&text));
        }
        self.input.seek(resume)
    }
}

impl Archive for SaveReader<'_> {
    fn is_loading(&self) -> bool {
        true
    }

    fn int(&mut self, v: &mut i32) -> SaveResult<()> {
        *v = self.input.read_long()?;
        Ok(())
    }

    fn float(&mut self, v: &mut f32) -> SaveResult<()> {
        *v = self.input.read_float()?;
        Ok(())
    }

    fn name(&mut self, v: &mut Name) -> SaveResult<()> {
        let idx = self.input.read_long()?;
        *v = if idx == 0 { Name::none() } else { self.names.resolve(idx)? };
        Ok(())
    }

    fn string(&mut self, v: &mut String) -> SaveResult<()> {
        *v = match self.strings {
            Some(table) => {
                let idx = self.input.read_long()?;
                table.resolve(idx)?.to_string()
            }
            None => self.input.read_string()?,
        };
        Ok(())
    }

    fn object(&mut self, v: &mut Option<ObjectId>) -> SaveResult<()> {
        let idx = self.input.read_long()?;
        *v = self.objects.resolve(idx)?;
        Ok(())
    }

    fn script(&mut self, v: &mut Option<ScriptId>) -> SaveResult<()> {
        let idx = self.input.read_long()?;
        *v = if idx == 0 { None } else { Some(self.scripts.resolve(idx)?) };
        Ok(())
    }

    fn struct_ref(&mut self, kind: StructKind, v: &mut Option<u32>) -> SaveResult<()> {
        let idx = self.input.read_long()?;
        let limit = match kind {
            StructKind::Sector => self.num_sectors,
            StructKind::Line => self.num_lines,
        };
        *v = match idx {
            0 => None,
            i if i > 0 && (i as u32) <= limit => Some(i as u32 - 1),
            _ => {
                return Err(SaveError::BadIndex {
                    table: kind.table_name(),
                    index: idx,
                })
            }
        };
        Ok(())
    }

    fn count(&mut self, what: &'static str, _len: usize, max: i32) -> SaveResult<usize> {
        check_count(what, self.input.read_long()?, max)
    }
}
