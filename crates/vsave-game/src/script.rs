// script.rs — running script handles
//
// The script VM is outside this crate. A running script is saved as opaque
// state: its number, program counter, locals and the few references it
// holds into the level. Handles only compare by identity.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use vsave_common::error::SaveResult;

use crate::archive::{Archive, Serializable, StructKind};
use crate::object::ObjectId;

static NEXT_SCRIPT_ID: AtomicU32 = AtomicU32::new(1);

pub const MAX_SCRIPT_LOCALS: i32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(u32);

impl ScriptId {
    fn next() -> Self {
        ScriptId(NEXT_SCRIPT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// VM state of one running script.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScriptState {
    pub number: i32,
    pub pc: i32,
    pub state: i32,
    pub delay_tics: i32,
    pub locals: Vec<i32>,
    pub activator: Option<ObjectId>,
    pub line: Option<u32>,
}

impl Serializable for ScriptState {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.int(&mut self.number)?;
        ar.int(&mut self.pc)?;
        ar.int(&mut self.state)?;
        ar.int(&mut self.delay_tics)?;
        let count = ar.count("script local", self.locals.len(), MAX_SCRIPT_LOCALS)?;
        self.locals.resize(count, 0);
        for v in self.locals.iter_mut() {
            ar.int(v)?;
        }
        ar.object(&mut self.activator)?;
        ar.struct_ref(StructKind::Line, &mut self.line)
    }
}

/// Running scripts of one level, in start order.
#[derive(Debug, Default)]
pub struct ScriptArena {
    scripts: BTreeMap<ScriptId, ScriptState>,
}

impl ScriptArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, state: ScriptState) -> ScriptId {
        let id = ScriptId::next();
        self.scripts.insert(id, state);
        id
    }

    pub fn get(&self, id: ScriptId) -> Option<&ScriptState> {
        self.scripts.get(&id)
    }

    pub fn get_mut(&mut self, id: ScriptId) -> Option<&mut ScriptState> {
        self.scripts.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<ScriptId> {
        self.scripts.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
