// g_content.rs — built-in level object classes
//
// Stand-ins for the content the game defines through its actor scripts:
// a generic map object and a sector mover thinker. Both only describe
// their fields; what the fields mean is the game's business.

use std::any::Any;

use vsave_common::error::SaveResult;

use crate::archive::{Archive, Serializable, StructKind};
use crate::name::Name;
use crate::object::{ClassRegistry, ObjectId, SaveObject};
use crate::script::ScriptId;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MobjFlags: i32 {
        const SOLID     = 0x0001;
        const SHOOTABLE = 0x0002;
        const COUNTKILL = 0x0004;
        const COUNTITEM = 0x0008;
        const CORPSE    = 0x0010;
        const IS_PLAYER = 0x0100;
    }
}

pub const CLASS_MOBJ: &str = "Actor";
pub const CLASS_SECTOR_MOVER: &str = "SectorMover";

// ============================================================
// Mobj
// ============================================================

/// A map object: monster, item, decoration or player body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mobj {
    /// Actor type, e.g. "DoomImp"
    pub kind: Name,
    pub flags: MobjFlags,
    pub origin: [f32; 3],
    pub angle: f32,
    pub health: i32,
    pub tid: i32,
    pub tag: String,
    pub target: Option<ObjectId>,
    pub tracer: Option<ObjectId>,
    pub master: Option<ObjectId>,
    pub sector: Option<u32>,
}

impl Mobj {
    pub fn new(kind: &str, health: i32) -> Self {
        Self {
            kind: Name::new(kind),
            flags: MobjFlags::SOLID | MobjFlags::SHOOTABLE,
            health,
            ..Self::default()
        }
    }

    pub fn player() -> Self {
        Self {
            flags: MobjFlags::SOLID | MobjFlags::SHOOTABLE | MobjFlags::IS_PLAYER,
            ..Self::new("DoomPlayer", 100)
        }
    }
}

impl Serializable for Mobj {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.name(&mut self.kind)?;
        let mut flags = self.flags.bits();
        ar.int(&mut flags)?;
        self.flags = MobjFlags::from_bits_retain(flags);
        ar.vec3(&mut self.origin)?;
        ar.float(&mut self.angle)?;
        ar.int(&mut self.health)?;
        ar.int(&mut self.tid)?;
        ar.string(&mut self.tag)?;
        ar.object(&mut self.target)?;
        ar.object(&mut self.tracer)?;
        ar.object(&mut self.master)?;
        ar.struct_ref(StructKind::Sector, &mut self.sector)
    }
}

impl SaveObject for Mobj {
    fn class_name(&self) -> &'static str {
        CLASS_MOBJ
    }

    fn is_player(&self) -> bool {
        self.flags.contains(MobjFlags::IS_PLAYER)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================
// SectorMover
// ============================================================

/// A floor/ceiling/door mover thinker attached to a sector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectorMover {
    pub sector: Option<u32>,
    pub direction: i32,
    pub speed: f32,
    pub dest_height: f32,
    pub wait_tics: i32,
    pub activator: Option<ObjectId>,
    /// Script to resume when the move finishes
    pub script: Option<ScriptId>,
    pub sound_sequence: Name,
}

impl Serializable for SectorMover {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.struct_ref(StructKind::Sector, &mut self.sector)?;
        ar.int(&mut self.direction)?;
        ar.float(&mut self.speed)?;
        ar.float(&mut self.dest_height)?;
        ar.int(&mut self.wait_tics)?;
        ar.object(&mut self.activator)?;
        ar.script(&mut self.script)?;
        ar.name(&mut self.sound_sequence)
    }
}

impl SaveObject for SectorMover {
    fn class_name(&self) -> &'static str {
        CLASS_SECTOR_MOVER
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Register the built-in classes.
pub fn register_content_classes(registry: &mut ClassRegistry) {
    registry.register(CLASS_MOBJ, || Box::new(Mobj::default()));
    registry.register(CLASS_SECTOR_MOVER, || Box::new(SectorMover::default()));
}

/// A registry holding only the built-in classes.
pub fn content_registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    register_content_classes(&mut registry);
    registry
}
