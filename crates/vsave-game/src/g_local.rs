// g_local.rs — level state walked by the map serializer

use vsave_common::error::SaveResult;

use crate::archive::{Archive, Serializable};
use crate::name::Name;
use crate::object::{ObjectArena, ObjectId};
use crate::script::ScriptArena;

/// Plain per-level bookkeeping stored in the map header segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelInfo {
    pub map_name: Name,
    pub level_time: i32,
    pub tic: i32,
    pub gravity: f32,
    pub killed_monsters: i32,
    pub total_monsters: i32,
    pub found_items: i32,
    pub total_items: i32,
    pub found_secrets: i32,
    pub total_secrets: i32,
}

impl Serializable for LevelInfo {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.name(&mut self.map_name)?;
        ar.int(&mut self.level_time)?;
        ar.int(&mut self.tic)?;
        ar.float(&mut self.gravity)?;
        ar.int(&mut self.killed_monsters)?;
        ar.int(&mut self.total_monsters)?;
        ar.int(&mut self.found_items)?;
        ar.int(&mut self.total_items)?;
        ar.int(&mut self.found_secrets)?;
        ar.int(&mut self.total_secrets)
    }
}

/// World metadata holding references into the object graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelLocals {
    pub sight_entity: Option<ObjectId>,
    pub sound_target: Option<ObjectId>,
    pub body_queue: Vec<Option<ObjectId>>,
}

pub const BODY_QUEUE_SIZE: i32 = 32;

impl Serializable for LevelLocals {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.object(&mut self.sight_entity)?;
        ar.object(&mut self.sound_target)?;
        let count = ar.count("body queue", self.body_queue.len(), BODY_QUEUE_SIZE)?;
        self.body_queue.resize(count, None);
        for body in self.body_queue.iter_mut() {
            ar.object(body)?;
        }
        Ok(())
    }
}

/// Mutable state of one sector. The array itself comes from the map loader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectorState {
    pub floor_height: f32,
    pub ceiling_height: f32,
    pub light_level: i32,
    pub special: i32,
    pub sound_target: Option<ObjectId>,
}

impl Serializable for SectorState {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.float(&mut self.floor_height)?;
        ar.float(&mut self.ceiling_height)?;
        ar.int(&mut self.light_level)?;
        ar.int(&mut self.special)?;
        ar.object(&mut self.sound_target)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineState {
    pub flags: i32,
    pub special: i32,
    pub activated: bool,
}

impl Serializable for LineState {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.int(&mut self.flags)?;
        ar.int(&mut self.special)?;
        ar.bool(&mut self.activated)
    }
}

/// An active sound sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SoundSeq {
    pub sequence: Name,
    pub source: Option<ObjectId>,
    pub position: i32,
    pub volume: f32,
}

impl Serializable for SoundSeq {
    fn serialize(&mut self, ar: &mut dyn Archive) -> SaveResult<()> {
        ar.name(&mut self.sequence)?;
        ar.object(&mut self.source)?;
        ar.int(&mut self.position)?;
        ar.float(&mut self.volume)
    }
}

/// Everything that makes up one loaded map.
#[derive(Default)]
pub struct Level {
    pub info: LevelInfo,
    pub locals: LevelLocals,
    pub objects: ObjectArena,
    pub scripts: ScriptArena,
    pub sectors: Vec<SectorState>,
    pub lines: Vec<LineState>,
    pub sounds: Vec<SoundSeq>,
}

impl Level {
    /// An empty level with the geometry arrays sized by the map loader.
    pub fn new(map_name: &str, num_sectors: usize, num_lines: usize) -> Self {
        Self {
            info: LevelInfo {
                map_name: Name::new(map_name),
                gravity: 800.0,
                ..LevelInfo::default()
            },
            sectors: vec![SectorState::default(); num_sectors],
            lines: vec![LineState::default(); num_lines],
            ..Level::default()
        }
    }

    pub fn map_name(&self) -> &Name {
        &self.info.map_name
    }
}
