// checkpoint.rs — lightweight "continue" save of per-player state
//
// Section layout:
//   ready_weapon   long (0 = none, else 1-based into the entity list)
//   entity count   long, then one class name string per entity
//   value count    long, then { name string, type byte, payload }
//
// The skill level travels as a value under a name no game value can have.

use vsave_common::error::{check_count, SaveError, SaveResult};
use vsave_common::sizebuf::{SectionReader, SectionWriter};
use vsave_game::Name;

use crate::game::Player;

/// Reserved value name carrying the skill level. The leading control
/// character keeps it out of the identifier space.
pub const SKILL_SENTINEL: &str = "\u{1}skill";

pub const MAX_CHECKPOINT_ENTITIES: i32 = 1024;
/// Includes the skill sentinel.
pub const MAX_CHECKPOINT_VALUES: i32 = 4096;

const VALUE_INT: u8 = 0;
const VALUE_FLOAT: u8 = 1;
const VALUE_STRING: u8 = 2;

#[derive(Clone, Debug, PartialEq)]
pub enum CheckpointValue {
    Int(i32),
    Float(f32),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: CheckpointValue,
}

impl NamedValue {
    pub fn new(name: &str, value: CheckpointValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Placeholder for an entity respawned on load and matched by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRef {
    pub class: Name,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    ready_weapon: i32,
    entity_refs: Vec<EntityRef>,
    values: Vec<NamedValue>,
    skill: i32,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkpoint {
    pub fn new() -> Self {
        Self {
            ready_weapon: 0,
            entity_refs: Vec::new(),
            values: Vec::new(),
            skill: -1,
        }
    }

    /// Append an entity placeholder and return its 1-based index.
    pub fn push_entity(&mut self, class: &str) -> SaveResult<i32> {
        let index = self.entity_refs.len() as i32 + 1;
        if index > MAX_CHECKPOINT_ENTITIES {
            return Err(SaveError::BadCount {
                what: "checkpoint entity",
                count: index,
            });
        }
        self.entity_refs.push(EntityRef { class: Name::new(class) });
        Ok(index)
    }

    pub fn set_ready_weapon(&mut self, index: i32) -> SaveResult<()> {
        if index < 0 || index as usize > self.entity_refs.len() {
            return Err(SaveError::BadIndex {
                table: "checkpoint entity",
                index,
            });
        }
        self.ready_weapon = index;
        Ok(())
    }

    /// Add a value. The skill sentinel is diverted into `skill()` and must
    /// hold an integer.
    pub fn push_value(&mut self, name: &str, value: CheckpointValue) -> SaveResult<()> {
        if name == SKILL_SENTINEL {
            return match value {
                CheckpointValue::Int(skill) => {
                    self.skill = skill;
                    Ok(())
                }
                other => Err(SaveError::Corrupt(format!("skill stored as {:?}", other))),
            };
        }
        // One slot stays free for the sentinel
        let count = self.values.len() as i32 + 1;
        if count >= MAX_CHECKPOINT_VALUES {
            return Err(SaveError::BadCount {
                what: "checkpoint value",
                count,
            });
        }
        self.values.push(NamedValue::new(name, value));
        Ok(())
    }

    /// Skill level, or -1 if none was recorded.
    pub fn skill(&self) -> i32 {
        self.skill
    }

    pub fn ready_weapon(&self) -> i32 {
        self.ready_weapon
    }

    pub fn entity_refs(&self) -> &[EntityRef] {
        &self.entity_refs
    }

    pub fn values(&self) -> &[NamedValue] {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&CheckpointValue> {
        self.values.iter().find(|v| v.name == name).map(|v| &v.value)
    }

    // ============================================================
    // Live player state
    // ============================================================

    /// Record a player's inventory and values. Fails on state that could
    /// not be read back: a ready weapon outside the inventory or lists over
    /// the checkpoint limits.
    pub fn capture(player: &Player, skill: i32) -> SaveResult<Self> {
        let mut cp = Checkpoint::new();
        for item in &player.inventory {
            cp.push_entity(item.as_str())?;
        }
        let ready = match player.ready_weapon {
            None => 0,
            Some(i) => i32::try_from(i).map_or(i32::MAX, |i| i.saturating_add(1)),
        };
        cp.set_ready_weapon(ready)?;
        for v in &player.values {
            cp.push_value(&v.name, v.value.clone())?;
        }
        cp.skill = skill;
        Ok(cp)
    }

    /// Give the recorded state back to a player.
    pub fn apply(&self, player: &mut Player) {
        player.inventory = self.entity_refs.iter().map(|e| e.class.clone()).collect();
        player.ready_weapon = match self.ready_weapon {
            0 => None,
            i => Some(i as usize - 1),
        };
        player.values = self.values.clone();
    }

    // ============================================================
    // Section I/O
    // ============================================================

    pub fn write(&self, w: &mut SectionWriter) {
        w.write_long(self.ready_weapon);
        w.write_long(self.entity_refs.len() as i32);
        for e in &self.entity_refs {
            w.write_string(e.class.as_str());
        }

        let has_skill = self.skill >= 0;
        w.write_long(self.values.len() as i32 + has_skill as i32);
        for v in &self.values {
            write_value(w, &v.name, &v.value);
        }
        if has_skill {
            write_value(w, SKILL_SENTINEL, &CheckpointValue::Int(self.skill));
        }
    }

    pub fn read(r: &mut SectionReader) -> SaveResult<Self> {
        let mut cp = Checkpoint::new();
        let ready_weapon = r.read_long()?;

        let count = check_count("checkpoint entity", r.read_long()?, MAX_CHECKPOINT_ENTITIES)?;
        for _ in 0..count {
            let class = r.read_string()?;
            cp.push_entity(&class)?;
        }
        cp.set_ready_weapon(ready_weapon)?;

        let count = check_count("checkpoint value", r.read_long()?, MAX_CHECKPOINT_VALUES)?;
        for _ in 0..count {
            let name = r.read_string()?;
            let value = match r.read_byte()? {
                VALUE_INT => CheckpointValue::Int(r.read_long()?),
                VALUE_FLOAT => CheckpointValue::Float(r.read_float()?),
                VALUE_STRING => CheckpointValue::Str(r.read_string()?),
                t => return Err(SaveError::Corrupt(format!("bad checkpoint value type {}", t))),
            };
            cp.push_value(&name, value)?;
        }
        Ok(cp)
    }
}

fn write_value(w: &mut SectionWriter, name: &str, value: &CheckpointValue) {
    w.write_string(name);
    match value {
        CheckpointValue::Int(i) => {
            w.write_byte(VALUE_INT);
            w.write_long(*i);
        }
        CheckpointValue::Float(f) => {
            w.write_byte(VALUE_FLOAT);
            w.write_float(*f);
        }
        CheckpointValue::Str(s) => {
            w.write_byte(VALUE_STRING);
            w.write_string(s);
        }
    }
}
