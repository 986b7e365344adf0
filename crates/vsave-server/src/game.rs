// game.rs — the live game the save subsystem snapshots
//
// A `Game` owns the running level, the players and the hub slot: the
// in-memory SaveSlot collecting every map left during this session. Saving
// to disk clones the hub and adds the current level; loading builds a new
// level off to the side and swaps it in only once everything decoded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use vsave_common::common::{com_dprintf, com_printf};
use vsave_common::cvar::SaveConfig;
use vsave_common::error::{SaveError, SaveResult};
use vsave_common::manifest::ContentManifest;
use vsave_game::codec::MAXPLAYERS;
use vsave_game::g_content::Mobj;
use vsave_game::{ClassRegistry, Level, Name, ObjectId, SaveObject};

use crate::checkpoint::{Checkpoint, NamedValue};
use crate::saved_map::SavedMap;
use crate::slot::{slot_path, SaveSlot};

pub const QUICKSAVE_SLOT: &str = "quicksave";

// ============================================================
// Players
// ============================================================

/// Per-player state that outlives levels.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub slot: usize,
    /// The player's body in the current level
    pub mobj: Option<ObjectId>,
    pub inventory: Vec<Name>,
    /// Index into `inventory`
    pub ready_weapon: Option<usize>,
    pub values: Vec<NamedValue>,
}

impl Player {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            mobj: None,
            inventory: Vec::new(),
            ready_weapon: None,
            values: Vec::new(),
        }
    }
}

/// Player bodies by slot, as the level codec references them.
fn player_slots(players: &[Player]) -> Vec<Option<ObjectId>> {
    let mut slots = vec![None; MAXPLAYERS];
    for p in players {
        if let Some(s) = slots.get_mut(p.slot) {
            *s = p.mobj;
        }
    }
    slots
}

fn spawn_pawns(level: &mut Level, players: &mut [Player]) {
    for p in players.iter_mut() {
        p.mobj = Some(level.objects.spawn(Box::new(Mobj::player())));
    }
}

fn take_pawns(level: &mut Level, players: &[Player]) -> Vec<(ObjectId, Box<dyn SaveObject>)> {
    players
        .iter()
        .filter_map(|p| p.mobj)
        .filter_map(|id| level.objects.take(id).map(|obj| (id, obj)))
        .collect()
}

fn adopt_pawns(level: &mut Level, pawns: Vec<(ObjectId, Box<dyn SaveObject>)>) {
    for (id, obj) in pawns {
        level.objects.adopt(id, obj);
    }
}

// ============================================================
// Map loading
// ============================================================

/// Source of level geometry and initial map contents.
pub trait MapLoader {
    /// Geometry only; saved state is restored on top of it.
    fn load_geometry(&self, map: &Name) -> SaveResult<Level>;

    /// Geometry plus the map's initial things, for a first visit.
    fn spawn_map(&self, map: &Name) -> SaveResult<Level>;
}

/// Static description of one map for `MapTable`.
#[derive(Clone, Debug, Default)]
pub struct MapDef {
    pub num_sectors: usize,
    pub num_lines: usize,
    /// (actor kind, health) spawned on a first visit
    pub things: Vec<(String, i32)>,
}

/// In-memory map set.
#[derive(Clone, Debug, Default)]
pub struct MapTable {
    maps: HashMap<String, MapDef>,
}

impl MapTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, def: MapDef) {
        self.maps.insert(name.to_string(), def);
    }

    fn def(&self, map: &Name) -> SaveResult<&MapDef> {
        self.maps
            .get(map.as_str())
            .ok_or_else(|| SaveError::NotFound(format!("map {}", map)))
    }
}

impl MapLoader for MapTable {
    fn load_geometry(&self, map: &Name) -> SaveResult<Level> {
        let def = self.def(map)?;
        Ok(Level::new(map.as_str(), def.num_sectors, def.num_lines))
    }

    fn spawn_map(&self, map: &Name) -> SaveResult<Level> {
        let mut level = self.load_geometry(map)?;
        for (kind, health) in &self.def(map)?.things {
            level.objects.spawn(Box::new(Mobj::new(kind, *health)));
        }
        Ok(level)
    }
}

// ============================================================
// Game
// ============================================================

pub struct Game {
    pub players: Vec<Player>,
    pub skill: i32,
    pub level: Level,
    hub: SaveSlot,
    registry: ClassRegistry,
    pub manifest: ContentManifest,
    pub config: SaveConfig,
    loader: Box<dyn MapLoader>,
}

impl Game {
    /// Start a one-player game on `start_map`.
    pub fn new(
        loader: Box<dyn MapLoader>,
        registry: ClassRegistry,
        manifest: ContentManifest,
        config: SaveConfig,
        start_map: &str,
    ) -> SaveResult<Self> {
        let mut level = loader.spawn_map(&Name::new(start_map))?;
        let mut players = vec![Player::new(0)];
        spawn_pawns(&mut level, &mut players);
        let mut hub = SaveSlot::new(config.intern_strings);
        hub.current_map = level.map_name().clone();
        Ok(Self {
            players,
            skill: 2,
            level,
            hub,
            registry,
            manifest,
            config,
            loader,
        })
    }

    /// Join another player into the current level. Returns its slot.
    pub fn add_player(&mut self) -> SaveResult<usize> {
        let slot = self.players.len();
        if slot >= MAXPLAYERS {
            return Err(SaveError::InvalidState("no free player slot"));
        }
        let mut player = Player::new(slot);
        player.mobj = Some(self.level.objects.spawn(Box::new(Mobj::player())));
        self.players.push(player);
        Ok(slot)
    }

    /// Maps left during this session.
    pub fn hub(&self) -> &SaveSlot {
        &self.hub
    }

    pub fn player_slots(&self) -> Vec<Option<ObjectId>> {
        player_slots(&self.players)
    }

    /// Health of a player's body, if it has one in this level.
    pub fn player_health(&self, slot: usize) -> Option<i32> {
        let id = self.players.get(slot)?.mobj?;
        self.level.objects.get_as::<Mobj>(id).map(|m| m.health)
    }

    pub fn slot_path(&self, name: &str) -> PathBuf {
        slot_path(Path::new(&self.config.save_dir), name)
    }

    // ============================================================
    // Hub travel
    // ============================================================

    /// Leave the current level for `map`. The level left is archived into
    /// the hub; a map visited before is restored from it, a new one spawns
    /// fresh. Player bodies move along with their ids intact.
    pub fn travel(&mut self, map: &str) -> SaveResult<()> {
        let dest = Name::new(map);
        com_dprintf(&format!("travel {} -> {}\n", self.level.map_name(), dest));

        let slots = self.player_slots();
        let left = SavedMap::archive(&mut self.level, &slots, self.hub.interns_strings())?;
        self.hub.store_map(left);

        let revisit = self.hub.find_map(&dest).is_some();
        let mut next = if revisit {
            self.loader.load_geometry(&dest)?
        } else {
            self.loader.spawn_map(&dest)?
        };
        adopt_pawns(&mut next, take_pawns(&mut self.level, &self.players));

        if let Some(saved) = self.hub.find_map(&dest) {
            if let Err(e) = saved.unarchive(&mut next, &slots, &self.registry) {
                adopt_pawns(&mut self.level, take_pawns(&mut next, &self.players));
                return Err(e);
            }
        }

        self.hub.current_map = dest;
        self.level = next;
        Ok(())
    }

    // ============================================================
    // Save
    // ============================================================

    fn player_checkpoint(&self) -> SaveResult<Option<Checkpoint>> {
        self.players
            .first()
            .map(|p| Checkpoint::capture(p, self.skill))
            .transpose()
    }

    /// Write the hub plus the current level to slot `name`.
    pub fn save_game(&mut self, name: &str, description: &str) -> SaveResult<()> {
        let checkpoint = self.player_checkpoint()?;
        let mut slot = self.hub.clone();
        let slots = self.player_slots();
        let current = SavedMap::archive(&mut self.level, &slots, slot.interns_strings())?;
        slot.store_map(current);
        slot.description = description.to_string();
        slot.current_map = self.level.map_name().clone();
        slot.saved_skill = self.skill;
        slot.checkpoint = checkpoint;
        slot.manifest = Some(self.manifest.clone());
        slot.save_to_slot(&self.slot_path(name), self.config.compression_level)
    }

    /// Write only the players' state; the level restarts on load.
    pub fn save_checkpoint(&mut self, name: &str, description: &str) -> SaveResult<()> {
        let mut slot = SaveSlot::new(false);
        slot.description = description.to_string();
        slot.current_map = self.level.map_name().clone();
        slot.saved_skill = self.skill;
        slot.checkpoint = self.player_checkpoint()?;
        slot.manifest = Some(self.manifest.clone());
        slot.save_to_slot(&self.slot_path(name), self.config.compression_level)
    }

    pub fn quicksave(&mut self) -> SaveResult<()> {
        if self.config.checkpoints {
            self.save_checkpoint(QUICKSAVE_SLOT, "Quicksave")
        } else {
            self.save_game(QUICKSAVE_SLOT, "Quicksave")
        }
    }

    // ============================================================
    // Load
    // ============================================================

    /// Replace the running game with slot `name`. On any error the running
    /// game is left as it was.
    pub fn load_game(&mut self, name: &str) -> SaveResult<()> {
        let path = self.slot_path(name);
        if !path.exists() {
            return Err(SaveError::NoSuchSlot(name.to_string()));
        }
        let mut slot = SaveSlot::load_slot(&path)?;

        match slot.manifest {
            Some(ref saved) => {
                if !self.manifest.check_saved(saved)? {
                    com_printf("Loading anyway; the game may not behave as saved.\n");
                }
            }
            None => com_dprintf(&format!("{} has no content manifest\n", name)),
        }

        let mut players: Vec<Player> = self.players.iter().map(|p| Player::new(p.slot)).collect();
        let current = slot.current_map.clone();
        let level = match slot.find_map(&current) {
            Some(saved) => {
                let mut level = self.loader.load_geometry(&current)?;
                spawn_pawns(&mut level, &mut players);
                saved.unarchive(&mut level, &player_slots(&players), &self.registry)?;
                level
            }
            None if slot.checkpoint.is_some() => {
                let mut level = self.loader.spawn_map(&current)?;
                spawn_pawns(&mut level, &mut players);
                level
            }
            None => {
                return Err(SaveError::Corrupt(format!(
                    "save holds no state for its current map {}",
                    current
                )))
            }
        };

        let mut skill = slot.saved_skill;
        if let Some(ref cp) = slot.checkpoint {
            if let Some(p) = players.first_mut() {
                cp.apply(p);
            }
            if skill < 0 {
                skill = cp.skill();
            }
        }

        // Everything decoded: the loaded slot becomes the new hub
        slot.description.clear();
        slot.checkpoint = None;
        slot.manifest = None;
        if self.config.intern_strings {
            slot.enable_string_interning();
        }
        self.hub = slot;
        self.level = level;
        self.players = players;
        if skill >= 0 {
            self.skill = skill;
        }
        Ok(())
    }

    pub fn quickload(&mut self) -> SaveResult<()> {
        self.load_game(QUICKSAVE_SLOT)
    }
}
