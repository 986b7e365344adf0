#![allow(clippy::new_without_default, clippy::len_without_is_empty)]

pub mod saved_map;
pub mod checkpoint;
pub mod slot;
pub mod game;
pub mod sv_ccmds;

pub use checkpoint::{Checkpoint, CheckpointValue};
pub use game::{Game, MapLoader, Player};
pub use saved_map::SavedMap;
pub use slot::{SaveSlot, SlotInfo};
