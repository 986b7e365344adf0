// saved_map.rs — one visited level's state inside a save slot

use std::sync::Arc;

use vsave_common::error::{SaveError, SaveResult};
use vsave_common::package::PackageStream;
use vsave_common::savefiles::map_section_name;
use vsave_common::strings::{StringInterner, StringTable};
use vsave_game::g_save::{read_level, rebase_strings, write_level, LoadContext, SaveContext};
use vsave_game::object::skip_players;
use vsave_game::{ClassRegistry, Level, Name, ObjectId};

/// A serialized level. The payload is produced when the level is left or
/// saved and kept until the slot is cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedMap {
    pub name: Name,
    pub payload: Vec<u8>,
    /// Table the payload's interned strings index into; `None` for inline
    /// strings. Each archive pass builds its own.
    pub strings: Option<Arc<StringTable>>,
}

impl SavedMap {
    /// Serialize `level` under its own map name. Player bodies are left out
    /// and referenced by slot.
    pub fn archive(level: &mut Level, players: &[Option<ObjectId>], intern_strings: bool) -> SaveResult<Self> {
        let name = level.map_name().clone();
        let mut interner = intern_strings.then(StringInterner::new);
        let ctx = SaveContext {
            strings: interner.as_mut(),
            players,
            skip: &skip_players,
        };
        let payload = write_level(level, ctx)?;
        Ok(Self {
            name,
            payload,
            strings: interner.map(|s| Arc::new(s.into_table())),
        })
    }

    /// Rebuild this map into `level`, which must be freshly loaded.
    pub fn unarchive(&self, level: &mut Level, players: &[Option<ObjectId>], registry: &ClassRegistry) -> SaveResult<()> {
        if level.map_name() != &self.name {
            return Err(SaveError::Corrupt(format!(
                "saved map {} restored into {}",
                self.name,
                level.map_name()
            )));
        }
        let ctx = LoadContext {
            strings: self.strings.as_deref(),
            players,
            registry,
        };
        read_level(self.payload.clone(), level, ctx)
    }

    /// Payload as it goes into a package: interned strings are moved onto
    /// the save's table `strings`.
    pub fn packed_payload(&self, strings: Option<&mut StringInterner>) -> SaveResult<Vec<u8>> {
        match (&self.strings, strings) {
            (None, _) => Ok(self.payload.clone()),
            (Some(table), Some(into)) => rebase_strings(self.payload.clone(), table, into),
            (Some(_), None) => Err(SaveError::InvalidState("interned map written without a string table")),
        }
    }

    /// Store `payload` as entry `map_NNN` of the package.
    pub fn write(pkg: &mut dyn PackageStream, index: usize, payload: &[u8]) -> SaveResult<()> {
        let mut w = pkg.create_section(&map_section_name(index), true)?;
        w.write(payload);
        pkg.close_section(w)
    }

    /// Read entry `map_NNN`, which the map list says holds `name`. String
    /// fields index into `strings`, the save's table, when it has one.
    pub fn read(
        pkg: &mut dyn PackageStream,
        index: usize,
        name: Name,
        strings: Option<&Arc<StringTable>>,
    ) -> SaveResult<Self> {
        let section = pkg.open_section(&map_section_name(index)).map_err(|e| match e {
            SaveError::NotFound(entry) => SaveError::Corrupt(format!("map list names {} but {} is missing", name, entry)),
            other => other,
        })?;
        Ok(Self {
            name,
            payload: section.into_data(),
            strings: strings.cloned(),
        })
    }
}
