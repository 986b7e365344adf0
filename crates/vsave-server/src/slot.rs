// slot.rs — SaveSlot: everything one user-visible save holds
//
// Package entries, in write order:
//   header       format version, flags, map count
//   description  current_map  maps (ordered map names)
//   map_NNN ...  one per entry of `maps`
//   skill  timestamp  manifest  [checkpoint]
//   strings      (written by the container on close, Package only)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use vsave_common::common::{com_dprintf, com_printf};
use vsave_common::error::{check_count, SaveError, SaveResult};
use vsave_common::manifest::ContentManifest;
use vsave_common::package::{
    create_package, create_package_file, open_package, open_package_file, MemFile, PackageStream,
    SaveFormat,
};
use vsave_common::savefiles::{
    SaveFlags, MAX_SAVED_MAPS, SAVE_FORMAT_VERSION, SECTION_CHECKPOINT, SECTION_CURRENT_MAP,
    SECTION_DESCRIPTION, SECTION_HEADER, SECTION_MANIFEST, SECTION_MAP_LIST, SECTION_SKILL,
    SECTION_TIMESTAMP,
};
use vsave_common::sizebuf::SectionReader;
use vsave_common::strings::StringInterner;
use vsave_game::Name;

use crate::checkpoint::Checkpoint;
use crate::saved_map::SavedMap;

/// File extension of slot files.
pub const SLOT_EXTENSION: &str = "vsg";

/// Header-only view of a slot for save menus.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotInfo {
    pub description: String,
    pub current_map: String,
    pub timestamp: i64,
    pub map_count: usize,
    pub has_checkpoint: bool,
    pub format: SaveFormat,
}

impl SlotInfo {
    /// Local time of the save, or "unknown" for saves without a timestamp.
    pub fn time_string(&self) -> String {
        match DateTime::<Utc>::from_timestamp(self.timestamp, 0) {
            Some(t) if self.timestamp > 0 => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            _ => "unknown".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SaveSlot {
    pub description: String,
    pub current_map: Name,
    maps: Vec<SavedMap>,
    pub checkpoint: Option<Checkpoint>,
    /// -1 when unset
    pub saved_skill: i32,
    pub format: SaveFormat,
    /// Unix seconds of the last successful write
    pub timestamp: i64,
    pub manifest: Option<ContentManifest>,
    /// Maps archived into this slot intern their string fields.
    intern_strings: bool,
}

impl Default for SaveSlot {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SaveSlot {
    pub fn new(intern_strings: bool) -> Self {
        Self {
            description: String::new(),
            current_map: Name::none(),
            maps: Vec::new(),
            checkpoint: None,
            saved_skill: -1,
            format: SaveFormat::Package,
            timestamp: 0,
            manifest: None,
            intern_strings,
        }
    }

    /// Forget all in-memory state. Files on disk are untouched.
    pub fn clear(&mut self) {
        *self = SaveSlot::new(self.intern_strings);
    }

    // ============================================================
    // Maps
    // ============================================================

    /// Add a map, replacing an earlier entry for the same map in place.
    pub fn store_map(&mut self, map: SavedMap) {
        match self.maps.iter_mut().find(|m| m.name == map.name) {
            Some(existing) => *existing = map,
            None => self.maps.push(map),
        }
    }

    pub fn find_map(&self, name: &Name) -> Option<&SavedMap> {
        self.maps.iter().find(|m| &m.name == name)
    }

    pub fn remove_map(&mut self, name: &Name) -> Option<SavedMap> {
        let idx = self.maps.iter().position(|m| &m.name == name)?;
        Some(self.maps.remove(idx))
    }

    pub fn maps(&self) -> &[SavedMap] {
        &self.maps
    }

    pub fn map_names(&self) -> Vec<Name> {
        self.maps.iter().map(|m| m.name.clone()).collect()
    }

    // ============================================================
    // Strings
    // ============================================================

    pub fn interns_strings(&self) -> bool {
        self.intern_strings
    }

    /// Intern string fields of maps archived from now on. Maps already
    /// stored keep their encoding.
    pub fn enable_string_interning(&mut self) {
        self.intern_strings = true;
    }

    /// Whether a write needs a string table: interning is on or some stored
    /// map was archived with one.
    fn writes_string_table(&self) -> bool {
        self.intern_strings || self.maps.iter().any(|m| m.strings.is_some())
    }

    // ============================================================
    // Writing
    // ============================================================

    fn flags(&self) -> SaveFlags {
        let mut flags = SaveFlags::empty();
        if self.writes_string_table() {
            flags |= SaveFlags::STRINGS_INTERNED;
        }
        if self.checkpoint.is_some() {
            flags |= SaveFlags::HAS_CHECKPOINT;
        }
        flags
    }

    /// Write every section into `pkg` and close it. The string table is
    /// built fresh for this write and holds exactly the strings the written
    /// maps reference.
    pub fn write_to(&self, pkg: &mut dyn PackageStream) -> SaveResult<()> {
        let mut strings = self.writes_string_table().then(StringInterner::new);
        let payloads = self
            .maps
            .iter()
            .map(|m| m.packed_payload(strings.as_mut()))
            .collect::<SaveResult<Vec<_>>>()?;
        if let Some(strings) = strings {
            com_dprintf(&format!("string table: {} entries\n", strings.len()));
            pkg.attach_strings(strings)?;
        }

        let mut w = pkg.create_section(SECTION_HEADER, false)?;
        w.write_long(SAVE_FORMAT_VERSION);
        w.write_long(self.flags().bits());
        w.write_long(self.maps.len() as i32);
        pkg.close_section(w)?;

        let mut w = pkg.create_section(SECTION_DESCRIPTION, false)?;
        w.write_string(&self.description);
        pkg.close_section(w)?;

        let mut w = pkg.create_section(SECTION_CURRENT_MAP, false)?;
        w.write_string(self.current_map.as_str());
        pkg.close_section(w)?;

        let mut w = pkg.create_section(SECTION_MAP_LIST, false)?;
        w.write_long(self.maps.len() as i32);
        for m in &self.maps {
            w.write_string(m.name.as_str());
        }
        pkg.close_section(w)?;

        for (i, payload) in payloads.iter().enumerate() {
            SavedMap::write(pkg, i, payload)?;
        }

        let mut w = pkg.create_section(SECTION_SKILL, false)?;
        w.write_long(self.saved_skill);
        pkg.close_section(w)?;

        let mut w = pkg.create_section(SECTION_TIMESTAMP, false)?;
        w.write_int64(self.timestamp);
        pkg.close_section(w)?;

        if let Some(ref manifest) = self.manifest {
            let mut w = pkg.create_section(SECTION_MANIFEST, false)?;
            manifest.write(&mut w);
            pkg.close_section(w)?;
        }

        if let Some(ref cp) = self.checkpoint {
            let mut w = pkg.create_section(SECTION_CHECKPOINT, false)?;
            cp.write(&mut w);
            pkg.close_section(w)?;
        }

        pkg.close()
    }

    /// Serialize into memory with the given backend.
    pub fn to_bytes(&self, format: SaveFormat, compression_level: u32) -> SaveResult<Vec<u8>> {
        let out = MemFile::new();
        let mut pkg = create_package(format, Box::new(out.clone()), compression_level)?;
        self.write_to(pkg.as_mut())?;
        Ok(out.take())
    }

    /// Write the slot to `path`. The file is built next to it and renamed
    /// over the old one only after the container closed cleanly.
    pub fn save_to_slot(&mut self, path: &Path, compression_level: u32) -> SaveResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        self.format = SaveFormat::Package;
        self.timestamp = Utc::now().timestamp();

        let tmp = path.with_extension("tmp");
        if let Err(e) = self.write_file(&tmp, compression_level) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        com_dprintf(&format!("wrote {} ({} maps)\n", path.display(), self.maps.len()));
        Ok(())
    }

    fn write_file(&self, path: &Path, compression_level: u32) -> SaveResult<()> {
        let mut pkg = create_package_file(path, SaveFormat::Package, compression_level)?;
        self.write_to(pkg.as_mut())
    }

    // ============================================================
    // Reading
    // ============================================================

    /// Read a slot file with whichever backend its signature names.
    pub fn load_slot(path: &Path) -> SaveResult<Self> {
        let mut pkg = open_package_file(path)?;
        Self::read_from(pkg.as_mut())
    }

    pub fn from_bytes(data: Vec<u8>) -> SaveResult<Self> {
        let mut pkg = open_package(data)?;
        Self::read_from(pkg.as_mut())
    }

    pub fn read_from(pkg: &mut dyn PackageStream) -> SaveResult<Self> {
        let (flags, map_count) = read_header(pkg)?;
        let mut slot = SaveSlot::new(false);
        slot.format = pkg.format();
        slot.description = read_required(pkg, SECTION_DESCRIPTION)?.read_string()?;
        slot.current_map = Name::new(&read_required(pkg, SECTION_CURRENT_MAP)?.read_string()?);

        let mut r = read_required(pkg, SECTION_MAP_LIST)?;
        let listed = check_count("saved map", r.read_long()?, MAX_SAVED_MAPS)?;
        if listed != map_count {
            return Err(SaveError::Corrupt(format!(
                "header lists {} maps, map list has {}",
                map_count, listed
            )));
        }
        let strings = if flags.contains(SaveFlags::STRINGS_INTERNED) {
            let table = pkg
                .load_strings()?
                .ok_or_else(|| SaveError::Corrupt("string table missing".into()))?;
            slot.intern_strings = true;
            Some(Arc::new(table))
        } else {
            None
        };
        for i in 0..listed {
            let name = Name::new(&r.read_string()?);
            if slot.find_map(&name).is_some() {
                return Err(SaveError::Corrupt(format!("map {} saved twice", name)));
            }
            slot.maps.push(SavedMap::read(pkg, i, name, strings.as_ref())?);
        }

        if let Some(mut r) = read_optional(pkg, SECTION_SKILL)? {
            slot.saved_skill = r.read_long()?;
        }
        if let Some(mut r) = read_optional(pkg, SECTION_TIMESTAMP)? {
            slot.timestamp = r.read_int64()?;
        }
        if let Some(mut r) = read_optional(pkg, SECTION_MANIFEST)? {
            slot.manifest = Some(ContentManifest::read(&mut r)?);
        }
        if flags.contains(SaveFlags::HAS_CHECKPOINT) {
            let mut r = read_required(pkg, SECTION_CHECKPOINT)?;
            slot.checkpoint = Some(Checkpoint::read(&mut r)?);
        }

        pkg.close()?;
        Ok(slot)
    }

    /// Read just enough of a slot file for a save menu entry.
    pub fn read_description(path: &Path) -> SaveResult<SlotInfo> {
        let mut pkg = open_package_file(path)?;
        let (flags, map_count) = read_header(pkg.as_mut())?;
        let description = read_required(pkg.as_mut(), SECTION_DESCRIPTION)?.read_string()?;
        let current_map = read_required(pkg.as_mut(), SECTION_CURRENT_MAP)?.read_string()?;
        let timestamp = match read_optional(pkg.as_mut(), SECTION_TIMESTAMP)? {
            Some(mut r) => r.read_int64()?,
            None => 0,
        };
        Ok(SlotInfo {
            description,
            current_map,
            timestamp,
            map_count,
            has_checkpoint: flags.contains(SaveFlags::HAS_CHECKPOINT),
            format: pkg.format(),
        })
    }
}

fn read_header(pkg: &mut dyn PackageStream) -> SaveResult<(SaveFlags, usize)> {
    let mut r = read_required(pkg, SECTION_HEADER)?;
    let version = r.read_long()?;
    if version != SAVE_FORMAT_VERSION {
        return Err(SaveError::BadVersion(version.to_string()));
    }
    let flags = SaveFlags::from_bits_truncate(r.read_long()?);
    let map_count = check_count("saved map", r.read_long()?, MAX_SAVED_MAPS)?;
    Ok((flags, map_count))
}

/// A section every save has; its absence means the file is damaged.
fn read_required(pkg: &mut dyn PackageStream, name: &str) -> SaveResult<SectionReader> {
    pkg.open_section(name).map_err(|e| match e {
        SaveError::NotFound(section) => SaveError::Corrupt(format!("section '{}' missing", section)),
        other => other,
    })
}

fn read_optional(pkg: &mut dyn PackageStream, name: &str) -> SaveResult<Option<SectionReader>> {
    match pkg.open_section(name) {
        Ok(r) => Ok(Some(r)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================
// Slot files
// ============================================================

/// Path of slot `name` inside `save_dir`.
pub fn slot_path(save_dir: &Path, name: &str) -> PathBuf {
    save_dir.join(format!("{}.{}", name, SLOT_EXTENSION))
}

/// Delete a slot file. A missing slot is not an error.
pub fn wipe_slot(save_dir: &Path, name: &str) -> SaveResult<()> {
    com_dprintf(&format!("wipe_slot({})\n", name));
    match fs::remove_file(slot_path(save_dir, name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Copy slot `src` over slot `dst`.
pub fn copy_slot(save_dir: &Path, src: &str, dst: &str) -> SaveResult<()> {
    com_dprintf(&format!("copy_slot({}, {})\n", src, dst));
    let from = slot_path(save_dir, src);
    if !from.exists() {
        return Err(SaveError::NoSuchSlot(src.to_string()));
    }
    let to = slot_path(save_dir, dst);
    let tmp = to.with_extension("tmp");
    if let Err(e) = fs::copy(&from, &tmp).and_then(|_| fs::rename(&tmp, &to)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// All readable slots in `save_dir`, sorted by name. Damaged files are
/// reported and skipped.
pub fn list_slots(save_dir: &Path) -> Vec<(String, SlotInfo)> {
    let mut slots = Vec::new();
    let Ok(entries) = fs::read_dir(save_dir) else {
        return slots;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != SLOT_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match SaveSlot::read_description(&path) {
            Ok(info) => slots.push((name, info)),
            Err(e) => com_printf(&format!("{}: {}\n", path.display(), e)),
        }
    }
    slots.sort_by(|a, b| a.0.cmp(&b.0));
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointValue;
    use vsave_common::savefiles::LEGACY_SIGNATURE;
    use vsave_common::savefiles::SECTION_STRINGS;
    use vsave_game::g_content::{content_registry, Mobj};
    use vsave_game::Level;

    fn tagged_map(name: &str, health: i32, tag: &str, intern: bool) -> SavedMap {
        let mut level = Level::new(name, 1, 1);
        let mut imp = Mobj::new("DoomImp", health);
        imp.tag = tag.to_string();
        level.objects.spawn(Box::new(imp));
        SavedMap::archive(&mut level, &[], intern).unwrap()
    }

    fn map(name: &str, health: i32) -> SavedMap {
        tagged_map(name, health, "", false)
    }

    fn imp_tag(map: &SavedMap) -> String {
        let mut level = Level::new(map.name.as_str(), 1, 1);
        map.unarchive(&mut level, &[], &content_registry()).unwrap();
        let id = level.objects.ids()[0];
        level.objects.get_as::<Mobj>(id).unwrap().tag.clone()
    }

    fn sample_slot() -> SaveSlot {
        let mut slot = SaveSlot::new(false);
        slot.description = "Test".into();
        slot.current_map = Name::new("MAP02");
        slot.saved_skill = 2;
        slot.store_map(map("MAP01", 60));
        slot.store_map(map("MAP02", 20));
        slot
    }

    #[test]
    fn test_store_map_replaces_in_place() {
        let mut slot = sample_slot();
        let replacement = map("MAP01", 5);
        slot.store_map(replacement.clone());
        assert_eq!(slot.map_names(), [Name::new("MAP01"), Name::new("MAP02")]);
        assert_eq!(slot.find_map(&Name::new("MAP01")), Some(&replacement));

        assert!(slot.remove_map(&Name::new("MAP01")).is_some());
        assert!(slot.remove_map(&Name::new("MAP01")).is_none());
        assert_eq!(slot.maps().len(), 1);
    }

    #[test]
    fn test_roundtrip_both_formats() {
        let mut slot = sample_slot();
        let mut cp = Checkpoint::new();
        cp.push_value("health", CheckpointValue::Int(50)).unwrap();
        slot.checkpoint = Some(cp);

        for format in [SaveFormat::Package, SaveFormat::Legacy] {
            let back = SaveSlot::from_bytes(slot.to_bytes(format, 6).unwrap()).unwrap();
            assert_eq!(back.format, format);
            assert_eq!(back.description, "Test");
            assert_eq!(back.current_map.as_str(), "MAP02");
            assert_eq!(back.saved_skill, 2);
            assert_eq!(back.maps(), slot.maps());
            assert_eq!(back.checkpoint, slot.checkpoint);
            assert!(!back.interns_strings());
        }
    }

    #[test]
    fn test_legacy_refuses_interned_slot() {
        let mut slot = sample_slot();
        slot.enable_string_interning();
        assert!(matches!(
            slot.to_bytes(SaveFormat::Legacy, 6),
            Err(SaveError::Unsupported(_))
        ));
        let back = SaveSlot::from_bytes(slot.to_bytes(SaveFormat::Package, 6).unwrap()).unwrap();
        assert!(back.interns_strings());
    }

    #[test]
    fn test_clear_keeps_mode_only() {
        let mut slot = sample_slot();
        slot.enable_string_interning();
        slot.clear();
        assert!(slot.maps().is_empty());
        assert!(slot.description.is_empty());
        assert_eq!(slot.saved_skill, -1);
        assert!(slot.interns_strings());
    }

    #[test]
    fn test_string_table_built_per_write() {
        let mut slot = SaveSlot::new(true);
        slot.current_map = Name::new("MAP02");
        slot.store_map(tagged_map("MAP01", 60, "stale", true));
        slot.store_map(tagged_map("MAP02", 20, "shared", true));
        slot.store_map(tagged_map("MAP01", 60, "shared", true));
        slot.store_map(tagged_map("MAP03", 5, "inline", false));

        let data = slot.to_bytes(SaveFormat::Package, 6).unwrap();
        let mut pkg = open_package(data.clone()).unwrap();
        assert_eq!(pkg.section_names().last().map(String::as_str), Some(SECTION_STRINGS));
        let table = pkg.load_strings().unwrap().unwrap();
        assert_eq!(table.entries(), ["shared"]);

        let back = SaveSlot::from_bytes(data).unwrap();
        assert!(back.interns_strings());
        assert_eq!(imp_tag(back.find_map(&Name::new("MAP01")).unwrap()), "shared");
        assert_eq!(imp_tag(back.find_map(&Name::new("MAP03")).unwrap()), "inline");

        // Writing the loaded slot again builds the same table, not a larger one
        let mut pkg = open_package(back.to_bytes(SaveFormat::Package, 6).unwrap()).unwrap();
        assert_eq!(pkg.load_strings().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_legacy_signature() {
        let slot = sample_slot();
        let mut data = slot.to_bytes(SaveFormat::Legacy, 6).unwrap();
        assert!(data.starts_with(LEGACY_SIGNATURE.as_bytes()));
        data[..6].copy_from_slice(b"XXXXXX");
        assert!(matches!(SaveSlot::from_bytes(data), Err(SaveError::BadSignature)));
    }

    #[test]
    fn test_missing_section_is_corruption() {
        let out = MemFile::new();
        let mut pkg = create_package(SaveFormat::Package, Box::new(out.clone()), 6).unwrap();
        let mut w = pkg.create_section(SECTION_HEADER, false).unwrap();
        w.write_long(SAVE_FORMAT_VERSION);
        w.write_long(0);
        w.write_long(0);
        pkg.close_section(w).unwrap();
        pkg.close().unwrap();
        assert!(SaveSlot::from_bytes(out.take()).unwrap_err().is_corruption());
    }

    #[test]
    fn test_future_version_rejected() {
        let out = MemFile::new();
        let mut pkg = create_package(SaveFormat::Package, Box::new(out.clone()), 6).unwrap();
        let mut w = pkg.create_section(SECTION_HEADER, false).unwrap();
        w.write_long(SAVE_FORMAT_VERSION + 1);
        w.write_long(0);
        w.write_long(0);
        pkg.close_section(w).unwrap();
        pkg.close().unwrap();
        assert!(matches!(SaveSlot::from_bytes(out.take()), Err(SaveError::BadVersion(_))));
    }

    #[test]
    fn test_slot_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut slot = sample_slot();
        let path = slot_path(dir.path(), "slot0");
        slot.save_to_slot(&path, 6).unwrap();
        assert!(slot.timestamp > 0);
        assert!(!path.with_extension("tmp").exists());

        let info = SaveSlot::read_description(&path).unwrap();
        assert_eq!(info.description, "Test");
        assert_eq!(info.current_map, "MAP02");
        assert_eq!(info.map_count, 2);
        assert_eq!(info.format, SaveFormat::Package);
        assert_ne!(info.time_string(), "unknown");

        copy_slot(dir.path(), "slot0", "slot1").unwrap();
        let copy = SaveSlot::load_slot(&slot_path(dir.path(), "slot1")).unwrap();
        assert_eq!(copy.maps(), slot.maps());

        let names: Vec<String> = list_slots(dir.path()).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["slot0", "slot1"]);

        wipe_slot(dir.path(), "slot0").unwrap();
        wipe_slot(dir.path(), "slot0").unwrap();
        assert!(!path.exists());
        assert!(matches!(
            copy_slot(dir.path(), "slot0", "slot2"),
            Err(SaveError::NoSuchSlot(_))
        ));
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = slot_path(dir.path(), "slot0");
        let mut slot = sample_slot();
        slot.save_to_slot(&path, 6).unwrap();
        let before = fs::read(&path).unwrap();

        // A directory squatting on the temp path makes the write fail
        let tmp = path.with_extension("tmp");
        fs::create_dir(&tmp).unwrap();
        slot.description = "Broken".into();
        assert!(slot.save_to_slot(&path, 6).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(tmp.is_dir());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SaveSlot::load_slot(&slot_path(dir.path(), "nope")).unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }
}
