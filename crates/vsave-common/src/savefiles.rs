// savefiles.rs — on-disk savegame format structures and constants

use bitflags::bitflags;

// ============================================================
// Package container ("VSPK")
// ============================================================

/// Package magic: "VSPK" in little-endian
pub const IDPACKAGEHEADER: i32 =
    (b'K' as i32) << 24 | (b'P' as i32) << 16 | (b'S' as i32) << 8 | b'V' as i32;

pub const PACKAGE_VERSION: i32 = 1;

/// Size of the fixed package header: ident, version, dirofs, numentries.
pub const PACKAGE_HEADER_SIZE: usize = 16;

/// Fixed width of a directory entry name, including the NUL terminator.
pub const PACKAGE_NAME_LEN: usize = 56;

/// Size of one directory record on disk.
pub const PACKAGE_DIRENTRY_SIZE: usize = PACKAGE_NAME_LEN + 4 * 5;

pub const MAX_ENTRIES_IN_PACKAGE: usize = 4096;

/// One directory record of the package container.
#[derive(Debug, Clone, PartialEq)]
pub struct DPackageEntry {
    pub name: String,
    pub filepos: i32,
    /// Bytes stored on disk (compressed size when compressed).
    pub disksize: i32,
    /// Bytes after decompression.
    pub filesize: i32,
    pub crc32: u32,
    pub flags: EntryFlags,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EntryFlags: i32 {
        const COMPRESSED = 0x0001;
        const SEEKABLE   = 0x0002;
    }
}

// ============================================================
// Legacy flat blob
// ============================================================

pub const LEGACY_SIGNATURE: &str = "VSAVE LEGACY SAVEGAME";
pub const LEGACY_SIGNATURE_LEN: usize = 32;
pub const LEGACY_VERSION: &str = "VERSION 1";
pub const LEGACY_VERSION_LEN: usize = 16;

/// signature + version + flags + decompressed size + stored size
pub const LEGACY_HEADER_SIZE: usize = LEGACY_SIGNATURE_LEN + LEGACY_VERSION_LEN + 1 + 4 + 4;

/// Legacy header flag: the body is raw-deflate compressed.
pub const LEGACY_FLAG_COMPRESSED: u8 = 0x01;

/// Marks the start of one simulated section inside the legacy body.
pub const SECTION_TAG: i32 = 0x5443_4553; // "SECT"
/// Terminates the legacy section list.
pub const SECTION_END: i32 = 0x4450_4e45; // "ENDP"

// ============================================================
// Map payload segments
// ============================================================

pub const ASEG_MAP_HEADER: i32 = 101;
pub const ASEG_WORLD: i32 = 102;
pub const ASEG_SCRIPTS: i32 = 103;
pub const ASEG_SOUNDS: i32 = 104;
pub const ASEG_END: i32 = 105;

// ============================================================
// Reserved entry names
// ============================================================

pub const SECTION_HEADER: &str = "header";
pub const SECTION_DESCRIPTION: &str = "description";
pub const SECTION_CURRENT_MAP: &str = "current_map";
pub const SECTION_MAP_LIST: &str = "maps";
pub const SECTION_SKILL: &str = "skill";
pub const SECTION_TIMESTAMP: &str = "timestamp";
pub const SECTION_MANIFEST: &str = "manifest";
pub const SECTION_CHECKPOINT: &str = "checkpoint";
pub const SECTION_STRINGS: &str = "strings";

/// Entry name of the map stored at `index` in the slot's map list.
pub fn map_section_name(index: usize) -> String {
    format!("map_{:03}", index)
}

/// Version written into the `header` entry.
pub const SAVE_FORMAT_VERSION: i32 = 1;

bitflags! {
    /// Flags of the `header` entry and of a map payload.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SaveFlags: i32 {
        const STRINGS_INTERNED = 0x0001;
        const HAS_CHECKPOINT   = 0x0002;
    }
}

// ============================================================
// Limits
// ============================================================

pub const MAX_STRING_LEN: i32 = 64 * 1024;
pub const MAX_SAVED_MAPS: i32 = 1024;
pub const MAX_SAVE_OBJECTS: i32 = 1 << 20;
pub const MAX_SAVE_NAMES: i32 = 1 << 20;
pub const MAX_SAVE_STRINGS: i32 = 1 << 20;
pub const MAX_SAVE_SCRIPTS: i32 = 1 << 16;
pub const MAX_SAVE_SOUNDS: i32 = 1 << 16;
