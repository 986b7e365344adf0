// pak.rs — multi-entry package backend ("VSPK")
//
// Layout: header | entry data ... | directory. The header is written with
// placeholders when the package is created and patched on close, once the
// directory offset is known. Each entry is compressed on its own.

use std::collections::HashMap;
use std::io::SeekFrom;

use crate::common::{com_dprintf, from_fixed, to_fixed};
use crate::compression::{compress_if_smaller, decompress_with_size, MAX_DECOMPRESS_SIZE};
use crate::crc::crc_block;
use crate::error::{SaveError, SaveResult};
use crate::package::{PackageGuard, PackageMode, PackageState, PackageStream, SaveFormat, WriteSeek};
use crate::savefiles::{
    DPackageEntry, EntryFlags, IDPACKAGEHEADER, MAX_ENTRIES_IN_PACKAGE, PACKAGE_DIRENTRY_SIZE,
    PACKAGE_HEADER_SIZE, PACKAGE_NAME_LEN, PACKAGE_VERSION, SECTION_STRINGS,
};
use crate::sizebuf::{SectionReader, SectionWriter};
use crate::strings::{StringInterner, StringTable};

enum PakIo {
    Write { out: Box<dyn WriteSeek>, pos: u64 },
    Read { data: Vec<u8> },
}

/// A package container opened for writing or reading.
pub struct PackageFile {
    io: PakIo,
    guard: PackageGuard,
    entries: Vec<DPackageEntry>,
    /// Lookup index: entry name -> position in `entries`
    entry_index: HashMap<String, usize>,
    strings: Option<StringInterner>,
    compression_level: u32,
}

impl std::fmt::Debug for PackageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageFile").finish_non_exhaustive()
    }
}

impl PackageFile {
    /// Start a new package on `out`. The placeholder header is written
    /// immediately.
    pub fn create(mut out: Box<dyn WriteSeek>, compression_level: u32) -> SaveResult<Self> {
        out.write_all(&header_bytes(0, 0))?;
        Ok(Self {
            io: PakIo::Write {
                out,
                pos: PACKAGE_HEADER_SIZE as u64,
            },
            guard: PackageGuard::new(PackageMode::Write),
            entries: Vec::new(),
            entry_index: HashMap::new(),
            strings: None,
            compression_level,
        })
    }

    /// Parse a package held in memory.
    pub fn open(data: Vec<u8>) -> SaveResult<Self> {
        if data.len() < PACKAGE_HEADER_SIZE {
            return Err(SaveError::BadSignature);
        }
        let long_at = |ofs: usize| i32::from_le_bytes([data[ofs], data[ofs + 1], data[ofs + 2], data[ofs + 3]]);

        if long_at(0) != IDPACKAGEHEADER {
            return Err(SaveError::BadSignature);
        }
        let version = long_at(4);
        if version != PACKAGE_VERSION {
            return Err(SaveError::BadVersion(version.to_string()));
        }
        let dirofs = long_at(8);
        let numentries = long_at(12);
        if numentries < 0 || numentries as usize > MAX_ENTRIES_IN_PACKAGE {
            return Err(SaveError::BadCount {
                what: "package entry",
                count: numentries,
            });
        }
        let numentries = numentries as usize;
        let dirlen = numentries * PACKAGE_DIRENTRY_SIZE;
        if dirofs < PACKAGE_HEADER_SIZE as i32 || dirofs as usize + dirlen > data.len() {
            return Err(SaveError::Corrupt("package directory out of range".into()));
        }

        let mut entries = Vec::with_capacity(numentries);
        let mut dir = SectionReader::new("directory", data[dirofs as usize..dirofs as usize + dirlen].to_vec());
        for _ in 0..numentries {
            let name = from_fixed(dir.read_data(PACKAGE_NAME_LEN)?);
            let entry = DPackageEntry {
                name,
                filepos: dir.read_long()?,
                disksize: dir.read_long()?,
                filesize: dir.read_long()?,
                crc32: dir.read_long()? as u32,
                flags: EntryFlags::from_bits_truncate(dir.read_long()?),
            };
            if entry.filepos < PACKAGE_HEADER_SIZE as i32
                || entry.disksize < 0
                || entry.filesize < 0
                || entry.filepos as usize + entry.disksize as usize > dirofs as usize
            {
                return Err(SaveError::Corrupt(format!("entry '{}' out of range", entry.name)));
            }
            entries.push(entry);
        }

        let entry_index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();

        com_dprintf(&format!("opened package ({} entries)\n", numentries));
        Ok(Self {
            io: PakIo::Read { data },
            guard: PackageGuard::new(PackageMode::Read),
            entries,
            entry_index,
            strings: None,
            compression_level: 0,
        })
    }

    /// Directory of the package, in write order.
    fn entries(&self) -> &[DPackageEntry] {
        &self.entries
    }

    fn find_entry(&self, name: &str) -> Option<&DPackageEntry> {
        self.entry_index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Compress and append one entry to the output.
    fn write_entry(&mut self, name: &str, raw: &[u8], seekable: bool) -> SaveResult<()> {
        let compressed = compress_if_smaller(raw, self.compression_level)?;
        let PakIo::Write { out, pos } = &mut self.io else {
            return Err(SaveError::InvalidState("package is opened for reading"));
        };

        let mut flags = EntryFlags::empty();
        if seekable {
            flags |= EntryFlags::SEEKABLE;
        }
        let stored: &[u8] = match compressed {
            Some(ref c) => {
                flags |= EntryFlags::COMPRESSED;
                c
            }
            None => raw,
        };

        out.write_all(stored)?;
        let entry = DPackageEntry {
            name: name.to_string(),
            filepos: *pos as i32,
            disksize: stored.len() as i32,
            filesize: raw.len() as i32,
            crc32: crc_block(raw),
            flags,
        };
        *pos += stored.len() as u64;

        com_dprintf(&format!(
            "package: wrote '{}' ({} -> {} bytes)\n",
            name, entry.filesize, entry.disksize
        ));
        self.entry_index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Write the directory and patch the header.
    fn write_directory(&mut self) -> SaveResult<()> {
        let PakIo::Write { out, pos } = &mut self.io else {
            return Err(SaveError::InvalidState("package is opened for reading"));
        };

        let dirofs = *pos as i32;
        let mut dir = SectionWriter::new("directory", false);
        for e in &self.entries {
            dir.write(&to_fixed::<PACKAGE_NAME_LEN>(&e.name));
            dir.write_long(e.filepos);
            dir.write_long(e.disksize);
            dir.write_long(e.filesize);
            dir.write_long(e.crc32 as i32);
            dir.write_long(e.flags.bits());
        }
        out.write_all(&dir.data)?;
        *pos += dir.data.len() as u64;

        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header_bytes(dirofs, self.entries.len() as i32))?;
        out.seek(SeekFrom::Start(*pos))?;
        out.flush()?;
        Ok(())
    }

    fn validate_name(name: &str) -> SaveResult<()> {
        if name.is_empty() || name.len() >= PACKAGE_NAME_LEN || name.contains('\0') {
            return Err(SaveError::NameTooLong(name.to_string()));
        }
        Ok(())
    }
}

fn header_bytes(dirofs: i32, numentries: i32) -> [u8; PACKAGE_HEADER_SIZE] {
    let mut h = [0u8; PACKAGE_HEADER_SIZE];
    h[0..4].copy_from_slice(&IDPACKAGEHEADER.to_le_bytes());
    h[4..8].copy_from_slice(&PACKAGE_VERSION.to_le_bytes());
    h[8..12].copy_from_slice(&dirofs.to_le_bytes());
    h[12..16].copy_from_slice(&numentries.to_le_bytes());
    h
}

impl PackageStream for PackageFile {
    fn format(&self) -> SaveFormat {
        SaveFormat::Package
    }

    fn state(&self) -> PackageState {
        self.guard.state()
    }

    fn is_error(&self) -> bool {
        self.guard.is_error()
    }

    fn create_section(&mut self, name: &str, seekable: bool) -> SaveResult<SectionWriter> {
        self.guard.check()?;
        if let Err(e) = Self::validate_name(name) {
            return Err(self.guard.fail(e));
        }
        if self.entry_index.contains_key(name) || name == SECTION_STRINGS {
            return Err(self.guard.fail(SaveError::InvalidState("duplicate or reserved section name")));
        }
        self.guard.begin_section(name)?;
        Ok(SectionWriter::new(name, seekable))
    }

    fn close_section(&mut self, section: SectionWriter) -> SaveResult<()> {
        self.guard.end_section(section.name())?;
        if let Err(e) = self.write_entry(section.name(), &section.data, section.seekable()) {
            return Err(self.guard.fail(e));
        }
        Ok(())
    }

    fn open_section(&mut self, name: &str) -> SaveResult<SectionReader> {
        self.guard.begin_read(name)?;
        let entry = match self.find_entry(name) {
            Some(e) => e.clone(),
            None => return Err(SaveError::NotFound(name.to_string())),
        };
        let PakIo::Read { data } = &self.io else {
            return Err(SaveError::InvalidState("package is opened for writing"));
        };

        let start = entry.filepos as usize;
        let stored = &data[start..start + entry.disksize as usize];
        let raw = if entry.flags.contains(EntryFlags::COMPRESSED) {
            decompress_with_size(stored, entry.filesize as usize)?
        } else {
            if entry.disksize != entry.filesize || entry.filesize as usize > MAX_DECOMPRESS_SIZE {
                return Err(SaveError::Corrupt(format!("bad size for entry '{}'", name)));
            }
            stored.to_vec()
        };

        if crc_block(&raw) != entry.crc32 {
            return Err(SaveError::Corrupt(format!("checksum mismatch in entry '{}'", name)));
        }
        Ok(SectionReader::new(name, raw))
    }

    fn has_section(&self, name: &str) -> bool {
        self.entry_index.contains_key(name)
    }

    fn section_names(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.name.clone()).collect()
    }

    fn attach_strings(&mut self, strings: StringInterner) -> SaveResult<()> {
        self.guard.check()?;
        if self.guard.mode != PackageMode::Write {
            return Err(SaveError::InvalidState("package is opened for reading"));
        }
        self.strings = Some(strings);
        Ok(())
    }

    fn load_strings(&mut self) -> SaveResult<Option<StringTable>> {
        if !self.has_section(SECTION_STRINGS) {
            return Ok(None);
        }
        let mut r = self.open_section(SECTION_STRINGS)?;
        Ok(Some(StringTable::read(&mut r)?))
    }

    fn close(&mut self) -> SaveResult<()> {
        self.guard.begin_close()?;
        if self.guard.mode == PackageMode::Write {
            // The string table goes last: only now is its final size known
            if let Some(strings) = self.strings.take() {
                let mut w = SectionWriter::new(SECTION_STRINGS, false);
                strings.table().write(&mut w);
                if let Err(e) = self.write_entry(SECTION_STRINGS, &w.data, false) {
                    return Err(self.guard.fail(e));
                }
            }
            if let Err(e) = self.write_directory() {
                return Err(self.guard.fail(e));
            }
        }
        self.guard.finish_close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::MemFile;
    use std::io::{self, Seek, Write};

    fn write_sample(level: u32) -> Vec<u8> {
        let out = MemFile::new();
        let mut pkg = PackageFile::create(Box::new(out.clone()), level).unwrap();
        let mut w = pkg.create_section("description", false).unwrap();
        w.write_string("Test");
        pkg.close_section(w).unwrap();
        let mut w = pkg.create_section("map_000", true).unwrap();
        for i in 0..500 {
            w.write_long(i % 7);
        }
        pkg.close_section(w).unwrap();
        pkg.close().unwrap();
        out.take()
    }

    #[test]
    fn test_directory_and_header() {
        let data = write_sample(6);
        let pkg = PackageFile::open(data).unwrap();
        let names: Vec<&str> = pkg.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["description", "map_000"]);
        let map = &pkg.entries()[1];
        assert!(map.flags.contains(EntryFlags::COMPRESSED));
        assert!(map.flags.contains(EntryFlags::SEEKABLE));
        assert_eq!(map.filesize, 2000);
        assert!(map.disksize < map.filesize);
    }

    #[test]
    fn test_level_zero_stores_uncompressed() {
        let pkg = PackageFile::open(write_sample(0)).unwrap();
        assert!(pkg.entries().iter().all(|e| !e.flags.contains(EntryFlags::COMPRESSED)));
    }

    #[test]
    fn test_entry_data_roundtrip() {
        let mut pkg = PackageFile::open(write_sample(9)).unwrap();
        let mut r = pkg.open_section("map_000").unwrap();
        for i in 0..500 {
            assert_eq!(r.read_long().unwrap(), i % 7);
        }
        assert!(r.at_end());
    }

    #[test]
    fn test_string_table_written_last() {
        let out = MemFile::new();
        let mut pkg = PackageFile::create(Box::new(out.clone()), 6).unwrap();
        let mut strings = StringInterner::new();
        let idx = strings.intern("door_open");
        pkg.attach_strings(strings).unwrap();
        let mut w = pkg.create_section("map_000", true).unwrap();
        w.write_long(idx);
        pkg.close_section(w).unwrap();
        pkg.close().unwrap();

        let mut pkg = PackageFile::open(out.take()).unwrap();
        assert_eq!(pkg.section_names().last().map(String::as_str), Some(SECTION_STRINGS));
        let table = pkg.load_strings().unwrap().unwrap();
        let idx = pkg.open_section("map_000").unwrap().read_long().unwrap();
        assert_eq!(table.resolve(idx).unwrap(), "door_open");
    }

    #[test]
    fn test_reserved_and_long_names_rejected() {
        let mut pkg = PackageFile::create(Box::new(MemFile::new()), 6).unwrap();
        assert!(matches!(
            pkg.create_section(&"x".repeat(PACKAGE_NAME_LEN), false),
            Err(SaveError::NameTooLong(_))
        ));
        let mut pkg = PackageFile::create(Box::new(MemFile::new()), 6).unwrap();
        assert!(pkg.create_section(SECTION_STRINGS, false).is_err());
    }

    #[test]
    fn test_corrupted_entry_detected() {
        let mut data = write_sample(0);
        // Flip a byte inside the description payload
        data[PACKAGE_HEADER_SIZE + 4] ^= 0xff;
        let mut pkg = PackageFile::open(data).unwrap();
        assert!(pkg.open_section("description").unwrap_err().is_corruption());
    }

    #[test]
    fn test_bad_signature_and_version() {
        let mut data = write_sample(6);
        data[1] = b'X';
        assert!(matches!(PackageFile::open(data), Err(SaveError::BadSignature)));

        let mut data = write_sample(6);
        data[4] = 99;
        assert!(matches!(PackageFile::open(data), Err(SaveError::BadVersion(_))));

        assert!(matches!(PackageFile::open(vec![1, 2, 3]), Err(SaveError::BadSignature)));
    }

    #[test]
    fn test_truncated_directory() {
        let data = write_sample(6);
        let cut = data[..data.len() - 10].to_vec();
        assert!(PackageFile::open(cut).unwrap_err().is_corruption());
    }

    /// Output that fails once `limit` bytes were written.
    struct FailingFile {
        written: usize,
        limit: usize,
    }

    impl Write for FailingFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingFile {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_write_failure_is_sticky() {
        let out = FailingFile { written: 0, limit: 40 };
        let mut pkg = PackageFile::create(Box::new(out), 0).unwrap();
        let mut w = pkg.create_section("map_000", false).unwrap();
        w.write(&[0u8; 100]);
        assert!(matches!(pkg.close_section(w), Err(SaveError::Io(_))));
        assert!(pkg.is_error());

        // Every later operation is a no-op that reports the first error
        assert!(matches!(pkg.create_section("skill", false), Err(SaveError::Io(_))));
        assert!(matches!(pkg.close(), Err(SaveError::Io(_))));
        assert_ne!(pkg.state(), PackageState::Closed);
    }
}
