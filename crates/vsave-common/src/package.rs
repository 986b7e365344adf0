// package.rs — PackageStream: named sections inside one save container
//
// Two backends implement the same contract: the flat legacy blob
// (legacy.rs) and the multi-entry package (pak.rs). Callers only branch on
// the format here, when a container is created or opened.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use crate::common::com_dprintf;
use crate::error::{SaveError, SaveResult};
use crate::legacy::LegacyPackage;
use crate::pak::PackageFile;
use crate::savefiles::{IDPACKAGEHEADER, LEGACY_SIGNATURE};
use crate::sizebuf::{SectionReader, SectionWriter};
use crate::strings::{StringInterner, StringTable};

/// Container backend of a save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Legacy,
    Package,
}

/// Lifecycle of a container: `Closed -> Open -> SectionOpen -> Open -> Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageState {
    Closed,
    Open,
    SectionOpen,
}

/// Writable and seekable output, boxed by the package backend.
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

/// A save container exposing independently named sections.
pub trait PackageStream {
    fn format(&self) -> SaveFormat;

    fn state(&self) -> PackageState;

    /// True once any failure has poisoned the container.
    fn is_error(&self) -> bool;

    /// Start a new section. Fails while another section is open for writing.
    fn create_section(&mut self, name: &str, seekable: bool) -> SaveResult<SectionWriter>;

    /// Finish the section currently open for writing and store it.
    fn close_section(&mut self, section: SectionWriter) -> SaveResult<()>;

    /// Open a stored section for reading. Missing sections are `NotFound`.
    fn open_section(&mut self, name: &str) -> SaveResult<SectionReader>;

    fn has_section(&self, name: &str) -> bool;

    fn section_names(&self) -> Vec<String>;

    /// Attach a string interner whose table is written as the last entry.
    fn attach_strings(&mut self, strings: StringInterner) -> SaveResult<()>;

    /// Read back the string table stored by `attach_strings`, if any.
    fn load_strings(&mut self) -> SaveResult<Option<StringTable>>;

    /// Flush everything and close. Fails if a section is still open.
    fn close(&mut self) -> SaveResult<()>;
}

// ============================================================
// Shared lifecycle and sticky error bookkeeping
// ============================================================

/// Which way a container was opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageMode {
    Read,
    Write,
}

/// State machine plus sticky error shared by both backends.
#[derive(Debug)]
pub struct PackageGuard {
    pub mode: PackageMode,
    state: PackageState,
    open_write: Option<String>,
    error: Option<SaveError>,
}

impl PackageGuard {
    pub fn new(mode: PackageMode) -> Self {
        Self {
            mode,
            state: PackageState::Open,
            open_write: None,
            error: None,
        }
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record `e` as the sticky error (the first one wins) and return it.
    pub fn fail(&mut self, e: SaveError) -> SaveError {
        if self.error.is_none() {
            com_dprintf(&format!("package error: {}\n", e));
            self.error = Some(e.clone());
        }
        e
    }

    /// Fail fast with the sticky error, or if the container is closed.
    pub fn check(&self) -> SaveResult<()> {
        if let Some(ref e) = self.error {
            return Err(e.clone());
        }
        if self.state == PackageState::Closed {
            return Err(SaveError::InvalidState("package is closed"));
        }
        Ok(())
    }

    /// Validate and record the start of a write section.
    pub fn begin_section(&mut self, name: &str) -> SaveResult<()> {
        self.check()?;
        if self.mode != PackageMode::Write {
            return Err(self.fail(SaveError::InvalidState("package is opened for reading")));
        }
        if let Some(ref open) = self.open_write {
            let e = SaveError::SectionBusy {
                open: open.clone(),
                wanted: name.to_string(),
            };
            return Err(self.fail(e));
        }
        self.open_write = Some(name.to_string());
        self.state = PackageState::SectionOpen;
        Ok(())
    }

    /// Validate that `name` is the section open for writing and release it.
    pub fn end_section(&mut self, name: &str) -> SaveResult<()> {
        self.check()?;
        match self.open_write {
            None => Err(self.fail(SaveError::NoSectionOpen)),
            Some(ref open) if open != name => {
                Err(self.fail(SaveError::SectionMismatch(name.to_string())))
            }
            Some(_) => {
                self.open_write = None;
                self.state = PackageState::Open;
                Ok(())
            }
        }
    }

    /// Validate a read request.
    pub fn begin_read(&mut self, name: &str) -> SaveResult<()> {
        self.check()?;
        if let Some(ref open) = self.open_write {
            let e = SaveError::SectionBusy {
                open: open.clone(),
                wanted: name.to_string(),
            };
            return Err(self.fail(e));
        }
        if self.mode != PackageMode::Read {
            return Err(self.fail(SaveError::InvalidState("package is opened for writing")));
        }
        Ok(())
    }

    /// Validate a close request; a dangling write section poisons the container.
    pub fn begin_close(&mut self) -> SaveResult<()> {
        self.check()?;
        if self.open_write.is_some() {
            return Err(self.fail(SaveError::InvalidState("section still open at close")));
        }
        Ok(())
    }

    pub fn finish_close(&mut self) {
        self.state = PackageState::Closed;
    }
}

// ============================================================
// In-memory output
// ============================================================

/// Cloneable in-memory output; clones share one buffer, so the bytes a boxed
/// container wrote can be taken back after it is closed.
#[derive(Clone, Debug, Default)]
pub struct MemFile(Rc<RefCell<Cursor<Vec<u8>>>>);

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn take(&self) -> Vec<u8> {
        self.0.borrow().get_ref().clone()
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.borrow_mut().seek(pos)
    }
}

// ============================================================
// Backend selection
// ============================================================

/// Create a new container of `format` writing into `out`.
pub fn create_package(
    format: SaveFormat,
    out: Box<dyn WriteSeek>,
    compression_level: u32,
) -> SaveResult<Box<dyn PackageStream>> {
    Ok(match format {
        SaveFormat::Package => Box::new(PackageFile::create(out, compression_level)?),
        SaveFormat::Legacy => Box::new(LegacyPackage::create(out, compression_level)),
    })
}

/// Create a container file at `path`, truncating any previous content.
pub fn create_package_file(
    path: &Path,
    format: SaveFormat,
    compression_level: u32,
) -> SaveResult<Box<dyn PackageStream>> {
    let f = File::create(path)?;
    create_package(format, Box::new(BufWriter::new(f)), compression_level)
}

/// Guess the backend from the first bytes of a save.
pub fn detect_format(data: &[u8]) -> Option<SaveFormat> {
    if data.len() >= 4 && data[..4] == IDPACKAGEHEADER.to_le_bytes() {
        return Some(SaveFormat::Package);
    }
    let sig = LEGACY_SIGNATURE.as_bytes();
    if data.len() > sig.len() && data.starts_with(sig) && data[sig.len()] == 0 {
        return Some(SaveFormat::Legacy);
    }
    None
}

/// Open a container from memory with whichever backend its signature names.
pub fn open_package(data: Vec<u8>) -> SaveResult<Box<dyn PackageStream>> {
    match detect_format(&data) {
        Some(SaveFormat::Package) => Ok(Box::new(PackageFile::open(data)?)),
        Some(SaveFormat::Legacy) => Ok(Box::new(LegacyPackage::open(data)?)),
        None => Err(SaveError::BadSignature),
    }
}

pub fn open_package_file(path: &Path) -> SaveResult<Box<dyn PackageStream>> {
    open_package(fs::read(path)?)
}
