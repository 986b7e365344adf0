// legacy.rs — flat single-stream save backend
//
// The whole save is one body, optionally deflated as a unit, behind a fixed
// text signature. Sections are simulated as tagged records inside the body:
//
//   SECTION_TAG  name(string)  length(long)  bytes ...   (repeated)
//   SECTION_END

use std::collections::HashMap;

use crate::common::{com_dprintf, from_fixed, to_fixed};
use crate::compression::{compress_if_smaller, decompress_with_size, MAX_DECOMPRESS_SIZE};
use crate::error::{SaveError, SaveResult};
use crate::package::{PackageGuard, PackageMode, PackageState, PackageStream, SaveFormat, WriteSeek};
use crate::savefiles::{
    LEGACY_FLAG_COMPRESSED, LEGACY_HEADER_SIZE, LEGACY_SIGNATURE, LEGACY_SIGNATURE_LEN,
    LEGACY_VERSION, LEGACY_VERSION_LEN, SECTION_END, SECTION_TAG,
};
use crate::sizebuf::{SectionReader, SectionWriter};
use crate::strings::{StringInterner, StringTable};

/// Location of one record's payload inside the decoded body.
#[derive(Debug, Clone, Copy)]
struct LegacyRecord {
    offset: usize,
    len: usize,
}

pub struct LegacyPackage {
    guard: PackageGuard,
    out: Option<Box<dyn WriteSeek>>,
    body: SectionWriter,
    /// Record names in stream order
    names: Vec<String>,
    records: HashMap<String, LegacyRecord>,
    compression_level: u32,
}

impl std::fmt::Debug for LegacyPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyPackage").finish_non_exhaustive()
    }
}

impl LegacyPackage {
    pub fn create(out: Box<dyn WriteSeek>, compression_level: u32) -> Self {
        Self {
            guard: PackageGuard::new(PackageMode::Write),
            out: Some(out),
            body: SectionWriter::new("legacy", false),
            names: Vec::new(),
            records: HashMap::new(),
            compression_level,
        }
    }

    /// Validate the header, inflate the body and index its records.
    pub fn open(data: Vec<u8>) -> SaveResult<Self> {
        if data.len() < LEGACY_HEADER_SIZE {
            return Err(SaveError::BadSignature);
        }
        if from_fixed(&data[..LEGACY_SIGNATURE_LEN]) != LEGACY_SIGNATURE {
            return Err(SaveError::BadSignature);
        }
        let version = from_fixed(&data[LEGACY_SIGNATURE_LEN..LEGACY_SIGNATURE_LEN + LEGACY_VERSION_LEN]);
        if version != LEGACY_VERSION {
            return Err(SaveError::BadVersion(version));
        }

        let mut header = SectionReader::new(
            "legacy header",
            data[LEGACY_SIGNATURE_LEN + LEGACY_VERSION_LEN..LEGACY_HEADER_SIZE].to_vec(),
        );
        let flags = header.read_byte()?;
        let body_size = header.read_long()?;
        let stored_size = header.read_long()?;
        if body_size < 0
            || stored_size < 0
            || body_size as usize > MAX_DECOMPRESS_SIZE
            || LEGACY_HEADER_SIZE + stored_size as usize != data.len()
        {
            return Err(SaveError::Corrupt("legacy header sizes do not match".into()));
        }

        let stored = &data[LEGACY_HEADER_SIZE..];
        let body = if flags & LEGACY_FLAG_COMPRESSED != 0 {
            decompress_with_size(stored, body_size as usize)?
        } else if stored_size == body_size {
            stored.to_vec()
        } else {
            return Err(SaveError::Corrupt("legacy body size mismatch".into()));
        };

        let mut names = Vec::new();
        let mut records = HashMap::new();
        let mut r = SectionReader::new("legacy", body);
        loop {
            match r.read_long()? {
                SECTION_END => break,
                SECTION_TAG => {}
                tag => return Err(SaveError::Corrupt(format!("bad section tag {:#x}", tag))),
            }
            let name = r.read_string()?;
            let len = r.read_long()?;
            if len < 0 || len as usize > r.remaining() {
                return Err(SaveError::Truncated(name));
            }
            let offset = r.tell();
            r.seek(offset + len as usize)?;
            names.push(name.clone());
            records.insert(name, LegacyRecord { offset, len: len as usize });
        }

        com_dprintf(&format!("opened legacy save ({} sections)\n", names.len()));
        let mut decoded = SectionWriter::new("legacy", false);
        decoded.data = r.into_data();
        Ok(Self {
            guard: PackageGuard::new(PackageMode::Read),
            out: None,
            body: decoded,
            names,
            records,
            compression_level: 0,
        })
    }

    /// Compress the body and write header plus body to the output.
    fn flush_body(&mut self) -> SaveResult<()> {
        self.body.write_long(SECTION_END);
        let raw = &self.body.data;
        let compressed = compress_if_smaller(raw, self.compression_level)?;

        let mut header = SectionWriter::new("legacy header", false);
        header.write(&to_fixed::<LEGACY_SIGNATURE_LEN>(LEGACY_SIGNATURE));
        header.write(&to_fixed::<LEGACY_VERSION_LEN>(LEGACY_VERSION));
        let stored: &[u8] = match compressed {
            Some(ref c) => {
                header.write_byte(LEGACY_FLAG_COMPRESSED);
                c
            }
            None => {
                header.write_byte(0);
                raw
            }
        };
        header.write_long(raw.len() as i32);
        header.write_long(stored.len() as i32);

        let out = self
            .out
            .as_mut()
            .ok_or(SaveError::InvalidState("package is opened for reading"))?;
        out.write_all(&header.data)?;
        out.write_all(stored)?;
        out.flush()?;
        Ok(())
    }
}

impl PackageStream for LegacyPackage {
    fn format(&self) -> SaveFormat {
        SaveFormat::Legacy
    }

    fn state(&self) -> PackageState {
        self.guard.state()
    }

    fn is_error(&self) -> bool {
        self.guard.is_error()
    }

    fn create_section(&mut self, name: &str, seekable: bool) -> SaveResult<SectionWriter> {
        self.guard.check()?;
        if self.records.contains_key(name) {
            return Err(self.guard.fail(SaveError::InvalidState("duplicate section name")));
        }
        self.guard.begin_section(name)?;
        Ok(SectionWriter::new(name, seekable))
    }

    fn close_section(&mut self, section: SectionWriter) -> SaveResult<()> {
        self.guard.end_section(section.name())?;
        self.body.write_long(SECTION_TAG);
        self.body.write_string(section.name());
        self.body.write_long(section.data.len() as i32);
        let offset = self.body.tell();
        self.body.write(&section.data);

        self.names.push(section.name().to_string());
        self.records.insert(
            section.name().to_string(),
            LegacyRecord {
                offset,
                len: section.data.len(),
            },
        );
        Ok(())
    }

    fn open_section(&mut self, name: &str) -> SaveResult<SectionReader> {
        self.guard.begin_read(name)?;
        let rec = self
            .records
            .get(name)
            .copied()
            .ok_or_else(|| SaveError::NotFound(name.to_string()))?;
        let bytes = self.body.data[rec.offset..rec.offset + rec.len].to_vec();
        Ok(SectionReader::new(name, bytes))
    }

    fn has_section(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    fn section_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn attach_strings(&mut self, _strings: StringInterner) -> SaveResult<()> {
        self.guard.check()?;
        Err(SaveError::Unsupported("legacy saves do not support string interning"))
    }

    fn load_strings(&mut self) -> SaveResult<Option<StringTable>> {
        Ok(None)
    }

    fn close(&mut self) -> SaveResult<()> {
        self.guard.begin_close()?;
        if self.guard.mode == PackageMode::Write {
            if let Err(e) = self.flush_body() {
                return Err(self.guard.fail(e));
            }
        }
        self.guard.finish_close();
        Ok(())
    }
}
