// manifest.rs — content manifest recorded with every save
//
// Identifies the game content a save was made against. A differing hash is
// only reported; a differing layout version means saved objects can no
// longer be decoded and the load is refused.

use crate::common::com_warning;
use crate::error::{check_count, SaveError, SaveResult};
use crate::md4::{com_block_checksum, ContentDigest};
use crate::sizebuf::{SectionReader, SectionWriter};

/// Bumped whenever a content class changes the fields it serializes.
pub const CONTENT_LAYOUT_VERSION: i32 = 1;

const MAX_MANIFEST_FILES: i32 = 4096;

/// One loaded content file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub name: String,
    pub checksum: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentManifest {
    pub layout_version: i32,
    pub files: Vec<ContentFile>,
}

impl Default for ContentManifest {
    fn default() -> Self {
        Self::new(CONTENT_LAYOUT_VERSION)
    }
}

impl ContentManifest {
    pub fn new(layout_version: i32) -> Self {
        Self {
            layout_version,
            files: Vec::new(),
        }
    }

    /// Register a content file by its contents.
    pub fn add_file(&mut self, name: &str, data: &[u8]) {
        self.add_checksum(name, com_block_checksum(data));
    }

    pub fn add_checksum(&mut self, name: &str, checksum: u32) {
        self.files.push(ContentFile {
            name: name.to_string(),
            checksum,
        });
    }

    /// MD4 over the layout version and every (name, checksum) pair, folded
    /// to 32 bits.
    pub fn hash(&self) -> u32 {
        let mut d = ContentDigest::new();
        d.long(self.layout_version);
        for f in &self.files {
            d.text(&f.name).long(f.checksum as i32);
        }
        d.finish()
    }

    pub fn write(&self, w: &mut SectionWriter) {
        w.write_long(self.layout_version);
        w.write_long(self.hash() as i32);
        w.write_long(self.files.len() as i32);
        for f in &self.files {
            w.write_string(&f.name);
            w.write_long(f.checksum as i32);
        }
    }

    pub fn read(r: &mut SectionReader) -> SaveResult<Self> {
        let layout_version = r.read_long()?;
        let stored_hash = r.read_long()? as u32;
        let count = check_count("manifest file", r.read_long()?, MAX_MANIFEST_FILES)?;
        let mut manifest = Self::new(layout_version);
        for _ in 0..count {
            let name = r.read_string()?;
            let checksum = r.read_long()? as u32;
            manifest.add_checksum(&name, checksum);
        }
        if manifest.hash() != stored_hash {
            return Err(SaveError::Corrupt("content manifest hash does not match its entries".into()));
        }
        Ok(manifest)
    }

    /// Compare a manifest read from a save against the running content.
    /// Returns `Ok(false)` when the content differs but the save can still be
    /// decoded.
    pub fn check_saved(&self, saved: &ContentManifest) -> SaveResult<bool> {
        if saved.layout_version != self.layout_version {
            return Err(SaveError::ContentLayout {
                saved: saved.layout_version,
                current: self.layout_version,
            });
        }
        if saved.hash() == self.hash() {
            return Ok(true);
        }

        com_warning(&format!(
            "savegame was made with different content (saved {:08x}, current {:08x})\n",
            saved.hash(),
            self.hash()
        ));
        for f in &saved.files {
            match self.files.iter().find(|c| c.name == f.name) {
                None => com_warning(&format!("  {} is no longer loaded\n", f.name)),
                Some(c) if c.checksum != f.checksum => {
                    com_warning(&format!("  {} has changed\n", f.name))
                }
                Some(_) => {}
            }
        }
        Ok(false)
    }
}
