// strings.rs — string interning for string-valued save fields
//
// Index 0 always stands for the empty string and is never stored on disk.

use std::collections::HashMap;

use crate::error::{check_count, SaveError, SaveResult};
use crate::savefiles::MAX_SAVE_STRINGS;
use crate::sizebuf::{SectionReader, SectionWriter};

/// Read side: a plain index -> text table.
#[derive(Debug, Clone, PartialEq)]
pub struct StringTable {
    // strings[0] is the reserved empty string
    strings: Vec<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            strings: vec![String::new()],
        }
    }

    /// Number of non-empty entries.
    pub fn len(&self) -> usize {
        self.strings.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an index read from a save. Out of range is corruption.
    pub fn resolve(&self, index: i32) -> SaveResult<&str> {
        if index < 0 {
            return Err(SaveError::BadIndex { table: "string", index });
        }
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(SaveError::BadIndex { table: "string", index })
    }

    /// Non-empty entries in index order (index 1 first).
    pub fn entries(&self) -> &[String] {
        self.strings.get(1..).unwrap_or(&[])
    }

    /// Serialize as `count` followed by the non-empty entries.
    pub fn write(&self, w: &mut SectionWriter) {
        w.write_long(self.len() as i32);
        for s in self.entries() {
            w.write_string(s);
        }
    }

    pub fn read(r: &mut SectionReader) -> SaveResult<Self> {
        let count = check_count("string table", r.read_long()?, MAX_SAVE_STRINGS)?;
        let mut table = StringTable::new();
        table.strings.reserve(count);
        for _ in 0..count {
            table.strings.push(r.read_string()?);
        }
        Ok(table)
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Write side: deduplicates text into a `StringTable`.
#[derive(Debug, Clone)]
pub struct StringInterner {
    table: StringTable,
    index: HashMap<String, i32>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            table: StringTable::new(),
            index: HashMap::new(),
        }
    }

    /// Return the index of `text`, appending it if it was not seen yet.
    pub fn intern(&mut self, text: &str) -> i32 {
        if text.is_empty() {
            return 0;
        }
        if let Some(&idx) = self.index.get(text) {
            return idx;
        }
        let idx = self.table.strings.len() as i32;
        self.table.strings.push(text.to_string());
        self.index.insert(text.to_string(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &StringTable {
        &self.table
    }

    /// Drop the deduplication index and keep the table.
    pub fn into_table(self) -> StringTable {
        self.table
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedups() {
        let mut si = StringInterner::new();
        let a = si.intern("door");
        let indices: Vec<i32> = (0..10).map(|_| si.intern("door")).collect();
        assert!(indices.iter().all(|&i| i == a));
        assert_eq!(si.len(), 1);
    }

    #[test]
    fn test_empty_string_is_zero() {
        let mut si = StringInterner::new();
        assert_eq!(si.intern(""), 0);
        assert_eq!(si.len(), 0);
        assert_eq!(si.table().resolve(0).unwrap(), "");

        let mut from_default = StringInterner::default();
        assert_eq!(from_default.intern("first"), 1);
        assert_eq!(StringTable::default().resolve(0).unwrap(), "");
    }

    #[test]
    fn test_counts_distinct_strings() {
        let mut si = StringInterner::new();
        let words = ["a", "b", "c", "a", "b", "d", "", "e", "e"];
        for w in words {
            si.intern(w);
        }
        assert_eq!(si.len(), 5);
    }

    #[test]
    fn test_resolve_out_of_range_is_corruption() {
        let table = StringTable::new();
        assert!(matches!(
            table.resolve(3),
            Err(SaveError::BadIndex { table: "string", index: 3 })
        ));
        assert!(table.resolve(-1).unwrap_err().is_corruption());
    }

    #[test]
    fn test_table_roundtrip() {
        let mut si = StringInterner::new();
        let key = si.intern("key_red");
        si.intern("exit");

        let mut w = SectionWriter::new("strings", false);
        si.table().write(&mut w);
        let table = StringTable::read(&mut SectionReader::new("strings", w.data)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve(key).unwrap(), "key_red");
        assert_eq!(table.entries(), ["key_red", "exit"]);
    }
}
