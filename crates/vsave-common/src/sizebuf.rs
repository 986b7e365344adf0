// sizebuf.rs — section buffers written into and read out of a package
//
// A section is built in memory and handed to the container when closed, so
// the container only ever sees complete entries.

use crate::error::{check_count, SaveError, SaveResult};
use crate::savefiles::MAX_STRING_LEN;

// ============================================================
// SectionWriter
// ============================================================

/// An in-memory section being written.
#[derive(Debug)]
pub struct SectionWriter {
    name: String,
    seekable: bool,
    pub data: Vec<u8>,
}

impl SectionWriter {
    pub fn new(name: &str, seekable: bool) -> Self {
        Self {
            name: name.to_string(),
            seekable,
            data: Vec::with_capacity(256),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seekable(&self) -> bool {
        self.seekable
    }

    /// Current write offset.
    pub fn tell(&self) -> usize {
        self.data.len()
    }

    pub fn write(&mut self, src: &[u8]) {
        self.data.extend_from_slice(src);
    }

    pub fn write_byte(&mut self, c: u8) {
        self.data.push(c);
    }

    pub fn write_long(&mut self, c: i32) {
        self.data.extend_from_slice(&c.to_le_bytes());
    }

    pub fn write_int64(&mut self, c: i64) {
        self.data.extend_from_slice(&c.to_le_bytes());
    }

    pub fn write_float(&mut self, f: f32) {
        self.data.extend_from_slice(&f.to_le_bytes());
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_long(s.len() as i32);
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Overwrite a previously written long. Only seekable sections allow this.
    pub fn patch_long(&mut self, pos: usize, c: i32) -> SaveResult<()> {
        if !self.seekable {
            return Err(SaveError::NotSeekable(self.name.clone()));
        }
        if pos + 4 > self.data.len() {
            return Err(SaveError::InvalidState("patch past end of section"));
        }
        self.data[pos..pos + 4].copy_from_slice(&c.to_le_bytes());
        Ok(())
    }
}

// ============================================================
// SectionReader
// ============================================================

/// A fully decoded section being read.
#[derive(Debug, Clone)]
pub struct SectionReader {
    name: String,
    data: Vec<u8>,
    readcount: usize,
}

impl SectionReader {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
            readcount: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tell(&self) -> usize {
        self.readcount
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.readcount
    }

    pub fn at_end(&self) -> bool {
        self.readcount >= self.data.len()
    }

    pub fn seek(&mut self, pos: usize) -> SaveResult<()> {
        if pos > self.data.len() {
            return Err(SaveError::Truncated(self.name.clone()));
        }
        self.readcount = pos;
        Ok(())
    }

    pub fn read_data(&mut self, len: usize) -> SaveResult<&[u8]> {
        let start = self.readcount;
        if len > self.data.len() - start {
            return Err(SaveError::Truncated(self.name.clone()));
        }
        self.readcount += len;
        Ok(&self.data[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> SaveResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_data(N)?);
        Ok(buf)
    }

    pub fn read_byte(&mut self) -> SaveResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_long(&mut self) -> SaveResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_int64(&mut self) -> SaveResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_float(&mut self) -> SaveResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Length-prefixed UTF-8 string. Invalid UTF-8 is replaced, not rejected.
    pub fn read_string(&mut self) -> SaveResult<String> {
        let len = check_count("string length", self.read_long()?, MAX_STRING_LEN)?;
        let bytes = self.read_data(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Consume the reader and return the underlying bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_primitives() {
        let mut w = SectionWriter::new("test", false);
        w.write_byte(200);
        w.write_long(-123456);
        w.write_int64(1_700_000_000_123);
        w.write_float(3.5);
        w.write_string("MAP01");
        w.write_string("");

        let mut r = SectionReader::new("test", w.data);
        assert_eq!(r.read_byte().unwrap(), 200);
        assert_eq!(r.read_long().unwrap(), -123456);
        assert_eq!(r.read_int64().unwrap(), 1_700_000_000_123);
        assert_eq!(r.read_float().unwrap(), 3.5);
        assert_eq!(r.read_string().unwrap(), "MAP01");
        assert_eq!(r.read_string().unwrap(), "");
        assert!(r.at_end());
    }

    #[test]
    fn test_read_overrun_is_truncated() {
        let mut r = SectionReader::new("short", vec![1, 2]);
        assert!(matches!(r.read_long(), Err(SaveError::Truncated(_))));
    }

    #[test]
    fn test_negative_string_length_rejected() {
        let mut w = SectionWriter::new("s", false);
        w.write_long(-5);
        let mut r = SectionReader::new("s", w.data);
        assert!(matches!(r.read_string(), Err(SaveError::BadCount { .. })));
    }

    #[test]
    fn test_patch_requires_seekable() {
        let mut w = SectionWriter::new("flat", false);
        w.write_long(0);
        assert!(matches!(w.patch_long(0, 7), Err(SaveError::NotSeekable(_))));

        let mut w = SectionWriter::new("seek", true);
        w.write_long(0);
        w.write_long(42);
        w.patch_long(0, 7).unwrap();
        let mut r = SectionReader::new("seek", w.data);
        assert_eq!(r.read_long().unwrap(), 7);
        assert_eq!(r.read_long().unwrap(), 42);

        let mut w = SectionWriter::new("seek", true);
        w.write_byte(1);
        assert!(w.patch_long(0, 1).is_err());
    }

    #[test]
    fn test_seek() {
        let mut w = SectionWriter::new("s", true);
        w.write_long(1);
        w.write_long(2);
        let mut r = SectionReader::new("s", w.data);
        r.seek(4).unwrap();
        assert_eq!(r.read_long().unwrap(), 2);
        r.seek(0).unwrap();
        assert_eq!(r.read_long().unwrap(), 1);
        assert!(r.seek(9).is_err());
    }
}
