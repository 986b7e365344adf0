// error.rs — save/load error taxonomy

use std::io;
use std::sync::Arc;

/// Result alias used by every save/load operation.
pub type SaveResult<T> = Result<T, SaveError>;

/// Everything that can go wrong while writing or reading a save.
///
/// The type is `Clone` so a container can keep the first failure as its
/// sticky error state and hand copies back on every later call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    #[error("bad savegame signature")]
    BadSignature,

    #[error("unsupported savegame version {0}")]
    BadVersion(String),

    #[error("corrupt savegame: {0}")]
    Corrupt(String),

    #[error("bad {table} reference index {index}")]
    BadIndex { table: &'static str, index: i32 },

    #[error("implausible {what} count {count}")]
    BadCount { what: &'static str, count: i32 },

    #[error("bad segment marker: expected {expected}, found {found}")]
    Segment { expected: i32, found: i32 },

    #[error("unexpected end of section '{0}'")]
    Truncated(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("section '{0}' not found")]
    NotFound(String),

    #[error("cannot open section '{wanted}' while '{open}' is open for writing")]
    SectionBusy { open: String, wanted: String },

    #[error("section '{0}' is not the section open for writing")]
    SectionMismatch(String),

    #[error("no section is open for writing")]
    NoSectionOpen,

    #[error("section '{0}' was not created seekable")]
    NotSeekable(String),

    #[error("invalid container state: {0}")]
    InvalidState(&'static str),

    #[error("entry name '{0}' is too long")]
    NameTooLong(String),

    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("content layout changed (saved {saved}, current {current})")]
    ContentLayout { saved: i32, current: i32 },

    #[error("{0}")]
    Unsupported(&'static str),

    #[error("no savegame in slot '{0}'")]
    NoSuchSlot(String),
}

impl SaveError {
    /// True for the fatal load-time corruption class: the save cannot be
    /// trusted and the load must be aborted as a whole.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SaveError::BadSignature
                | SaveError::BadVersion(_)
                | SaveError::Corrupt(_)
                | SaveError::BadIndex { .. }
                | SaveError::BadCount { .. }
                | SaveError::Segment { .. }
                | SaveError::Truncated(_)
                | SaveError::Decompress(_)
                | SaveError::UnknownClass(_)
        )
    }

    /// True when the error only says a looked-up section is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SaveError::NotFound(_))
    }
}

impl From<io::Error> for SaveError {
    fn from(e: io::Error) -> Self {
        SaveError::Io(Arc::new(e))
    }
}

/// Reject a count read from a save that is negative or above `max`.
pub fn check_count(what: &'static str, count: i32, max: i32) -> SaveResult<usize> {
    if count < 0 || count > max {
        return Err(SaveError::BadCount { what, count });
    }
    Ok(count as usize)
}
