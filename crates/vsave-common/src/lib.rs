#![allow(clippy::new_without_default, clippy::len_without_is_empty)]

pub mod common;
pub mod cvar;
pub mod error;
pub mod crc;
pub mod md4;
pub mod compression;
pub mod savefiles;
pub mod sizebuf;
pub mod strings;
pub mod manifest;
pub mod package;
pub mod pak;
pub mod legacy;

pub use error::{SaveError, SaveResult};
pub use package::{PackageStream, SaveFormat};
