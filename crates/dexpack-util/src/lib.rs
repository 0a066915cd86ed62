#![forbid(unsafe_code)]
//! Hashing, filesystem, archive, and process helpers for dexpack.

pub mod archive;
pub mod error;
pub mod fs;
pub mod hash;
pub mod process;
