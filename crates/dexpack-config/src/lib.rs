#![forbid(unsafe_code)]
//! Parse `dexpack.toml` and describe a project's on-disk layout.

pub mod android_manifest;
pub mod manifest;
pub mod project;

pub use manifest::{BuildKind, Manifest};
pub use project::{ProjectDescriptor, ResourceLibrary};
