#![forbid(unsafe_code)]
//! The external tools the build pipeline drives, each behind a trait so the
//! pipeline can be exercised without a JDK or Android SDK.

pub mod aapt;
pub mod apk;
pub mod d8;
pub mod detect;
pub mod diagnostic;
pub mod error;
pub mod javac;
pub mod merge;
pub mod sign;

pub use aapt::{Aapt, ResourcePackager, ResourceRequest};
pub use apk::{ApkAssembler, AssembleRequest, PackageAssembler};
pub use d8::{Converter, D8};
pub use detect::{Tool, ToolInfo};
pub use diagnostic::{Diagnostic, Severity};
pub use error::ToolError;
pub use javac::{CompileOutcome, CompileRequest, Compiler, Javac};
pub use merge::{ArchiveMerger, CollisionPolicy, ContainerMerger, MergeStats};
pub use sign::{ApkSigner, Signer, SigningKey};
