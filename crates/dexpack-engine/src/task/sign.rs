//! Sign the assembled package. The final package appears only on success.

use std::path::{Path, PathBuf};

use dexpack_tools::SigningKey;
use dexpack_util::fs;

use super::TaskContext;
use crate::builder::BuildVariant;
use crate::error::EngineError;

/// Side file some signers write next to their output.
fn idsig_path(package: &Path) -> PathBuf {
    let mut name = package.as_os_str().to_owned();
    name.push(".idsig");
    PathBuf::from(name)
}

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;
    let key = match ctx.variant {
        BuildVariant::Release => ctx
            .release_key
            .cloned()
            .ok_or(EngineError::MissingReleaseKey)?,
        BuildVariant::Debug => SigningKey::debug(ctx.tools.debug_keystore()?),
    };
    let signer = ctx.tools.signer()?;

    let input = project.unsigned_package();
    let output = ctx.output_path();
    let staging = output.with_extension("signing.apk");
    fs::remove_file_if_exists(&staging)?;

    ctx.output.status(
        "Signing",
        &format!("{} ({} key)", project.name(), ctx.variant),
    );
    tracing::debug!(keystore = %key.keystore.display(), alias = %key.alias, "signing");

    let signed = signer.sign(&input, &key, &staging);
    // Never leave a partially signed package behind.
    let cleanup = fs::remove_file_if_exists(&idsig_path(&staging));
    if let Err(e) = signed {
        fs::remove_file_if_exists(&staging)?;
        return Err(e.into());
    }
    cleanup?;
    fs::rename(&staging, &output)?;

    tracing::info!(output = %output.display(), "package signed");
    ctx.produced = Some(output);
    Ok(())
}
