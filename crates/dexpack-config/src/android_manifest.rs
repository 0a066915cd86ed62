//! Minimal reading of `AndroidManifest.xml`.

use std::path::Path;

/// Read the `package` attribute of the root `<manifest>` element.
///
/// Returns `Ok(None)` when the attribute is absent.
///
/// # Errors
/// Returns an error if the file cannot be read, is not well-formed XML, or its
/// root element is not `<manifest>`.
pub fn read_package(path: &Path) -> Result<Option<String>, AndroidManifestError> {
    let content = std::fs::read_to_string(path).map_err(|e| AndroidManifestError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    package_from_str(&content).map_err(|message| AndroidManifestError::Invalid {
        path: path.display().to_string(),
        message,
    })
}

fn package_from_str(xml: &str) -> Result<Option<String>, String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| e.to_string())?;
    let root = doc.root_element();
    if root.tag_name().name() != "manifest" {
        return Err(format!(
            "root element is <{}>, expected <manifest>",
            root.tag_name().name()
        ));
    }
    Ok(root
        .attribute("package")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned))
}

#[derive(Debug, thiserror::Error)]
pub enum AndroidManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid AndroidManifest.xml at {path}: {message}")]
    Invalid { path: String, message: String },
}
