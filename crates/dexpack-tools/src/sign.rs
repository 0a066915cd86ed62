//! Package signing (`apksigner`).

use std::path::{Path, PathBuf};
use std::process::Command;

use dexpack_util::process::{display_command, run_command};

use crate::error::ToolError;

/// Well-known password of the SDK debug keystore.
pub const DEBUG_KEY_PASSWORD: &str = "android";
/// Well-known alias inside the SDK debug keystore.
pub const DEBUG_KEY_ALIAS: &str = "androiddebugkey";

const STORE_PASS_ENV: &str = "DEXPACK_SIGN_STORE_PASS";
const KEY_PASS_ENV: &str = "DEXPACK_SIGN_KEY_PASS";

/// Key material for signing. Passwords never appear in `Debug` output or on
/// the signer's command line.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub keystore: PathBuf,
    pub alias: String,
    pub store_password: String,
    pub key_password: String,
}

impl SigningKey {
    /// The SDK debug key stored at `keystore`.
    pub fn debug(keystore: &Path) -> Self {
        Self {
            keystore: keystore.to_path_buf(),
            alias: DEBUG_KEY_ALIAS.to_owned(),
            store_password: DEBUG_KEY_PASSWORD.to_owned(),
            key_password: DEBUG_KEY_PASSWORD.to_owned(),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("store_password", &"<redacted>")
            .field("key_password", &"<redacted>")
            .finish()
    }
}

/// The signer collaborator.
pub trait Signer: Send + Sync {
    /// Sign `input` with `key`, writing the signed package to `output`.
    ///
    /// # Errors
    /// Returns an error for a missing keystore, wrong credentials, or a
    /// corrupt package.
    fn sign(&self, input: &Path, key: &SigningKey, output: &Path) -> Result<(), ToolError>;
}

/// `apksigner` found on disk.
#[derive(Debug, Clone)]
pub struct ApkSigner {
    program: PathBuf,
}

impl ApkSigner {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }

    /// The argument list for signing. Passwords are passed by environment.
    pub fn build_args(input: &Path, key: &SigningKey, output: &Path) -> Vec<String> {
        vec![
            "sign".to_owned(),
            "--ks".to_owned(),
            key.keystore.display().to_string(),
            "--ks-key-alias".to_owned(),
            key.alias.clone(),
            "--ks-pass".to_owned(),
            format!("env:{STORE_PASS_ENV}"),
            "--key-pass".to_owned(),
            format!("env:{KEY_PASS_ENV}"),
            "--out".to_owned(),
            output.display().to_string(),
            input.display().to_string(),
        ]
    }
}

impl Signer for ApkSigner {
    fn sign(&self, input: &Path, key: &SigningKey, output: &Path) -> Result<(), ToolError> {
        if !key.keystore.is_file() {
            return Err(ToolError::MissingInput {
                what: "keystore".to_owned(),
                path: key.keystore.clone(),
            });
        }
        if !input.is_file() {
            return Err(ToolError::MissingInput {
                what: "unsigned package".to_owned(),
                path: input.to_path_buf(),
            });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(Self::build_args(input, key, output))
            .env(STORE_PASS_ENV, &key.store_password)
            .env(KEY_PASS_ENV, &key.key_password);
        tracing::debug!(command = %display_command(&cmd), "running apksigner");
        let result = run_command(&mut cmd)?;
        if !result.success {
            return Err(ToolError::failed("apksigner", &result));
        }
        if !output.is_file() {
            return Err(ToolError::MissingOutput {
                tool: "apksigner".to_owned(),
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}
