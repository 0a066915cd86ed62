//! Error types for dexpack-tools.

use std::path::PathBuf;

/// Errors produced by tool detection and invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A required external tool could not be located.
    #[error("{tool} not found - {hint}")]
    NotFound { tool: String, hint: String },

    /// The tool exists but is not executable.
    #[error("{tool} found at {path} but is not executable - check file permissions")]
    NotExecutable { tool: String, path: PathBuf },

    /// The tool ran and exited unsuccessfully. Its output is kept verbatim.
    #[error("{tool} failed ({status}){}", format_output(.output))]
    Failed {
        tool: String,
        status: String,
        output: String,
    },

    /// The same symbol was found in two containers with different contents.
    #[error("duplicate class {symbol} in {incoming} - remove one of the libraries that defines it")]
    Collision { symbol: String, incoming: String },

    /// A tool produced no output where one was expected.
    #[error("{tool} did not produce {path}")]
    MissingOutput { tool: String, path: PathBuf },

    /// An input required by the invocation is absent.
    #[error("missing {what}: {path}")]
    MissingInput { what: String, path: PathBuf },

    /// No source files were given to the compiler.
    #[error("no source files to compile - add .java files under the source roots")]
    NoSources,

    /// An invocation was built without an output path.
    #[error("no output path specified for {tool}")]
    NoOutput { tool: String },

    /// An error propagated from dexpack-util.
    #[error("{0}")]
    Util(#[from] dexpack_util::error::UtilError),
}

impl ToolError {
    /// Build a `Failed` error from a finished command.
    pub fn failed(tool: &str, output: &dexpack_util::process::CommandOutput) -> Self {
        let status = match output.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_owned(),
        };
        let mut text = output.stderr.trim_end().to_owned();
        if text.is_empty() {
            text = output.stdout.trim_end().to_owned();
        }
        Self::Failed {
            tool: tool.to_owned(),
            status,
            output: text,
        }
    }
}

fn format_output(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(":\n{output}")
    }
}
