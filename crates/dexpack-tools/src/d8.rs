//! Per-archive conversion into the runtime bytecode container (`d8`).

use std::path::{Path, PathBuf};
use std::process::Command;

use dexpack_util::process::{display_command, run_command};

use crate::error::ToolError;

/// The per-archive converter collaborator.
///
/// Implementations must be callable from several threads at once: library
/// conversions run in parallel.
pub trait Converter: Send + Sync {
    /// Convert the class archive at `input` into a container at `output`.
    ///
    /// # Errors
    /// Returns an error if the converter cannot run or exits unsuccessfully.
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ToolError>;

    /// A short directory-safe name for the settings that shape the output,
    /// such as `api21-debug`. Artifacts produced under different keys are not
    /// interchangeable, so cached conversions are kept apart by it.
    fn settings_key(&self) -> String;
}

/// How the converter lays out its output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DexLayout {
    /// One entry per class (`com/example/Foo.dex`). Mergeable.
    #[default]
    PerClass,
    /// Final `classes.dex`, `classes2.dex`, ... for packaging.
    Final,
}

/// Builder for a `d8` command line.
#[derive(Debug, Default)]
pub struct D8Command {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    libraries: Vec<PathBuf>,
    min_api: Option<u32>,
    release: bool,
    layout: DexLayout,
}

impl D8Command {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(mut self, paths: &[PathBuf]) -> Self {
        self.inputs = paths.to_vec();
        self
    }

    /// Output container; must end in `.zip` or `.jar`.
    pub fn output(mut self, path: &Path) -> Self {
        self.output = Some(path.to_path_buf());
        self
    }

    /// Bootstrap classes used for desugaring, never converted themselves.
    pub fn libraries(mut self, paths: &[PathBuf]) -> Self {
        self.libraries = paths.to_vec();
        self
    }

    pub fn min_api(mut self, level: u32) -> Self {
        self.min_api = Some(level);
        self
    }

    pub fn release(mut self, enabled: bool) -> Self {
        self.release = enabled;
        self
    }

    pub fn layout(mut self, layout: DexLayout) -> Self {
        self.layout = layout;
        self
    }

    /// # Errors
    /// Returns an error if no input or no output is set.
    pub fn build_args(&self) -> Result<Vec<String>, ToolError> {
        let Some(output) = &self.output else {
            return Err(ToolError::NoOutput {
                tool: "d8".to_owned(),
            });
        };
        if self.inputs.is_empty() {
            return Err(ToolError::NoSources);
        }

        let mut args = vec![
            if self.release { "--release" } else { "--debug" }.to_owned(),
            "--output".to_owned(),
            output.display().to_string(),
        ];
        if self.layout == DexLayout::PerClass {
            args.push("--file-per-class".to_owned());
        }
        if let Some(level) = self.min_api {
            args.push("--min-api".to_owned());
            args.push(level.to_string());
        }
        for lib in &self.libraries {
            args.push("--lib".to_owned());
            args.push(lib.display().to_string());
        }
        for input in &self.inputs {
            args.push(input.display().to_string());
        }
        Ok(args)
    }
}

/// `d8` found on disk. Within one build every archive is converted with the
/// same settings; across builds they follow the variant and `[build]`, which
/// `settings_key` reports.
#[derive(Debug, Clone)]
pub struct D8 {
    program: PathBuf,
    android_jar: Option<PathBuf>,
    min_api: u32,
    release: bool,
    layout: DexLayout,
}

impl D8 {
    pub fn new(program: &Path, min_api: u32) -> Self {
        Self {
            program: program.to_path_buf(),
            android_jar: None,
            min_api,
            release: false,
            layout: DexLayout::PerClass,
        }
    }

    pub fn android_jar(mut self, path: Option<&Path>) -> Self {
        self.android_jar = path.map(Path::to_path_buf);
        self
    }

    pub fn release(mut self, enabled: bool) -> Self {
        self.release = enabled;
        self
    }

    /// The same converter producing final packaged dex files.
    pub fn finalizing(&self) -> Self {
        Self {
            layout: DexLayout::Final,
            ..self.clone()
        }
    }
}

impl Converter for D8 {
    fn settings_key(&self) -> String {
        let mode = if self.release { "release" } else { "debug" };
        match self.layout {
            DexLayout::PerClass => format!("api{}-{mode}", self.min_api),
            DexLayout::Final => format!("api{}-{mode}-final", self.min_api),
        }
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        if !input.exists() {
            return Err(ToolError::MissingInput {
                what: "converter input".to_owned(),
                path: input.to_path_buf(),
            });
        }
        let args = D8Command::new()
            .inputs(&[input.to_path_buf()])
            .output(output)
            .libraries(self.android_jar.as_slice())
            .min_api(self.min_api)
            .release(self.release)
            .layout(self.layout)
            .build_args()?;
        if let Some(parent) = output.parent() {
            dexpack_util::fs::ensure_dir(parent)?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        tracing::debug!(command = %display_command(&cmd), "running d8");
        let result = run_command(&mut cmd)?;
        if !result.success {
            return Err(ToolError::failed("d8", &result));
        }
        if !output.exists() {
            return Err(ToolError::MissingOutput {
                tool: "d8".to_owned(),
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}
