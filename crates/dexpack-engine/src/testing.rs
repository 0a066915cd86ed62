//! In-process stand-ins for the external tools, counting their calls.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dexpack_tools::{
    AssembleRequest, CompileOutcome, CompileRequest, Compiler, Converter, Diagnostic,
    PackageAssembler, ResourcePackager, ResourceRequest, Severity, Signer, SigningKey, ToolError,
};
use dexpack_util::archive::{read_entries, write_entries, Entries};

use crate::toolset::Toolset;

#[derive(Debug, Clone, Default)]
pub(crate) struct Calls(Arc<AtomicUsize>);

impl Calls {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

fn write_all(path: &Path, entries: &Entries) -> Result<(), ToolError> {
    write_entries(path, entries.iter().map(|(k, v)| (k.as_str(), v.as_slice())))?;
    Ok(())
}

/// Copies each source to `<relative path>.class` under the output directory.
#[derive(Debug, Default)]
pub(crate) struct FakeCompiler {
    pub(crate) calls: Calls,
    pub(crate) fail: bool,
    pub(crate) warnings: usize,
}

impl Compiler for FakeCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        on_diagnostic: &mut dyn FnMut(Diagnostic),
    ) -> Result<CompileOutcome, ToolError> {
        self.calls.bump();
        for _ in 0..self.warnings {
            on_diagnostic(Diagnostic {
                severity: Severity::Warning,
                file: Some("src/main/java/Main.java".to_owned()),
                line: Some(3),
                column: None,
                message: "[deprecation] finalize() has been deprecated".to_owned(),
            });
        }
        if self.fail {
            on_diagnostic(Diagnostic {
                severity: Severity::Error,
                file: Some("src/main/java/Main.java".to_owned()),
                line: Some(7),
                column: Some(12),
                message: "';' expected".to_owned(),
            });
            return Ok(CompileOutcome {
                success: false,
                errors: 1,
                warnings: self.warnings,
            });
        }

        for source in &request.sources {
            let relative = request
                .sourcepath
                .iter()
                .find_map(|root| source.strip_prefix(root).ok())
                .map_or_else(
                    || PathBuf::from(source.file_name().unwrap_or_default()),
                    Path::to_path_buf,
                );
            let class = request.output_dir.join(relative).with_extension("class");
            if let Some(parent) = class.parent() {
                dexpack_util::fs::ensure_dir(parent)?;
            }
            let data = std::fs::read(source).map_err(|_| ToolError::MissingInput {
                what: "source".to_owned(),
                path: source.clone(),
            })?;
            std::fs::write(&class, data).map_err(|_| ToolError::MissingOutput {
                tool: "javac".to_owned(),
                path: class.clone(),
            })?;
        }
        Ok(CompileOutcome {
            success: true,
            errors: 0,
            warnings: self.warnings,
        })
    }
}

/// Renames `X.class` entries to `X.dex`, keeping their bytes.
#[derive(Debug, Default)]
pub(crate) struct FakeConverter {
    pub(crate) calls: Calls,
    /// Settings key; `api21-debug` when unset.
    pub(crate) settings: Option<&'static str>,
}

impl Converter for FakeConverter {
    fn settings_key(&self) -> String {
        self.settings.unwrap_or("api21-debug").to_owned()
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.calls.bump();
        let converted: Entries = read_entries(input)?
            .into_iter()
            .filter_map(|(name, data)| {
                name.strip_suffix(".class")
                    .map(|stem| (format!("{stem}.dex"), data))
            })
            .collect();
        write_all(output, &converted)
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeResources {
    pub(crate) calls: Calls,
    pub(crate) requests: Requests,
}

/// Resource requests seen by a `FakeResources`, in call order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Requests(Arc<Mutex<Vec<ResourceRequest>>>);

impl Requests {
    pub(crate) fn last(&self) -> Option<ResourceRequest> {
        self.0.lock().ok().and_then(|seen| seen.last().cloned())
    }
}

impl ResourcePackager for FakeResources {
    fn package_resources(&self, request: &ResourceRequest) -> Result<(), ToolError> {
        self.calls.bump();
        if let Ok(mut seen) = self.requests.0.lock() {
            seen.push(request.clone());
        }
        dexpack_util::fs::ensure_dir(&request.generated_source_dir)?;
        let mut entries = Entries::new();
        entries.insert("resources.arsc".to_owned(), b"table".to_vec());
        write_all(&request.output, &entries)
    }
}

/// Unions the resource table and the converted container.
#[derive(Debug, Default)]
pub(crate) struct FakeAssembler {
    pub(crate) calls: Calls,
}

impl PackageAssembler for FakeAssembler {
    fn assemble(&self, request: &AssembleRequest) -> Result<(), ToolError> {
        self.calls.bump();
        let mut entries = read_entries(&request.resources)?;
        entries.extend(read_entries(&request.container)?);
        write_all(&request.output, &entries)
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeSigner {
    pub(crate) calls: Calls,
    pub(crate) fail: bool,
}

impl Signer for FakeSigner {
    fn sign(&self, input: &Path, key: &SigningKey, output: &Path) -> Result<(), ToolError> {
        self.calls.bump();
        if self.fail {
            // A signer may leave a partial file before failing.
            std::fs::write(output, b"partial").map_err(|_| ToolError::MissingOutput {
                tool: "apksigner".to_owned(),
                path: output.to_path_buf(),
            })?;
            return Err(ToolError::Failed {
                tool: "apksigner".to_owned(),
                status: "exit code 1".to_owned(),
                output: "Failed to load signer \"signer #1\"".to_owned(),
            });
        }
        let mut entries = read_entries(input)?;
        entries.insert(
            "META-INF/CERT.SF".to_owned(),
            key.alias.as_bytes().to_vec(),
        );
        write_all(output, &entries)
    }
}

/// Call counters for every fake in a `FakeTools` set.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeCalls {
    pub(crate) compile: Calls,
    pub(crate) convert: Calls,
    pub(crate) resources: Calls,
    pub(crate) resource_requests: Requests,
    pub(crate) assemble: Calls,
    pub(crate) sign: Calls,
}

/// Failure switches for `fake_toolset`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FakeFailures {
    pub(crate) compile: bool,
    pub(crate) sign: bool,
}

/// A complete toolset of fakes sharing `calls`.
pub(crate) fn fake_toolset(calls: &FakeCalls, fail: FakeFailures, keystore: &Path) -> Toolset {
    Toolset::new()
        .with_compiler(FakeCompiler {
            calls: calls.compile.clone(),
            fail: fail.compile,
            warnings: 0,
        })
        .with_converter(FakeConverter {
            calls: calls.convert.clone(),
            settings: None,
        })
        .with_resource_packager(FakeResources {
            calls: calls.resources.clone(),
            requests: calls.resource_requests.clone(),
        })
        .with_assembler(FakeAssembler {
            calls: calls.assemble.clone(),
        })
        .with_signer(FakeSigner {
            calls: calls.sign.clone(),
            fail: fail.sign,
        })
        .with_debug_keystore(keystore)
}

/// Write a jar holding `classes` (dotted names), each with `body` as bytes.
pub(crate) fn write_jar(path: &Path, classes: &[&str], body: &[u8]) {
    let names: Vec<String> = classes
        .iter()
        .map(|c| format!("{}.class", c.replace('.', "/")))
        .collect();
    let mut entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), body)).collect();
    entries.push(("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n".as_slice()));
    if let Err(e) = write_entries(path, entries) {
        panic!("cannot write test jar {}: {e}", path.display());
    }
}
