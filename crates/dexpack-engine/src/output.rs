//! Progress output for a build: cargo-style status lines on an injectable
//! pair of streams.

use std::io::Write;

/// Where a build writes progress. Status lines always go to `stderr`;
/// detail lines only when verbose.
pub struct BuildOutput {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
    verbose: bool,
}

impl BuildOutput {
    pub fn new(stdout: Box<dyn Write + Send>, stderr: Box<dyn Write + Send>) -> Self {
        Self {
            stdout,
            stderr,
            verbose: false,
        }
    }

    /// The process's own stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    /// Discard everything.
    pub fn sink() -> Self {
        Self::new(Box::new(std::io::sink()), Box::new(std::io::sink()))
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// A right-aligned status line such as `   Compiling hello`.
    pub fn status(&mut self, verb: &str, message: &str) {
        // Progress output is best-effort; a closed stream must not fail the build.
        let _ = writeln!(self.stderr, "{verb:>12} {message}");
    }

    /// A line shown only in verbose mode.
    pub fn detail(&mut self, message: &str) {
        if self.verbose {
            let _ = writeln!(self.stderr, "{message}");
        }
    }

    /// A line of program output (e.g. the final artifact path).
    pub fn println(&mut self, message: &str) {
        let _ = writeln!(self.stdout, "{message}");
    }

    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
        let _ = self.stderr.flush();
    }
}

impl Default for BuildOutput {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for BuildOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOutput")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// An in-memory stream that can be cloned and read back, for tests and
/// embedders that capture build output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let mut buf = self
            .0
            .lock()
            .map_err(|_| std::io::Error::other("output buffer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(verbose: bool) -> (BuildOutput, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let mut output = BuildOutput::new(Box::new(out.clone()), Box::new(err.clone()));
        output.set_verbose(verbose);
        (output, out, err)
    }

    #[test]
    fn status_is_right_aligned_on_stderr() {
        let (mut output, out, err) = captured(false);
        output.status("Compiling", "hello");
        output.status("Finished", "debug build");
        assert_eq!(
            err.contents(),
            "   Compiling hello\n    Finished debug build\n"
        );
        assert!(out.contents().is_empty());
    }

    #[test]
    fn detail_only_when_verbose() {
        let (mut quiet, _, quiet_err) = captured(false);
        quiet.detail("javac -d build/classes");
        assert!(quiet_err.contents().is_empty());

        let (mut loud, _, loud_err) = captured(true);
        loud.detail("javac -d build/classes");
        assert_eq!(loud_err.contents(), "javac -d build/classes\n");
    }

    #[test]
    fn println_goes_to_stdout() {
        let (mut output, out, err) = captured(false);
        output.println("build/output/hello.apk");
        assert_eq!(out.contents(), "build/output/hello.apk\n");
        assert!(err.contents().is_empty());
    }
}
