use std::borrow::Cow;

/// Receives the output a snippet produces through `print()` and `sys.stdout`/`sys.stderr`.
///
/// Implementations see exactly the text a terminal would, separators included.
pub trait PrintWriter {
    /// Writes text to standard output.
    fn stdout_write(&mut self, output: Cow<'_, str>);

    /// Adds a single character to standard output.
    fn stdout_push(&mut self, end: char);

    /// Writes text to standard error.
    fn stderr_write(&mut self, output: Cow<'_, str>);
}

/// `PrintWriter` that collects both streams into strings.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    stdout: String,
    stderr: String,
}

impl CapturedOutput {
    /// Creates a new empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Consumes the capture, returning `(stdout, stderr)`.
    #[must_use]
    pub fn into_output(self) -> (String, String) {
        (self.stdout, self.stderr)
    }
}

impl PrintWriter for CapturedOutput {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        self.stdout.push_str(&output);
    }

    fn stdout_push(&mut self, end: char) {
        self.stdout.push(end);
    }

    fn stderr_write(&mut self, output: Cow<'_, str>) {
        self.stderr.push_str(&output);
    }
}

/// `PrintWriter` that ignores all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) {}

    fn stdout_push(&mut self, _end: char) {}

    fn stderr_write(&mut self, _output: Cow<'_, str>) {}
}
