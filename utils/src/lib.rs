use std::io::BufWriter;
use std::io::Write;

/// Where a stream of the emitter ends up. Tests capture everything in
/// memory, the drivers write to stdout and stderr.
enum Sink {
    Buffer(Vec<u8>),
    Stream(BufWriter<Box<dyn Write>>),
}

impl Sink {
    fn write_str(&mut self, msg: &str) {
        match self {
            Sink::Buffer(inner) => inner.extend_from_slice(msg.as_bytes()),
            Sink::Stream(inner) => inner
                .write_all(msg.as_bytes())
                .expect("Failed to write to output stream."),
        }
    }

    fn contents(&self) -> Option<String> {
        match self {
            Sink::Buffer(inner) => Some(String::from_utf8_lossy(inner).into_owned()),
            Sink::Stream(_) => None,
        }
    }

    fn flush(&mut self) {
        if let Sink::Stream(inner) = self {
            inner.flush().expect("Failed to flush output stream.");
        }
    }
}

/// Collects regular output and diagnostics. Diagnostics are formatted as
/// `[line N] Error at 'token': message`, and the number of errors is
/// tracked so callers can bail out after a phase reported problems.
pub struct DiagnosticEmitter {
    out: Sink,
    err: Sink,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEmitter {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out: Sink::Stream(BufWriter::new(out)),
            err: Sink::Stream(BufWriter::new(err)),
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn log_to_buffer() -> Self {
        Self {
            out: Sink::Buffer(Vec::new()),
            err: Sink::Buffer(Vec::new()),
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn out(&mut self, msg: &str) {
        self.out.write_str(msg);
    }

    pub fn out_ln(&mut self, msg: &str) {
        self.out(msg);
        self.out("\n");
    }

    pub fn err(&mut self, msg: &str) {
        self.err.write_str(msg);
    }

    pub fn err_ln(&mut self, msg: &str) {
        self.err(msg);
        self.err("\n");
    }

    /// Everything written to the output so far, when logging to a buffer.
    pub fn out_buffer(&self) -> Option<String> {
        self.out.contents()
    }

    /// Everything written to the error stream so far, when logging to a
    /// buffer.
    pub fn err_buffer(&self) -> Option<String> {
        self.err.contents()
    }

    pub fn error(&mut self, line: u32, message: &str) {
        self.report(line, "", message);
    }

    /// Report an error at `item`, e.g., `at 'foo'` or `at end`.
    pub fn report(&mut self, line: u32, item: &str, message: &str) {
        self.error_count += 1;
        let item = if item.is_empty() { String::new() } else { format!(" {item}") };
        self.err_ln(&format!("[line {line}] Error{item}: {message}"));
    }

    /// Warnings do not count as errors, the analysis continues.
    pub fn warning(&mut self, message: &str) {
        self.warning_count += 1;
        self.err_ln(&format!("Warning: {message}"));
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn flush(&mut self) {
        self.out.flush();
        self.err.flush();
    }
}

impl Drop for DiagnosticEmitter {
    fn drop(&mut self) {
        self.flush();
    }
}
