//! Callback capabilities invoked by the interpreter during execution
//!
//! The interpreter calls back into the host synchronously, on the same stack
//! as the run call that triggered it. Handlers are plain Rust values: any
//! context a caller needs travels inside the handler itself. The instance
//! keeps each registered handler alive until it is replaced or the instance
//! is destroyed, and only ever lends the native side a pointer to it.

use std::cell::RefCell;
use std::ffi::c_void;
use std::rc::Rc;

/// Return value for a callout that did not handle the event
pub const CALLOUT_UNHANDLED: i32 = -1;

/// Clamp a buffer length to the C `int` the interpreter expects back
pub(crate) fn len_status(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Standard stream redirection
///
/// Each method returns the number of bytes handled, or a negative value to
/// report an error to the interpreter. `read_stdin` returning 0 means EOF.
pub trait StdioHandler {
    /// Fill `buf` with input for the interpreter's `%stdin`
    fn read_stdin(&mut self, buf: &mut [u8]) -> i32 {
        let _ = buf;
        0
    }

    /// Receive bytes the interpreter wrote to `%stdout`
    fn write_stdout(&mut self, data: &[u8]) -> i32;

    /// Receive bytes the interpreter wrote to `%stderr`
    fn write_stderr(&mut self, data: &[u8]) -> i32;
}

/// Periodic poll during long-running operations
///
/// Returning a negative value asks the interpreter to abandon the current
/// operation; this is the only cancellation mechanism.
pub trait PollHandler {
    /// Called between interpreter steps
    fn poll(&mut self) -> i32;
}

impl<F> PollHandler for F
where
    F: FnMut() -> i32,
{
    fn poll(&mut self) -> i32 {
        self()
    }
}

/// Event delivered to a [`CalloutHandler`]
#[derive(Debug)]
pub struct CalloutEvent<'a> {
    /// Name of the device raising the callout
    pub device_name: &'a str,
    /// Device-specific event id
    pub id: i32,
    /// Size of the event payload
    pub size: i32,
    /// Device-owned payload; only meaningful to code that knows the device
    pub data: *mut c_void,
}

/// Device callout handler
pub trait CalloutHandler {
    /// Handle a device event; return [`CALLOUT_UNHANDLED`] to pass it on
    fn callout(&mut self, event: &CalloutEvent<'_>) -> i32;
}

impl<F> CalloutHandler for F
where
    F: FnMut(&CalloutEvent<'_>) -> i32,
{
    fn callout(&mut self, event: &CalloutEvent<'_>) -> i32 {
        self(event)
    }
}

/// Identifies a registered callout so it can be deregistered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalloutId(pub(crate) usize);

/// Shared byte sink filled by a stdio handler
///
/// Cloning shares the same storage, so the caller keeps one clone and hands
/// another to [`CaptureStdout`].
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl OutputBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes
    pub fn extend(&self, data: &[u8]) {
        self.bytes.borrow_mut().extend_from_slice(data);
    }

    /// Copy of everything captured so far
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.borrow().clone()
    }

    /// Captured bytes as text, invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    /// True when nothing was captured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard captured bytes
    pub fn clear(&self) {
        self.bytes.borrow_mut().clear();
    }
}

/// Stdio handler that captures stdout into an [`OutputBuffer`]
///
/// Stderr is captured too when a buffer is given, otherwise it is logged.
#[derive(Debug, Clone)]
pub struct CaptureStdout {
    stdout: OutputBuffer,
    stderr: Option<OutputBuffer>,
}

impl CaptureStdout {
    /// Capture stdout into `stdout`
    pub fn new(stdout: OutputBuffer) -> Self {
        Self { stdout, stderr: None }
    }

    /// Also capture stderr into `stderr`
    pub fn with_stderr(mut self, stderr: OutputBuffer) -> Self {
        self.stderr = Some(stderr);
        self
    }
}

impl StdioHandler for CaptureStdout {
    fn write_stdout(&mut self, data: &[u8]) -> i32 {
        self.stdout.extend(data);
        len_status(data.len())
    }

    fn write_stderr(&mut self, data: &[u8]) -> i32 {
        match &self.stderr {
            Some(buffer) => buffer.extend(data),
            None => log::debug!("[gs stderr] {}", String::from_utf8_lossy(data).trim_end()),
        }
        len_status(data.len())
    }
}

#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append data and return every completed line
    fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
        }
        lines
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end().to_string())
    }
}

/// Stdio handler that forwards interpreter output to the `log` facade
///
/// Output is split into lines; stdout goes to `info`, stderr to `warn`.
/// Partial trailing lines are flushed when the handler is dropped.
#[derive(Debug, Default)]
pub struct LoggingStdio {
    stdout: LineBuffer,
    stderr: LineBuffer,
}

impl LoggingStdio {
    /// Create a logging handler
    pub fn new() -> Self {
        Self::default()
    }
}

impl StdioHandler for LoggingStdio {
    fn write_stdout(&mut self, data: &[u8]) -> i32 {
        for line in self.stdout.push(data) {
            log::info!("[gs] {}", line);
        }
        len_status(data.len())
    }

    fn write_stderr(&mut self, data: &[u8]) -> i32 {
        for line in self.stderr.push(data) {
            log::warn!("[gs] {}", line);
        }
        len_status(data.len())
    }
}

impl Drop for LoggingStdio {
    fn drop(&mut self) {
        if let Some(line) = self.stdout.take_rest() {
            log::info!("[gs] {}", line);
        }
        if let Some(line) = self.stderr.take_rest() {
            log::warn!("[gs] {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_buffer_is_shared_between_clones() {
        let buffer = OutputBuffer::new();
        let mut handler = CaptureStdout::new(buffer.clone());

        assert_eq!(handler.write_stdout(b"12"), 2);
        assert_eq!(handler.write_stdout(b"3\n"), 2);
        assert_eq!(buffer.text(), "123\n");
        assert_eq!(buffer.len(), 4);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capture_stderr_separately() {
        let out = OutputBuffer::new();
        let err = OutputBuffer::new();
        let mut handler = CaptureStdout::new(out.clone()).with_stderr(err.clone());

        handler.write_stdout(b"page");
        handler.write_stderr(b"warning");
        assert_eq!(out.text(), "page");
        assert_eq!(err.text(), "warning");
    }

    #[test]
    fn test_default_stdin_is_eof() {
        let mut handler = CaptureStdout::new(OutputBuffer::new());
        let mut buf = [0u8; 16];
        assert_eq!(handler.read_stdin(&mut buf), 0);
    }

    #[test]
    fn test_line_buffer_splits_lines() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"GPL Ghost").is_empty());
        assert_eq!(lines.push(b"script\r\nsecond\nthi"), vec!["GPL Ghostscript", "second"]);
        assert_eq!(lines.take_rest().as_deref(), Some("thi"));
        assert_eq!(lines.take_rest(), None);
    }

    #[test]
    fn test_closure_handlers() {
        let mut calls = 0;
        let mut poll = || {
            calls += 1;
            if calls > 2 { -1 } else { 0 }
        };
        assert_eq!(PollHandler::poll(&mut poll), 0);
        assert_eq!(PollHandler::poll(&mut poll), 0);
        assert_eq!(PollHandler::poll(&mut poll), -1);

        let mut callout = |event: &CalloutEvent<'_>| {
            if event.device_name == "display" { 0 } else { CALLOUT_UNHANDLED }
        };
        let event = CalloutEvent {
            device_name: "png16m",
            id: 3,
            size: 0,
            data: std::ptr::null_mut(),
        };
        assert_eq!(callout.callout(&event), CALLOUT_UNHANDLED);
    }

    #[test]
    fn test_len_status_clamps() {
        assert_eq!(len_status(12), 12);
        assert_eq!(len_status(usize::MAX), i32::MAX);
    }
}
