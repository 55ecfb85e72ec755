//! Status-code classification and error types for the interpreter wrapper
//!
//! Every native call returns a signed status. Negative values are not all
//! failures: `Quit` and `Info` are control signals the interpreter uses to
//! say "stopped early on purpose", and `NeedInput` is the steady-state reply
//! while a chunked script is still being fed. The helpers here make that
//! distinction in one place so callers never compare raw numbers.

use std::borrow::Cow;
use std::path::PathBuf;

use thiserror::Error;

use crate::instance::State;

/// Result type for interpreter operations
pub type Result<T> = std::result::Result<T, GsError>;

/// Signed status code returned by the native interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub i32);

#[allow(missing_docs)]
impl ErrorCode {
    pub const OK: ErrorCode = ErrorCode(0);
    pub const UNKNOWN_ERROR: ErrorCode = ErrorCode(-1);
    pub const DICT_FULL: ErrorCode = ErrorCode(-2);
    pub const DICT_STACK_OVERFLOW: ErrorCode = ErrorCode(-3);
    pub const DICT_STACK_UNDERFLOW: ErrorCode = ErrorCode(-4);
    pub const EXEC_STACK_OVERFLOW: ErrorCode = ErrorCode(-5);
    pub const INTERRUPT: ErrorCode = ErrorCode(-6);
    pub const INVALID_ACCESS: ErrorCode = ErrorCode(-7);
    pub const INVALID_EXIT: ErrorCode = ErrorCode(-8);
    pub const INVALID_FILE_ACCESS: ErrorCode = ErrorCode(-9);
    pub const INVALID_FONT: ErrorCode = ErrorCode(-10);
    pub const INVALID_RESTORE: ErrorCode = ErrorCode(-11);
    pub const IO_ERROR: ErrorCode = ErrorCode(-12);
    pub const LIMIT_CHECK: ErrorCode = ErrorCode(-13);
    pub const NO_CURRENT_POINT: ErrorCode = ErrorCode(-14);
    pub const RANGE_CHECK: ErrorCode = ErrorCode(-15);
    pub const STACK_OVERFLOW: ErrorCode = ErrorCode(-16);
    pub const STACK_UNDERFLOW: ErrorCode = ErrorCode(-17);
    pub const SYNTAX_ERROR: ErrorCode = ErrorCode(-18);
    pub const TIMEOUT: ErrorCode = ErrorCode(-19);
    pub const TYPE_CHECK: ErrorCode = ErrorCode(-20);
    pub const UNDEFINED: ErrorCode = ErrorCode(-21);
    pub const UNDEFINED_FILENAME: ErrorCode = ErrorCode(-22);
    pub const UNDEFINED_RESULT: ErrorCode = ErrorCode(-23);
    pub const UNMATCHED_MARK: ErrorCode = ErrorCode(-24);
    pub const VM_ERROR: ErrorCode = ErrorCode(-25);
    pub const CONFIGURATION_ERROR: ErrorCode = ErrorCode(-26);
    pub const UNDEFINED_RESOURCE: ErrorCode = ErrorCode(-27);
    pub const UNREGISTERED: ErrorCode = ErrorCode(-28);
    pub const INVALID_CONTEXT: ErrorCode = ErrorCode(-29);
    pub const INVALID_ID: ErrorCode = ErrorCode(-30);
    pub const PDF_STACK_OVERFLOW: ErrorCode = ErrorCode(-31);
    pub const CIRCULAR_REFERENCE: ErrorCode = ErrorCode(-32);
    pub const HIT_DETECTED: ErrorCode = ErrorCode(-99);
    pub const FATAL: ErrorCode = ErrorCode(-100);
    /// Control signal: the interpreter executed `quit`
    pub const QUIT: ErrorCode = ErrorCode(-101);
    pub const INTERPRETER_EXIT: ErrorCode = ErrorCode(-102);
    pub const REMAP_COLOR: ErrorCode = ErrorCode(-103);
    pub const EXEC_STACK_UNDERFLOW: ErrorCode = ErrorCode(-104);
    pub const VM_RECLAIM: ErrorCode = ErrorCode(-105);
    /// Chunked execution consumed the chunk and wants more
    pub const NEED_INPUT: ErrorCode = ErrorCode(-106);
    pub const NEED_FILE: ErrorCode = ErrorCode(-107);
    /// Control signal: an informational option such as `-h` was handled
    pub const INFO: ErrorCode = ErrorCode(-110);

    /// Raw integer value
    pub fn raw(self) -> i32 {
        self.0
    }

    /// See [`is_error`]
    pub fn is_error(self) -> bool {
        is_error(self.0)
    }

    /// See [`is_fatal`]
    pub fn is_fatal(self) -> bool {
        is_fatal(self.0)
    }

    /// See [`error_message`]
    pub fn message(self) -> Cow<'static, str> {
        error_message(self.0)
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        ErrorCode(code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.0)
    }
}

/// True when `code` is a real failure (negative and not a control signal)
pub fn is_error(code: i32) -> bool {
    code < 0 && code != ErrorCode::QUIT.0 && code != ErrorCode::INFO.0
}

/// True for the fatal class of codes (`-100` and below)
pub fn is_fatal(code: i32) -> bool {
    code <= ErrorCode::FATAL.0
}

fn known_message(code: i32) -> Option<&'static str> {
    let message = match code {
        0 => "OK",
        -1 => "Unknown error",
        -2 => "Dictionary full",
        -3 => "Dictionary stack overflow",
        -4 => "Dictionary stack underflow",
        -5 => "Execution stack overflow",
        -6 => "Interrupt",
        -7 => "Invalid access",
        -8 => "Invalid exit",
        -9 => "Invalid file access",
        -10 => "Invalid font",
        -11 => "Invalid restore",
        -12 => "I/O error",
        -13 => "Limit check",
        -14 => "No current point",
        -15 => "Range check",
        -16 => "Stack overflow",
        -17 => "Stack underflow",
        -18 => "Syntax error",
        -19 => "Timeout",
        -20 => "Type check",
        -21 => "Undefined",
        -22 => "Undefined filename",
        -23 => "Undefined result",
        -24 => "Unmatched mark",
        -25 => "VM error",
        -26 => "Configuration error",
        -27 => "Undefined resource",
        -28 => "Unregistered",
        -29 => "Invalid context",
        -30 => "Invalid ID",
        -31 => "PDF stack overflow",
        -32 => "Circular reference",
        -99 => "Hit detected",
        -100 => "Fatal error",
        -101 => "Quit",
        -102 => "Interpreter exit",
        -103 => "Remap color",
        -104 => "Execution stack underflow",
        -105 => "VM reclaim",
        -106 => "Need input",
        -107 => "Need file",
        -110 => "Info",
        _ => return None,
    };
    Some(message)
}

/// Short description of a status code
///
/// Total over `i32`: codes without a fixed description still produce a
/// message that carries the number.
pub fn error_message(code: i32) -> Cow<'static, str> {
    match known_message(code) {
        Some(message) => Cow::Borrowed(message),
        None => Cow::Owned(format!("Unknown error (code {code})")),
    }
}

/// Fail with [`GsError::Native`] when `code` is an error
///
/// `0`, positive values, `Quit` and `Info` all pass.
pub fn check_error(code: i32, context: &str) -> Result<()> {
    if is_error(code) {
        Err(GsError::native(code, context))
    } else {
        Ok(())
    }
}

/// Fail only when `code` is a fatal error
///
/// Execution calls report script-level failures through the exit code, so
/// the status only matters once it reaches the fatal class. Control signals
/// are never fatal here even though they sit in the fatal range.
pub fn check_fatal(code: i32, context: &str) -> Result<()> {
    if is_error(code) && is_fatal(code) {
        Err(GsError::native(code, context))
    } else {
        if is_error(code) {
            log::warn!("{}: non-fatal status {}", context, ErrorCode(code));
        }
        Ok(())
    }
}

/// Errors raised by the wrapper
#[derive(Debug, Error)]
pub enum GsError {
    /// The native interpreter returned an error status
    #[error("{context}: {message} (code {code})")]
    Native {
        /// Raw status code
        code: i32,
        /// Description from [`error_message`]
        message: String,
        /// What the wrapper was doing
        context: String,
    },

    /// A file the operation needs does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// The call is not legal in the instance's current lifecycle state
    #[error("{operation} is not allowed while the instance is {state}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// State at the time of the call
        state: State,
    },

    /// A string handed to the C API contains a NUL byte
    #[error("{what} contains an interior NUL byte")]
    InteriorNul {
        /// Which argument was rejected
        what: String,
    },

    /// A buffer is too large for the C API's length type
    #[error("{what} is too long: {len} bytes")]
    InvalidLength {
        /// Which argument was rejected
        what: &'static str,
        /// Its length
        len: usize,
    },

    /// Data returned by the interpreter could not be decoded
    #[error("Malformed value for parameter '{name}': {reason}")]
    MalformedParam {
        /// Parameter name
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// No interpreter engine is available in this build
    #[error("Interpreter engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Host I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GsError {
    /// Build a [`GsError::Native`] from a status code
    pub fn native(code: i32, context: impl Into<String>) -> Self {
        GsError::Native {
            code,
            message: error_message(code).into_owned(),
            context: context.into(),
        }
    }

    /// Status code for native errors
    pub fn code(&self) -> Option<i32> {
        match self {
            GsError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the instance should be torn down rather than reused
    pub fn is_fatal(&self) -> bool {
        self.code().is_some_and(is_fatal)
    }

    /// True for the host-side missing-file condition
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, GsError::FileNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_error_matches_definition() {
        for code in -200..=10 {
            let expected = code < 0 && code != -101 && code != -110;
            assert_eq!(is_error(code), expected, "code {code}");
        }
        assert!(!is_error(i32::MAX));
        assert!(is_error(i32::MIN));
    }

    #[test]
    fn test_is_fatal_matches_definition() {
        for code in -200..=10 {
            assert_eq!(is_fatal(code), code <= -100, "code {code}");
        }
        assert!(is_fatal(ErrorCode::QUIT.raw()));
        assert!(!is_fatal(ErrorCode::HIT_DETECTED.raw()));
    }

    #[test]
    fn test_named_messages() {
        assert_eq!(error_message(0), "OK");
        assert_eq!(error_message(-12), "I/O error");
        assert_eq!(error_message(-15), "Range check");
        assert_eq!(error_message(-25), "VM error");
        assert_eq!(error_message(-101), "Quit");
        assert_eq!(error_message(-110), "Info");
        assert_eq!(ErrorCode::NEED_INPUT.message(), "Need input");
    }

    #[test]
    fn test_every_documented_code_has_its_own_message() {
        let mut codes: Vec<i32> = (-32..=0).collect();
        codes.extend(-107..=-99);
        codes.push(-110);

        let mut seen = std::collections::HashSet::new();
        for code in codes {
            let message = error_message(code);
            assert!(!message.starts_with("Unknown error (code"), "code {code} unmapped");
            assert!(seen.insert(message.into_owned()), "code {code} shares a message");
        }
    }

    #[test]
    fn test_unknown_codes_carry_the_number() {
        assert_eq!(error_message(-108), "Unknown error (code -108)");
        assert_eq!(error_message(-5000), "Unknown error (code -5000)");
        assert_eq!(error_message(7), "Unknown error (code 7)");
    }

    #[test]
    fn test_check_error() {
        assert!(check_error(0, "ctx").is_ok());
        assert!(check_error(3, "ctx").is_ok());
        assert!(check_error(ErrorCode::QUIT.raw(), "ctx").is_ok());
        assert!(check_error(ErrorCode::INFO.raw(), "ctx").is_ok());

        let err = check_error(-12, "reading input").unwrap_err();
        assert_eq!(err.code(), Some(-12));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "reading input: I/O error (code -12)");

        let err = check_error(-100, "init").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_check_fatal() {
        assert!(check_fatal(0, "run").is_ok());
        assert!(check_fatal(-21, "run").is_ok());
        assert!(check_fatal(-99, "run").is_ok());
        assert!(check_fatal(ErrorCode::QUIT.raw(), "run").is_ok());
        assert!(check_fatal(ErrorCode::INFO.raw(), "run").is_ok());
        assert!(check_fatal(-100, "run").is_err());
        assert!(check_fatal(-106, "run").is_err());
    }

    #[test]
    fn test_host_errors_have_no_code() {
        let err = GsError::FileNotFound { path: PathBuf::from("/nope.pdf") };
        assert!(err.is_file_not_found());
        assert_eq!(err.code(), None);
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "File not found: /nope.pdf");
    }
}
