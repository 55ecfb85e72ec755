//! Error type for the document tools

use std::path::PathBuf;

use gshost_runtime::GsError;
use thiserror::Error;

/// Result type for tool operations
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors raised by the document tools
#[derive(Debug, Error)]
pub enum ToolError {
    /// The input document does not exist; no interpreter was started
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The page-count script printed something that is not a number
    #[error("Could not determine page count of {}: unexpected output {output:?}", path.display())]
    PageCount {
        /// Document that was queried
        path: PathBuf,
        /// Trimmed interpreter output
        output: String,
    },

    /// The interpreter ran but reported failure through its exit code
    #[error("{operation} failed with interpreter exit code {exit_code}")]
    Interpreter {
        /// Tool operation
        operation: &'static str,
        /// Exit code returned by the run call
        exit_code: i32,
    },

    /// Conversion options are inconsistent
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The path cannot be handed to the interpreter as text
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// Failure inside the interpreter wrapper
    #[error(transparent)]
    Runtime(#[from] GsError),
}

impl ToolError {
    /// True for a missing input, whichever layer noticed it
    pub fn is_file_not_found(&self) -> bool {
        match self {
            ToolError::FileNotFound(_) => true,
            ToolError::Runtime(err) => err.is_file_not_found(),
            _ => false,
        }
    }
}
