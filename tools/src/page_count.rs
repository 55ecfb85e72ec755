//! Page counting
//!
//! Stdout is captured into an [`OutputBuffer`] while a short script opens
//! the document with the PDF interpreter, prints its page count and quits.

use std::path::Path;

use gshost_runtime::{default_engine, CaptureStdout, Engine, Instance, OutputBuffer};

use crate::error::{Result, ToolError};
use crate::escape::{escape_path, path_text};
use crate::ensure_exists;

/// Number of pages in the PDF at `path`, using the system interpreter
pub fn page_count(path: impl AsRef<Path>) -> Result<u32> {
    let path = path.as_ref();
    ensure_exists(path)?;
    page_count_with(default_engine()?, path)
}

/// Number of pages in the PDF at `path`, using `engine`
pub fn page_count_with(engine: Box<dyn Engine>, path: impl AsRef<Path>) -> Result<u32> {
    let path = path.as_ref();
    ensure_exists(path)?;
    let script = format!(
        "({}) (r) file runpdfbegin pdfpagecount = quit",
        escape_path(path)?
    );

    let output = OutputBuffer::new();
    let mut instance = Instance::with_engine(engine)?;
    instance.set_stdio(CaptureStdout::new(output.clone()))?;
    instance.init_with_args(&[
        "-q".to_string(),
        "-dNODISPLAY".to_string(),
        "-dSAFER".to_string(),
        format!("--permit-file-read={}", path_text(path)?),
    ])?;
    let exit_code = instance.run_string(&script)?;
    instance.close();

    let text = output.text();
    let trimmed = text.trim();
    log::debug!("page count of {}: {:?} (exit code {})", path.display(), trimmed, exit_code);
    trimmed.parse::<u32>().map_err(|_| ToolError::PageCount {
        path: path.to_path_buf(),
        output: trimmed.to_string(),
    })
}
