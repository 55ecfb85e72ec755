//! Ghostscript Document Tools
//!
//! Small operations composed from the `gshost-runtime` lifecycle calls with
//! preset argument lists.
//!
//! # Available Tools
//!
//! ## Inspection
//! - [`page_count`] - Number of pages in a PDF
//!
//! ## Conversion
//! - [`render_to_image`] - Rasterise pages through an image device
//! - [`convert_to_pdf`] - Rewrite a PostScript or PDF file with `pdfwrite`
//!
//! ## Helpers
//! - [`escape_ps_string`] - Escape text for a PostScript string literal
//!
//! Every tool checks that its input exists before any interpreter is
//! created. Each has a `*_with` form that takes an explicit
//! [`Engine`](gshost_runtime::Engine); the plain form uses the system
//! library and needs the `native` feature.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gshost_tools::{page_count, render_to_image, ImageOptions};
//!
//! let pages = page_count("report.pdf")?;
//! render_to_image("report.pdf", "report-%d.png", &ImageOptions::default().resolution(96))?;
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod escape;
pub mod page_count;

use std::path::Path;

pub use convert::{convert_to_pdf, convert_to_pdf_with, render_to_image, render_to_image_with, ImageOptions, PdfOptions, PdfPreset};
pub use error::{Result, ToolError};
pub use escape::escape_ps_string;
pub use page_count::{page_count, page_count_with};

/// Fail with [`ToolError::FileNotFound`] unless `path` exists
pub(crate) fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        log::debug!("input {} does not exist", path.display());
        Err(ToolError::FileNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_exists() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ensure_exists(file.path()).is_ok());
        let err = ensure_exists(Path::new("/no/such/input.pdf")).unwrap_err();
        assert!(err.is_file_not_found());
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_plain_forms_need_native_engine() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = page_count(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ToolError::Runtime(gshost_runtime::GsError::EngineUnavailable(_))
        ));
    }
}
