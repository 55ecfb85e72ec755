//! Rendering to images and rewriting to PDF
//!
//! Both conversions run a file through an output device configured entirely
//! by init arguments, then exit the interpreter so the device flushes its
//! last page before the call returns.

use std::path::Path;

use gshost_runtime::{default_engine, Engine, Instance, LoggingStdio};
use serde::{Deserialize, Serialize};

use crate::ensure_exists;
use crate::error::{Result, ToolError};
use crate::escape::path_text;

/// Options for [`render_to_image`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Output device, e.g. `png16m`, `pngalpha`, `jpeg`, `tiff24nc`
    pub device: String,
    /// Resolution in DPI
    pub resolution: u32,
    /// First page to render (1-based)
    pub first_page: Option<u32>,
    /// Last page to render (inclusive)
    pub last_page: Option<u32>,
    /// Anti-alias text and graphics
    pub anti_alias: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            device: "png16m".to_string(),
            resolution: 150,
            first_page: None,
            last_page: None,
            anti_alias: true,
        }
    }
}

impl ImageOptions {
    /// Use `device`
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Render at `dpi`
    pub fn resolution(mut self, dpi: u32) -> Self {
        self.resolution = dpi;
        self
    }

    /// Render only pages `first..=last`
    pub fn pages(mut self, first: u32, last: u32) -> Self {
        self.first_page = Some(first);
        self.last_page = Some(last);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(ToolError::InvalidOptions("device must not be empty".to_string()));
        }
        if self.resolution == 0 {
            return Err(ToolError::InvalidOptions("resolution must be positive".to_string()));
        }
        if self.first_page == Some(0) || self.last_page == Some(0) {
            return Err(ToolError::InvalidOptions("page numbers start at 1".to_string()));
        }
        if let (Some(first), Some(last)) = (self.first_page, self.last_page) {
            if first > last {
                return Err(ToolError::InvalidOptions(format!(
                    "first page {first} is after last page {last}"
                )));
            }
        }
        Ok(())
    }

    fn args(&self, input: &Path, output: &Path) -> Result<Vec<String>> {
        let mut args = base_args();
        args.push(format!("-sDEVICE={}", self.device));
        args.push(format!("-r{}", self.resolution));
        if let Some(first) = self.first_page {
            args.push(format!("-dFirstPage={first}"));
        }
        if let Some(last) = self.last_page {
            args.push(format!("-dLastPage={last}"));
        }
        if self.anti_alias {
            args.push("-dTextAlphaBits=4".to_string());
            args.push("-dGraphicsAlphaBits=4".to_string());
        }
        args.extend(file_args(input, output)?);
        Ok(args)
    }
}

/// `pdfwrite` quality preset (`-dPDFSETTINGS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfPreset {
    /// Low resolution, smallest output
    Screen,
    /// Medium resolution
    Ebook,
    /// High resolution for desktop printing
    Printer,
    /// Colour-preserving, highest resolution
    Prepress,
    /// General purpose
    #[default]
    Default,
}

impl PdfPreset {
    /// Value passed to `-dPDFSETTINGS`
    pub fn setting(self) -> &'static str {
        match self {
            PdfPreset::Screen => "/screen",
            PdfPreset::Ebook => "/ebook",
            PdfPreset::Printer => "/printer",
            PdfPreset::Prepress => "/prepress",
            PdfPreset::Default => "/default",
        }
    }
}

impl std::str::FromStr for PdfPreset {
    type Err = ToolError;

    fn from_str(text: &str) -> Result<Self> {
        match text.trim_start_matches('/') {
            "screen" => Ok(PdfPreset::Screen),
            "ebook" => Ok(PdfPreset::Ebook),
            "printer" => Ok(PdfPreset::Printer),
            "prepress" => Ok(PdfPreset::Prepress),
            "default" => Ok(PdfPreset::Default),
            other => Err(ToolError::InvalidOptions(format!("unknown PDF preset '{other}'"))),
        }
    }
}

const COMPATIBILITY_LEVELS: [&str; 6] = ["1.3", "1.4", "1.5", "1.6", "1.7", "2.0"];

/// Options for [`convert_to_pdf`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    /// Quality preset
    pub preset: PdfPreset,
    /// Output PDF version, e.g. `"1.7"`; the device default when unset
    pub compatibility_level: Option<String>,
}

impl PdfOptions {
    fn validate(&self) -> Result<()> {
        match &self.compatibility_level {
            Some(level) if !COMPATIBILITY_LEVELS.contains(&level.as_str()) => Err(ToolError::InvalidOptions(
                format!("unsupported PDF compatibility level '{level}'"),
            )),
            _ => Ok(()),
        }
    }

    fn args(&self, input: &Path, output: &Path) -> Result<Vec<String>> {
        let mut args = base_args();
        args.push("-sDEVICE=pdfwrite".to_string());
        args.push(format!("-dPDFSETTINGS={}", self.preset.setting()));
        if let Some(level) = &self.compatibility_level {
            args.push(format!("-dCompatibilityLevel={level}"));
        }
        args.extend(file_args(input, output)?);
        Ok(args)
    }
}

fn base_args() -> Vec<String> {
    ["-q", "-dSAFER", "-dBATCH", "-dNOPAUSE"]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

fn file_args(input: &Path, output: &Path) -> Result<[String; 2]> {
    Ok([
        format!("-sOutputFile={}", path_text(output)?),
        format!("--permit-file-read={}", path_text(input)?),
    ])
}

fn run_conversion(engine: Box<dyn Engine>, operation: &'static str, args: &[String], input: &Path) -> Result<()> {
    let mut instance = Instance::with_engine(engine)?;
    instance.set_stdio(LoggingStdio::new())?;
    instance.init_with_args(args)?;
    let exit_code = instance.run_file(input)?;
    instance.exit();
    instance.close();
    if exit_code != 0 {
        return Err(ToolError::Interpreter { operation, exit_code });
    }
    Ok(())
}

/// Render `input` to image file(s) at `output` with the system interpreter
///
/// `output` may contain a `%d` pattern to write one file per page.
pub fn render_to_image(input: impl AsRef<Path>, output: impl AsRef<Path>, options: &ImageOptions) -> Result<()> {
    let input = input.as_ref();
    ensure_exists(input)?;
    render_to_image_with(default_engine()?, input, output, options)
}

/// Render `input` to image file(s) at `output` with `engine`
pub fn render_to_image_with(
    engine: Box<dyn Engine>,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &ImageOptions,
) -> Result<()> {
    let (input, output) = (input.as_ref(), output.as_ref());
    ensure_exists(input)?;
    options.validate()?;
    log::info!("rendering {} -> {} ({} @ {} dpi)", input.display(), output.display(), options.device, options.resolution);
    let args = options.args(input, output)?;
    run_conversion(engine, "render_to_image", &args, input)
}

/// Rewrite `input` as a PDF at `output` with the system interpreter
pub fn convert_to_pdf(input: impl AsRef<Path>, output: impl AsRef<Path>, options: &PdfOptions) -> Result<()> {
    let input = input.as_ref();
    ensure_exists(input)?;
    convert_to_pdf_with(default_engine()?, input, output, options)
}

/// Rewrite `input` as a PDF at `output` with `engine`
pub fn convert_to_pdf_with(
    engine: Box<dyn Engine>,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &PdfOptions,
) -> Result<()> {
    let (input, output) = (input.as_ref(), output.as_ref());
    ensure_exists(input)?;
    options.validate()?;
    log::info!("converting {} -> {} ({})", input.display(), output.display(), options.preset.setting());
    let args = options.args(input, output)?;
    run_conversion(engine, "convert_to_pdf", &args, input)
}
