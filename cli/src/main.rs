//! `gshost` command-line front end

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gshost_runtime::{default_engine, Instance, InstanceConfig, StdioHandler};
use gshost_tools::{ImageOptions, PdfOptions, PdfPreset};

#[derive(Parser)]
#[command(name = "gshost")]
#[command(about = "Drive the Ghostscript interpreter through its embedding API", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the linked library revision
    Revision {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Initialise an interpreter and execute PostScript
    Run(RunArgs),
    /// List the interpreter's parameters
    Params {
        /// Extra init argument (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the number of pages in a PDF
    PageCount {
        /// Document to inspect
        file: PathBuf,
    },
    /// Render a document to image file(s)
    ToImage {
        /// Input document
        input: PathBuf,
        /// Output file; may contain %d for one file per page
        output: PathBuf,
        /// Output device
        #[arg(long, default_value = "png16m")]
        device: String,
        /// Resolution in DPI
        #[arg(long, default_value_t = 150)]
        resolution: u32,
        /// First page to render
        #[arg(long)]
        first_page: Option<u32>,
        /// Last page to render
        #[arg(long)]
        last_page: Option<u32>,
    },
    /// Rewrite a document as PDF
    ToPdf {
        /// Input document
        input: PathBuf,
        /// Output PDF
        output: PathBuf,
        /// Quality preset: screen, ebook, printer, prepress or default
        #[arg(long, default_value = "default")]
        preset: PdfPreset,
        /// PDF compatibility level, e.g. 1.7
        #[arg(long = "compat")]
        compatibility_level: Option<String>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false, id = "source")]
struct Source {
    /// Script text to run in one shot
    #[arg(long)]
    script: Option<String>,
    /// File to run
    #[arg(long)]
    file: Option<PathBuf>,
    /// Script chunk fed through a chunked session (repeatable, in order)
    #[arg(long = "chunk")]
    chunks: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    source: Source,
    /// Init argument appended after those from --config (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,
    /// JSON instance configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Forwards interpreter streams to the process's own
struct ConsoleStdio;

impl StdioHandler for ConsoleStdio {
    fn read_stdin(&mut self, buf: &mut [u8]) -> i32 {
        match std::io::stdin().read(buf) {
            Ok(n) => i32::try_from(n).unwrap_or(i32::MAX),
            Err(err) => {
                log::warn!("stdin read failed: {}", err);
                -1
            }
        }
    }

    fn write_stdout(&mut self, data: &[u8]) -> i32 {
        forward(&mut std::io::stdout(), data)
    }

    fn write_stderr(&mut self, data: &[u8]) -> i32 {
        forward(&mut std::io::stderr(), data)
    }
}

fn forward(sink: &mut impl Write, data: &[u8]) -> i32 {
    match sink.write_all(data).and_then(|_| sink.flush()) {
        Ok(()) => i32::try_from(data.len()).unwrap_or(i32::MAX),
        Err(err) => {
            log::warn!("console write failed: {}", err);
            -1
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match try_main(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn try_main(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Revision { json } => {
            let revision = gshost_runtime::revision().context("querying library revision")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&revision)?);
            } else {
                println!("{revision}");
                println!("{}", revision.copyright);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run(args),
        Command::Params { args, json } => {
            let config = InstanceConfig::default().with_args(["-q", "-dNODISPLAY"]).with_args(args);
            let mut instance = Instance::launch(default_engine()?, &config).context("starting interpreter")?;
            let params = instance
                .enumerate_params()?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("enumerating parameters")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&params)?);
            } else {
                for info in &params {
                    println!("{:<32} {}", info.name, info.ty);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::PageCount { file } => {
            let pages = gshost_tools::page_count(&file)
                .with_context(|| format!("counting pages of {}", file.display()))?;
            println!("{pages}");
            Ok(ExitCode::SUCCESS)
        }
        Command::ToImage {
            input,
            output,
            device,
            resolution,
            first_page,
            last_page,
        } => {
            let options = ImageOptions {
                device,
                resolution,
                first_page,
                last_page,
                ..ImageOptions::default()
            };
            gshost_tools::render_to_image(&input, &output, &options)
                .with_context(|| format!("rendering {}", input.display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ToPdf {
            input,
            output,
            preset,
            compatibility_level,
        } => {
            let options = PdfOptions {
                preset,
                compatibility_level,
            };
            gshost_tools::convert_to_pdf(&input, &output, &options)
                .with_context(|| format!("converting {}", input.display()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(args: RunArgs) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => InstanceConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => InstanceConfig::default(),
    }
    .with_args(args.args);

    let mut instance = Instance::launch_with(default_engine()?, &config, |gs| gs.set_stdio(ConsoleStdio))
        .context("starting interpreter")?;

    let source = args.source;
    let exit_code = if let Some(script) = source.script {
        instance.run_string(&script)?
    } else if let Some(file) = source.file {
        instance
            .run_file(&file)
            .with_context(|| format!("running {}", file.display()))?
    } else {
        instance.run_chunks(source.chunks.iter().map(String::as_bytes))?
    };
    instance.exit();

    log::info!("interpreter exit code {}", exit_code);
    Ok(ExitCode::from(u8::try_from(exit_code).unwrap_or(1)))
}
