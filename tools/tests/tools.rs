//! Tool behaviour against the scripted engine

use std::path::Path;

use gshost_runtime::testing::{exclusive, Journal, MockEngine, RunOutcome};
use gshost_runtime::{ErrorCode, StdioHandler};
use gshost_tools::{
    convert_to_pdf_with, page_count_with, render_to_image_with, ImageOptions, PdfOptions, PdfPreset, ToolError,
};

fn printing(output: &'static str) -> MockEngine {
    MockEngine::new().with_runner(move |_, stdio: &mut dyn StdioHandler| {
        stdio.write_stdout(output.as_bytes());
        RunOutcome::status(ErrorCode::QUIT.0, 0)
    })
}

fn scratch_input(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "showpage\n").unwrap();
    path
}

fn assert_untouched(journal: &Journal) {
    assert!(journal.calls().is_empty(), "engine was called: {:?}", journal.ops());
}

#[test]
fn test_page_count_parses_trimmed_output() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "three.pdf");
    assert_eq!(page_count_with(Box::new(printing("  3\n")), &input).unwrap(), 3);
}

#[test]
fn test_page_count_missing_file_skips_engine() {
    let _guard = exclusive();
    let engine = printing("3\n");
    let journal = engine.journal();
    let err = page_count_with(Box::new(engine), "/no/such/file.pdf").unwrap_err();
    assert!(matches!(err, ToolError::FileNotFound(_)));
    assert_untouched(&journal);
}

#[test]
fn test_page_count_unparseable_output() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "broken.pdf");
    let err = page_count_with(Box::new(printing("Error: /syntaxerror in pdfopen\n")), &input).unwrap_err();
    match err {
        ToolError::PageCount { path, output } => {
            assert_eq!(path, input);
            assert_eq!(output, "Error: /syntaxerror in pdfopen");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_page_count_sandbox_args() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "a.pdf");
    let engine = printing("1");
    let journal = engine.journal();
    page_count_with(Box::new(engine), &input).unwrap();

    let init = &journal.details("init_with_args")[0];
    assert!(init.starts_with("gshost -q -dNODISPLAY -dSAFER --permit-file-read="));
    assert_eq!(journal.count("set_stdio"), 1);
}

#[test]
fn test_render_runs_file_and_exits() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "page.ps");
    let output = dir.path().join("page-%d.png");
    let engine = MockEngine::new();
    let journal = engine.journal();

    render_to_image_with(Box::new(engine), &input, &output, &ImageOptions::default().resolution(72)).unwrap();

    let init = &journal.details("init_with_args")[0];
    assert!(init.contains("-sDEVICE=png16m"));
    assert!(init.contains("-r72"));
    assert_eq!(journal.details("run_file"), vec![input.display().to_string()]);
    assert_eq!(journal.count("exit"), 1);
    assert_eq!(journal.count("delete_instance"), 1);
}

#[test]
fn test_render_missing_input_skips_engine() {
    let _guard = exclusive();
    let engine = MockEngine::new();
    let journal = engine.journal();
    let err = render_to_image_with(Box::new(engine), "/no/such.pdf", "/tmp/out.png", &ImageOptions::default())
        .unwrap_err();
    assert!(err.is_file_not_found());
    assert_untouched(&journal);
}

#[test]
fn test_render_reports_exit_code() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "bad.ps");
    let engine = MockEngine::new().with_runner(|_, _| RunOutcome::status(ErrorCode::UNDEFINED.0, 1));
    let err = render_to_image_with(Box::new(engine), &input, dir.path().join("x.png"), &ImageOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ToolError::Interpreter { operation: "render_to_image", exit_code: 1 }
    ));
}

#[test]
fn test_failed_shutdown_does_not_fail_conversion() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "in.ps");
    let engine = MockEngine::new().with_exit_status(ErrorCode::VM_ERROR.0);
    let journal = engine.journal();
    render_to_image_with(Box::new(engine), &input, dir.path().join("o.png"), &ImageOptions::default()).unwrap();
    assert_eq!(journal.count("exit"), 1);
    assert_eq!(journal.count("delete_instance"), 1);
}

#[test]
fn test_invalid_options_skip_engine() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "in.ps");
    let engine = MockEngine::new();
    let journal = engine.journal();
    let err = render_to_image_with(Box::new(engine), &input, "out.png", &ImageOptions::default().pages(5, 1))
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidOptions(_)));
    assert_untouched(&journal);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_output_path_skips_engine() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "in.ps");
    let output = dir.path().join(OsStr::from_bytes(b"out-\xff.pdf"));

    let engine = MockEngine::new();
    let journal = engine.journal();
    let err = convert_to_pdf_with(Box::new(engine), &input, &output, &PdfOptions::default()).unwrap_err();
    assert!(matches!(err, ToolError::NonUtf8Path(ref path) if *path == output));
    assert_untouched(&journal);

    let engine = MockEngine::new();
    let journal = engine.journal();
    let err = render_to_image_with(Box::new(engine), &input, &output, &ImageOptions::default()).unwrap_err();
    assert!(matches!(err, ToolError::NonUtf8Path(_)));
    assert_untouched(&journal);
}

#[test]
fn test_convert_to_pdf_args() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "in.ps");
    let engine = MockEngine::new();
    let journal = engine.journal();
    let options = PdfOptions {
        preset: PdfPreset::Screen,
        compatibility_level: Some("1.5".to_string()),
    };
    convert_to_pdf_with(Box::new(engine), &input, dir.path().join("out.pdf"), &options).unwrap();

    let init = &journal.details("init_with_args")[0];
    assert!(init.contains("-sDEVICE=pdfwrite"));
    assert!(init.contains("-dPDFSETTINGS=/screen"));
    assert!(init.contains("-dCompatibilityLevel=1.5"));
}

#[test]
fn test_fatal_init_surfaces_as_runtime_error() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let input = scratch_input(dir.path(), "in.ps");
    let engine = MockEngine::new().with_init_status(ErrorCode::FATAL.0);
    let err = convert_to_pdf_with(Box::new(engine), &input, dir.path().join("o.pdf"), &PdfOptions::default())
        .unwrap_err();
    match err {
        ToolError::Runtime(inner) => assert!(inner.is_fatal()),
        other => panic!("unexpected error: {other}"),
    }
}
