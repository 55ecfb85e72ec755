//! Instance behaviour driven through the scripted engine

use std::cell::Cell;
use std::rc::Rc;

use gshost_runtime::testing::{exclusive, MockEngine, RunOutcome};
use gshost_runtime::{
    ArgEncoding, CalloutEvent, CaptureStdout, ErrorCode, GsError, Instance, OutputBuffer, ParamType, ParamValue,
    State, StdioHandler,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Exit code = number of `showpage` tokens, so split points cannot matter
fn counting_engine() -> MockEngine {
    MockEngine::new().with_runner(|script, _| {
        let text = String::from_utf8_lossy(script);
        let pages = text.split_whitespace().filter(|token| *token == "showpage").count();
        RunOutcome::exit(pages as i32)
    })
}

fn launch(engine: MockEngine) -> Instance {
    let mut instance = Instance::with_engine(Box::new(engine)).expect("create");
    instance
        .init_with_args(&["-dNODISPLAY", "-dBATCH"])
        .expect("init");
    instance
}

#[test]
fn test_chunked_matches_one_shot() {
    init_logging();
    let _guard = exclusive();
    let script = "newpath showpage 72 72 moveto showpage (done) print showpage";

    let one_shot = {
        let mut instance = launch(counting_engine());
        instance.run_string(script).unwrap()
    };
    assert_eq!(one_shot, 3);

    for (a, b) in [(3, 20), (11, 12), (0, script.len())] {
        let mut instance = launch(counting_engine());
        let chunks = [&script[..a], &script[a..b], &script[b..]];
        assert_eq!(instance.run_string_begin().unwrap(), 0);
        for chunk in chunks {
            // NeedInput between chunks must not surface
            instance.run_string_continue(chunk.as_bytes()).unwrap();
        }
        assert_eq!(instance.run_string_end().unwrap(), one_shot);
    }

    let mut instance = launch(counting_engine());
    assert_eq!(instance.run_chunks(script.as_bytes().chunks(7)).unwrap(), one_shot);
}

#[test]
fn test_fatal_continue_raises() {
    let _guard = exclusive();
    let engine = MockEngine::new().fail_on("run_string_continue", ErrorCode::VM_RECLAIM.0);
    let mut instance = launch(engine);
    instance.run_string_begin().unwrap();
    let err = instance.run_string_continue(b"1 ").unwrap_err();
    assert_eq!(err.code(), Some(-105));
    assert!(err.is_fatal());
}

#[test]
fn test_fatal_begin_and_end_raise() {
    let _guard = exclusive();
    let engine = MockEngine::new().fail_on("run_string_begin", ErrorCode::FATAL.0);
    let mut instance = launch(engine);
    let err = instance.run_string_begin().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), Some(-100));
    instance.close();

    let engine = MockEngine::new().fail_on("run_string_end", ErrorCode::FATAL.0);
    let mut instance = launch(engine);
    instance.run_string_begin().unwrap();
    instance.run_string_continue(b"showpage").unwrap();
    let err = instance.run_string_end().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), Some(-100));
}

#[test]
fn test_non_fatal_chunked_status_becomes_exit_code() {
    let _guard = exclusive();
    let engine = MockEngine::new()
        .with_runner(|_, _| RunOutcome::status(ErrorCode::UNDEFINED.0, 1))
        .fail_on("run_string_continue", ErrorCode::TYPE_CHECK.0);
    let mut instance = launch(engine);
    instance.run_string_begin().unwrap();
    // a recoverable status other than NeedInput is not raised either
    assert!(instance.run_string_continue(b"nosuchop ").is_ok());
    instance.run_string_continue(b"nosuchop").unwrap();
    assert_eq!(instance.run_string_end().unwrap(), 1);
}

#[test]
fn test_non_fatal_status_from_length_and_file_runs() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.ps");
    std::fs::write(&path, "nosuchop\n").unwrap();

    let engine = MockEngine::new().with_runner(|_, _| RunOutcome::status(ErrorCode::UNDEFINED.0, 1));
    let mut instance = launch(engine);
    assert_eq!(instance.run_string_with_length(b"nosuchop\0").unwrap(), 1);
    assert_eq!(instance.run_file(&path).unwrap(), 1);
}

#[test]
fn test_abandoned_instance_is_released() {
    let _guard = exclusive();
    {
        let instance = launch(MockEngine::new());
        assert_eq!(instance.state(), State::Initialized);
        // dropped without close
    }
    let again = Instance::with_engine(Box::new(MockEngine::new()));
    assert!(again.is_ok());
}

#[test]
fn test_second_live_instance_fails() {
    let _guard = exclusive();
    let first = launch(MockEngine::new());
    let err = Instance::with_engine(Box::new(MockEngine::new())).unwrap_err();
    assert!(err.is_fatal());
    drop(first);
    assert!(Instance::with_engine(Box::new(MockEngine::new())).is_ok());
}

#[test]
fn test_release_after_panic() {
    let _guard = exclusive();
    let result = std::panic::catch_unwind(|| {
        let _instance = launch(MockEngine::new());
        panic!("caller bug");
    });
    assert!(result.is_err());
    assert!(Instance::with_engine(Box::new(MockEngine::new())).is_ok());
}

#[test]
fn test_param_round_trip() {
    let _guard = exclusive();
    let mut instance = launch(MockEngine::new());

    instance.set_param("OutputFile", "/tmp/out.pdf", false).unwrap();
    instance.set_param("HWResolution", 300, false).unwrap();
    instance.set_param("UseCropBox", true, false).unwrap();
    instance.set_param("Gamma", 1.25f32, false).unwrap();
    instance.set_param("MaxBitmap", ParamValue::SizeT(1 << 20), false).unwrap();
    instance.set_param("Device", ParamValue::Name("pdfwrite".into()), false).unwrap();

    assert_eq!(instance.get_param_string("OutputFile").unwrap(), "/tmp/out.pdf");
    assert_eq!(instance.get_param_int("HWResolution").unwrap(), 300);
    assert!(instance.get_param_bool("UseCropBox").unwrap());
    assert_eq!(instance.get_param_float("Gamma").unwrap(), 1.25);
    assert_eq!(instance.get_param_size("MaxBitmap").unwrap(), 1 << 20);
    assert_eq!(instance.get_param_name("Device").unwrap(), "pdfwrite");
}

#[test]
fn test_empty_string_param_round_trip() {
    let _guard = exclusive();
    let mut instance = launch(MockEngine::new());
    instance.set_param("Title", "", false).unwrap();
    assert_eq!(instance.get_param_string("Title").unwrap(), "");
}

#[test]
fn test_wrong_type_read_raises() {
    let _guard = exclusive();
    let mut instance = launch(MockEngine::new().with_param("HWResolution", 72));
    assert_eq!(instance.get_param("HWResolution", ParamType::Int).unwrap(), ParamValue::Int(72));
    let err = instance.get_param_string("HWResolution").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TYPE_CHECK.0));
}

#[test]
fn test_batched_params() {
    let _guard = exclusive();
    let engine = MockEngine::new();
    let journal = engine.journal();
    let mut instance = launch(engine);
    instance.set_param("A", 1, true).unwrap();
    instance.set_param("B", 2, false).unwrap();
    assert_eq!(journal.details("set_param"), vec!["A=1 +", "B=2"]);
    assert_eq!(instance.get_param_int("A").unwrap(), 1);
}

#[test]
fn test_enumeration_is_finite_and_restartable() {
    let _guard = exclusive();
    let engine = MockEngine::new()
        .with_param("Resolution", 72)
        .with_param("OutputFile", "-")
        .with_param("NumCopies", 1i64);
    let mut instance = launch(engine);

    let params: Vec<_> = instance
        .enumerate_params()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let names: Vec<_> = params.iter().map(|info| info.name.as_str()).collect();
    assert_eq!(names, ["NumCopies", "OutputFile", "Resolution"]);
    assert_eq!(params[0].ty, ParamType::I64);
    assert_eq!(params[1].ty, ParamType::String);

    let mut iter = instance.enumerate_params().unwrap();
    assert!(iter.next().is_some());
    drop(iter);
    assert_eq!(instance.enumerate_params().unwrap().count(), 3);
}

#[test]
fn test_enumeration_error_ends_iteration() {
    let _guard = exclusive();
    let engine = MockEngine::new()
        .with_param("A", 1)
        .fail_on("enumerate_params", ErrorCode::IO_ERROR.0);
    let mut instance = launch(engine);
    let mut iter = instance.enumerate_params().unwrap();
    assert!(matches!(iter.next(), Some(Err(GsError::Native { code: -12, .. }))));
    assert!(iter.next().is_none());
}

#[test]
fn test_stdio_capture() {
    let _guard = exclusive();
    let engine = MockEngine::new().with_runner(|script, stdio: &mut dyn StdioHandler| {
        stdio.write_stdout(script);
        stdio.write_stderr(b"warning\n");
        RunOutcome::exit(0)
    });
    let out = OutputBuffer::new();
    let err = OutputBuffer::new();
    let mut instance = Instance::with_engine(Box::new(engine)).unwrap();
    instance
        .set_stdio(CaptureStdout::new(out.clone()).with_stderr(err.clone()))
        .unwrap();
    instance.init_with_args::<&str>(&[]).unwrap();
    instance.run_string("hello").unwrap();
    assert_eq!(out.text(), "hello");
    assert_eq!(err.text(), "warning\n");
}

#[test]
fn test_poll_cancels_run() {
    let _guard = exclusive();
    let polls = Rc::new(Cell::new(0));
    let seen = polls.clone();
    let mut instance = Instance::with_engine(Box::new(counting_engine())).unwrap();
    instance
        .set_poll(move || {
            seen.set(seen.get() + 1);
            if seen.get() >= 2 { ErrorCode::FATAL.0 } else { 0 }
        })
        .unwrap();
    instance.init_with_args::<&str>(&[]).unwrap();

    assert_eq!(instance.run_string("showpage").unwrap(), 1);
    let err = instance.run_string("showpage").unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(polls.get(), 2);
}

#[test]
fn test_callout_registration() {
    let _guard = exclusive();
    let events = Rc::new(Cell::new(0));
    let seen = events.clone();
    let engine = MockEngine::new();
    let journal = engine.journal();
    let mut instance = Instance::with_engine(Box::new(engine)).unwrap();

    let id = instance
        .register_callout(move |event: &CalloutEvent<'_>| {
            assert_eq!(event.device_name, "nullpage");
            seen.set(seen.get() + 1);
            0
        })
        .unwrap();
    let unused = instance.register_callout(|_: &CalloutEvent<'_>| -1).unwrap();
    instance.deregister_callout(unused).unwrap();
    instance.init_with_args::<&str>(&[]).unwrap();

    assert_eq!(events.get(), 1);
    instance.deregister_callout(id).unwrap();
    assert_eq!(journal.count("deregister_callout"), 2);
}

#[test]
fn test_utf16_arguments() {
    let _guard = exclusive();
    let engine = MockEngine::new();
    let journal = engine.journal();
    let mut instance = Instance::with_engine(Box::new(engine)).unwrap();
    instance.set_arg_encoding(ArgEncoding::Utf16le).unwrap();
    instance.init_with_args(&["-sOutputFile=résumé.pdf"]).unwrap();
    assert_eq!(journal.details("set_arg_encoding"), vec!["Utf16le"]);
    assert_eq!(journal.details("init_with_args"), vec!["gshost -sOutputFile=résumé.pdf"]);
}

#[test]
fn test_default_device_list() {
    let _guard = exclusive();
    let mut instance = Instance::with_engine(Box::new(MockEngine::new())).unwrap();
    assert_eq!(instance.default_device_list().unwrap(), "png16m pdfwrite");
    instance.set_default_device_list("pdfwrite").unwrap();
    assert_eq!(instance.default_device_list().unwrap(), "pdfwrite");
}

#[test]
fn test_run_file_reads_script() {
    let _guard = exclusive();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("three.ps");
    std::fs::write(&path, "showpage showpage showpage").unwrap();

    let mut instance = launch(counting_engine());
    assert_eq!(instance.run_file(&path).unwrap(), 3);
}

#[test]
fn test_calls_after_close_are_rejected() {
    let _guard = exclusive();
    let mut instance = launch(MockEngine::new());
    instance.close();
    assert!(matches!(
        instance.run_string("showpage"),
        Err(GsError::InvalidState { state: State::Destroyed, .. })
    ));
    assert!(matches!(
        instance.is_path_control_active(),
        Err(GsError::InvalidState { .. })
    ));
    instance.exit();
}
