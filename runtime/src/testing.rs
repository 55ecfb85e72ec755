//! Scripted in-memory engine for tests
//!
//! [`MockEngine`] implements [`Engine`] without the native library. It keeps
//! a journal of every call, a parameter store with batching, control-path
//! lists and a chunk buffer, and hands script bytes to a caller-supplied
//! runner that decides the status and exit code. Single-shot failures can be
//! injected per operation with [`MockEngine::fail_on`].
//!
//! Tests that create instances must hold [`exclusive`] for their whole body:
//! the instance slot is process-wide and test threads share it.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::CStr;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};

use crate::args::{ArgEncoding, EncodedArgs};
use crate::engine::Engine;
use crate::error::ErrorCode;
use crate::io::{len_status, CalloutEvent, CalloutHandler, CalloutId, PollHandler, StdioHandler};
use crate::params::{ParamCursor, ParamType, ParamValue};
use crate::path_control::PathKind;
use crate::revision::Revision;

static EXCLUSIVE: Mutex<()> = Mutex::new(());

/// Serialise tests that create an interpreter instance
pub fn exclusive() -> MutexGuard<'static, ()> {
    EXCLUSIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Engine method name
    pub op: &'static str,
    /// Method-specific detail, e.g. the argument list
    pub detail: String,
}

/// Shared view of the calls a [`MockEngine`] received
///
/// Obtained before the engine is boxed and moved into an instance.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Journal {
    fn record(&self, op: &'static str, detail: impl Into<String>) {
        self.calls.borrow_mut().push(Call { op, detail: detail.into() });
    }

    /// Every call, oldest first
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Method names, oldest first
    pub fn ops(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|call| call.op).collect()
    }

    /// Number of calls to `op`
    pub fn count(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|call| call.op == op).count()
    }

    /// Details of every call to `op`
    pub fn details(&self, op: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.op == op)
            .map(|call| call.detail.clone())
            .collect()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

/// Result of running a script on the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    /// Native status returned by the run call
    pub status: i32,
    /// Interpreter exit code
    pub exit_code: i32,
}

impl RunOutcome {
    /// Successful run with `exit_code`
    pub fn exit(exit_code: i32) -> Self {
        Self { status: 0, exit_code }
    }

    /// Run reporting `status`
    pub fn status(status: i32, exit_code: i32) -> Self {
        Self { status, exit_code }
    }
}

type Runner = Box<dyn FnMut(&[u8], &mut dyn StdioHandler) -> RunOutcome>;

struct DiscardStdio;

impl StdioHandler for DiscardStdio {
    fn write_stdout(&mut self, data: &[u8]) -> i32 {
        len_status(data.len())
    }

    fn write_stderr(&mut self, data: &[u8]) -> i32 {
        len_status(data.len())
    }
}

/// Engine double driven by closures and in-memory state
pub struct MockEngine {
    journal: Journal,
    revision: Revision,
    live: bool,
    initialized: bool,
    arg_encoding: ArgEncoding,
    init_status: i32,
    exit_status: i32,
    failures: HashMap<&'static str, i32>,
    runner: Runner,
    chunk: Option<Vec<u8>>,
    stdio: Option<Box<dyn StdioHandler>>,
    poll: Option<Box<dyn PollHandler>>,
    callouts: Vec<Option<Box<dyn CalloutHandler>>>,
    device_list: Vec<u8>,
    params: BTreeMap<String, ParamValue>,
    pending: Vec<(String, ParamValue)>,
    control_paths: BTreeMap<PathKind, Vec<String>>,
    path_control_active: bool,
}

impl MockEngine {
    /// Engine whose scripts all succeed with exit code 0
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            revision: Revision {
                product: "Mock Interpreter".to_string(),
                copyright: "Copyright (C) gshost".to_string(),
                revision: 10020,
                revision_date: 20230913,
            },
            live: false,
            initialized: false,
            arg_encoding: ArgEncoding::default(),
            init_status: 0,
            exit_status: 0,
            failures: HashMap::new(),
            runner: Box::new(|_, _| RunOutcome::default()),
            chunk: None,
            stdio: None,
            poll: None,
            callouts: Vec::new(),
            device_list: b"png16m pdfwrite".to_vec(),
            params: BTreeMap::new(),
            pending: Vec::new(),
            control_paths: BTreeMap::new(),
            path_control_active: false,
        }
    }

    /// Handle on the call journal
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Status returned by `init_with_args`
    pub fn with_init_status(mut self, status: i32) -> Self {
        self.init_status = status;
        self
    }

    /// Status returned by `exit`
    pub fn with_exit_status(mut self, status: i32) -> Self {
        self.exit_status = status;
        self
    }

    /// Evaluate every script (one-shot, file contents or joined chunks)
    /// with `runner`; it may write to the installed stdio handler
    pub fn with_runner<F>(mut self, runner: F) -> Self
    where
        F: FnMut(&[u8], &mut dyn StdioHandler) -> RunOutcome + 'static,
    {
        self.runner = Box::new(runner);
        self
    }

    /// Pre-populate a readable parameter
    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Make the next call to `op` return `status` without doing anything
    pub fn fail_on(mut self, op: &'static str, status: i32) -> Self {
        self.failures.insert(op, status);
        self
    }

    fn injected(&mut self, op: &'static str) -> Option<i32> {
        self.failures.remove(op)
    }

    fn run(&mut self, script: &[u8], exit_code: &mut i32) -> i32 {
        if let Some(poll) = self.poll.as_mut() {
            let code = poll.poll();
            if code < 0 {
                return code;
            }
        }
        let outcome = match self.stdio.as_mut() {
            Some(stdio) => (self.runner)(script, stdio.as_mut()),
            None => (self.runner)(script, &mut DiscardStdio),
        };
        *exit_code = outcome.exit_code;
        outcome.status
    }

    fn apply_param(&mut self, name: String, value: ParamValue) {
        self.params.insert(name, value);
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! inject {
    ($self:ident, $op:literal) => {
        if let Some(status) = $self.injected($op) {
            return status;
        }
    };
}

impl Engine for MockEngine {
    fn revision(&self) -> Result<Revision, i32> {
        self.journal.record("revision", "");
        Ok(self.revision.clone())
    }

    fn new_instance(&mut self) -> i32 {
        self.journal.record("new_instance", "");
        inject!(self, "new_instance");
        self.live = true;
        0
    }

    fn delete_instance(&mut self) {
        self.journal.record("delete_instance", "");
        self.live = false;
        self.initialized = false;
        self.stdio = None;
        self.poll = None;
        self.callouts.clear();
    }

    fn set_arg_encoding(&mut self, encoding: ArgEncoding) -> i32 {
        self.journal.record("set_arg_encoding", format!("{encoding:?}"));
        inject!(self, "set_arg_encoding");
        self.arg_encoding = encoding;
        0
    }

    fn set_stdio(&mut self, handler: Box<dyn StdioHandler>) -> i32 {
        self.journal.record("set_stdio", "");
        inject!(self, "set_stdio");
        self.stdio = Some(handler);
        0
    }

    fn set_poll(&mut self, handler: Box<dyn PollHandler>) -> i32 {
        self.journal.record("set_poll", "");
        inject!(self, "set_poll");
        self.poll = Some(handler);
        0
    }

    fn register_callout(&mut self, handler: Box<dyn CalloutHandler>) -> Result<CalloutId, i32> {
        self.journal.record("register_callout", "");
        if let Some(status) = self.injected("register_callout") {
            return Err(status);
        }
        self.callouts.push(Some(handler));
        Ok(CalloutId(self.callouts.len() - 1))
    }

    fn deregister_callout(&mut self, id: CalloutId) {
        self.journal.record("deregister_callout", id.0.to_string());
        if let Some(slot) = self.callouts.get_mut(id.0) {
            *slot = None;
        }
    }

    fn set_default_device_list(&mut self, list: &[u8]) -> i32 {
        self.journal
            .record("set_default_device_list", String::from_utf8_lossy(list));
        inject!(self, "set_default_device_list");
        self.device_list = list.to_vec();
        0
    }

    fn get_default_device_list(&mut self) -> Result<Vec<u8>, i32> {
        self.journal.record("get_default_device_list", "");
        if let Some(status) = self.injected("get_default_device_list") {
            return Err(status);
        }
        Ok(self.device_list.clone())
    }

    fn init_with_args(&mut self, args: &EncodedArgs) -> i32 {
        let detail = args.to_strings().join(" ");
        self.journal.record("init_with_args", detail);
        inject!(self, "init_with_args");
        if self.init_status < 0 {
            return self.init_status;
        }
        self.initialized = true;
        let event = CalloutEvent {
            device_name: "nullpage",
            id: 1,
            size: 0,
            data: std::ptr::null_mut(),
        };
        for callout in self.callouts.iter_mut().flatten() {
            callout.callout(&event);
        }
        self.init_status
    }

    fn run_string(&mut self, script: &CStr, _user_errors: i32, exit_code: &mut i32) -> i32 {
        self.journal.record("run_string", script.to_string_lossy());
        inject!(self, "run_string");
        self.run(script.to_bytes(), exit_code)
    }

    fn run_string_with_length(&mut self, script: &[u8], _user_errors: i32, exit_code: &mut i32) -> i32 {
        self.journal
            .record("run_string_with_length", script.len().to_string());
        inject!(self, "run_string_with_length");
        self.run(script, exit_code)
    }

    fn run_string_begin(&mut self, _user_errors: i32, _exit_code: &mut i32) -> i32 {
        self.journal.record("run_string_begin", "");
        inject!(self, "run_string_begin");
        self.chunk = Some(Vec::new());
        0
    }

    fn run_string_continue(&mut self, chunk: &[u8], _user_errors: i32, _exit_code: &mut i32) -> i32 {
        self.journal.record("run_string_continue", String::from_utf8_lossy(chunk));
        inject!(self, "run_string_continue");
        match self.chunk.as_mut() {
            Some(buffer) => {
                buffer.extend_from_slice(chunk);
                ErrorCode::NEED_INPUT.0
            }
            None => ErrorCode::FATAL.0,
        }
    }

    fn run_string_end(&mut self, _user_errors: i32, exit_code: &mut i32) -> i32 {
        self.journal.record("run_string_end", "");
        inject!(self, "run_string_end");
        match self.chunk.take() {
            Some(script) => self.run(&script, exit_code),
            None => ErrorCode::FATAL.0,
        }
    }

    fn run_file(&mut self, path: &CStr, _user_errors: i32, exit_code: &mut i32) -> i32 {
        self.journal.record("run_file", path.to_string_lossy());
        inject!(self, "run_file");
        match std::fs::read(&*path.to_string_lossy()) {
            Ok(script) => self.run(&script, exit_code),
            Err(_) => ErrorCode::UNDEFINED_FILENAME.0,
        }
    }

    fn exit(&mut self) -> i32 {
        self.journal.record("exit", "");
        inject!(self, "exit");
        self.initialized = false;
        self.exit_status
    }

    fn set_param(&mut self, name: &CStr, value: &ParamValue, more_to_come: bool) -> i32 {
        let name = name.to_string_lossy().into_owned();
        self.journal
            .record("set_param", format!("{name}={value}{}", if more_to_come { " +" } else { "" }));
        inject!(self, "set_param");
        if more_to_come {
            self.pending.push((name, value.clone()));
            return 0;
        }
        for (pending_name, pending_value) in std::mem::take(&mut self.pending) {
            self.apply_param(pending_name, pending_value);
        }
        self.apply_param(name, value.clone());
        0
    }

    fn get_param(&mut self, name: &CStr, ty: ParamType, value: Option<&mut [u8]>) -> i32 {
        let name = name.to_string_lossy().into_owned();
        self.journal.record("get_param", format!("{name}:{ty}"));
        inject!(self, "get_param");
        let Some(stored) = self.params.get(&name) else {
            return ErrorCode::UNDEFINED.0;
        };
        if stored.param_type() != ty {
            return ErrorCode::TYPE_CHECK.0;
        }
        let bytes = match (stored.scalar_bytes(), stored.as_text()) {
            (Some(bytes), _) => bytes,
            (None, Some(text)) => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            (None, None) => return ErrorCode::TYPE_CHECK.0,
        };
        match value {
            None => len_status(bytes.len()),
            Some(buf) if buf.len() < bytes.len() => ErrorCode::RANGE_CHECK.0,
            Some(buf) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                0
            }
        }
    }

    fn enumerate_params(&mut self, cursor: &mut ParamCursor) -> Result<Option<(String, ParamType)>, i32> {
        self.journal.record("enumerate_params", cursor.0.to_string());
        if let Some(status) = self.injected("enumerate_params") {
            return Err(status);
        }
        let entry = self
            .params
            .iter()
            .nth(cursor.0)
            .map(|(name, value)| (name.clone(), value.param_type()));
        if entry.is_some() {
            cursor.0 += 1;
        }
        Ok(entry)
    }

    fn add_control_path(&mut self, kind: PathKind, path: &CStr) -> i32 {
        let path = path.to_string_lossy().into_owned();
        self.journal.record("add_control_path", format!("{kind} {path}"));
        inject!(self, "add_control_path");
        self.control_paths.entry(kind).or_default().push(path);
        0
    }

    fn remove_control_path(&mut self, kind: PathKind, path: &CStr) -> i32 {
        let path = path.to_string_lossy().into_owned();
        self.journal
            .record("remove_control_path", format!("{kind} {path}"));
        inject!(self, "remove_control_path");
        if let Some(paths) = self.control_paths.get_mut(&kind) {
            paths.retain(|existing| *existing != path);
        }
        0
    }

    fn purge_control_paths(&mut self, kind: PathKind) {
        self.journal.record("purge_control_paths", kind.to_string());
        self.control_paths.remove(&kind);
    }

    fn activate_path_control(&mut self, enable: bool) {
        self.journal
            .record("activate_path_control", enable.to_string());
        self.path_control_active = enable;
    }

    fn is_path_control_active(&mut self) -> bool {
        self.journal.record("is_path_control_active", "");
        self.path_control_active
    }
}
