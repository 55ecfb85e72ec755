//! Interpreter instance lifecycle
//!
//! [`Instance`] owns the native handle and enforces the legal call order:
//!
//! ```text
//! Created ──config──▶ Configured ──init──▶ Initialized ──exit──▶ Exited
//!    │                                         │                   │
//!    └─────────────────────close / drop────────┴───────────────────┴──▶ Destroyed
//! ```
//!
//! Configuration calls are only accepted before `init`. Execution is accepted
//! once `init` has been attempted, even when it stopped early on `Quit` or
//! `Info`. Every native status passes through the classifier in
//! [`crate::error`] before anything else happens.

use std::ffi::CString;
use std::path::Path;

use crate::args::{ArgEncoding, EncodedArgs};
use crate::engine::{default_engine, Engine};
use crate::error::{check_error, check_fatal, ErrorCode, GsError, Result};
use crate::handle::NativeHandle;
use crate::io::{CalloutHandler, CalloutId, PollHandler, StdioHandler};
use crate::params::{decode_scalar, decode_text, ParamIter, ParamType, ParamValue, ScalarSlot};
use crate::path_control::PathKind;

/// `user_errors` value passed to every run call
const USER_ERRORS: i32 = 0;

/// Lifecycle state of an [`Instance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Native instance exists, nothing configured yet
    Created,
    /// At least one configuration call succeeded
    Configured,
    /// `init` was attempted and did not fail
    Initialized,
    /// The interpreter was shut down
    Exited,
    /// The native instance is gone
    Destroyed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Created => "created",
            State::Configured => "configured",
            State::Initialized => "initialized",
            State::Exited => "exited",
            State::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// The single live interpreter instance
///
/// Dropping an `Instance` runs [`Instance::close`], so the native instance is
/// released on every exit path, panics included.
pub struct Instance {
    handle: NativeHandle,
    state: State,
    initialized: bool,
    arg_encoding: ArgEncoding,
}

impl Instance {
    /// Create an instance on the system library
    ///
    /// Fails with [`GsError::EngineUnavailable`] without the `native`
    /// feature, and with a native error while another instance is alive.
    pub fn new() -> Result<Self> {
        Self::with_engine(default_engine()?)
    }

    /// Create an instance driven by `engine`
    pub fn with_engine(engine: Box<dyn Engine>) -> Result<Self> {
        let handle = NativeHandle::create(engine)?;
        Ok(Self {
            handle,
            state: State::Created,
            initialized: false,
            arg_encoding: ArgEncoding::default(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    /// True once `init` fully succeeded and until `exit`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn require(&self, operation: &'static str, allowed: &[State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(GsError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn require_live(&self, operation: &'static str) -> Result<()> {
        self.require(
            operation,
            &[State::Created, State::Configured, State::Initialized, State::Exited],
        )
    }

    fn configure(&mut self, operation: &'static str, call: impl FnOnce(&mut dyn Engine) -> i32) -> Result<()> {
        self.require(operation, &[State::Created, State::Configured])?;
        let code = call(self.handle.engine());
        check_error(code, operation)?;
        self.state = State::Configured;
        log::debug!("{} ok", operation);
        Ok(())
    }

    // === Configuration (before init) ===

    /// Select how init arguments are encoded
    pub fn set_arg_encoding(&mut self, encoding: ArgEncoding) -> Result<()> {
        self.configure("set_arg_encoding", |engine| engine.set_arg_encoding(encoding))?;
        self.arg_encoding = encoding;
        Ok(())
    }

    /// Redirect the interpreter's standard streams to `handler`
    pub fn set_stdio(&mut self, handler: impl StdioHandler + 'static) -> Result<()> {
        self.configure("set_stdio", |engine| engine.set_stdio(Box::new(handler)))
    }

    /// Install a poll handler; a negative return aborts the running operation
    pub fn set_poll(&mut self, handler: impl PollHandler + 'static) -> Result<()> {
        self.configure("set_poll", |engine| engine.set_poll(Box::new(handler)))
    }

    /// Register a device callout handler
    pub fn register_callout(&mut self, handler: impl CalloutHandler + 'static) -> Result<CalloutId> {
        self.require("register_callout", &[State::Created, State::Configured])?;
        let id = self
            .handle
            .engine()
            .register_callout(Box::new(handler))
            .map_err(|code| GsError::native(code, "register_callout"))?;
        self.state = State::Configured;
        Ok(id)
    }

    /// Remove a callout handler registered earlier
    pub fn deregister_callout(&mut self, id: CalloutId) -> Result<()> {
        self.require_live("deregister_callout")?;
        self.handle.engine().deregister_callout(id);
        Ok(())
    }

    /// Replace the list of devices tried when none is selected
    pub fn set_default_device_list(&mut self, list: &str) -> Result<()> {
        self.configure("set_default_device_list", |engine| {
            engine.set_default_device_list(list.as_bytes())
        })
    }

    /// Current default device list, space separated
    pub fn default_device_list(&mut self) -> Result<String> {
        self.require_live("get_default_device_list")?;
        let bytes = self
            .handle
            .engine()
            .get_default_device_list()
            .map_err(|code| GsError::native(code, "get_default_device_list"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // === Initialisation ===

    /// Initialise the interpreter with command-line style arguments
    ///
    /// The program-name placeholder is prepended here. A `Quit` or `Info`
    /// result (for example from `-h` or a `-c ... quit` sequence) is not an
    /// error: the instance moves to [`State::Initialized`] with
    /// [`Instance::is_initialized`] false. Any other failure raises and
    /// leaves the instance able only to be closed.
    pub fn init_with_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        self.require("init_with_args", &[State::Created, State::Configured])?;
        let encoded = EncodedArgs::encode(self.arg_encoding, args)?;
        log::debug!("init_with_args {:?}", encoded.to_strings());

        let code = self.handle.engine().init_with_args(&encoded);
        if let Err(err) = check_error(code, "init_with_args") {
            self.state = State::Exited;
            return Err(err);
        }

        self.state = State::Initialized;
        self.initialized = code != ErrorCode::QUIT.0 && code != ErrorCode::INFO.0;
        if !self.initialized {
            log::debug!("init stopped early: {}", ErrorCode(code));
        }
        Ok(())
    }

    // === Execution ===

    fn finish_run(&self, operation: &'static str, code: i32, exit_code: i32) -> Result<i32> {
        log::debug!("{} -> status {}, exit code {}", operation, code, exit_code);
        check_fatal(code, operation)?;
        Ok(exit_code)
    }

    /// Execute a complete script and return the interpreter's exit code
    ///
    /// Only fatal statuses raise. A script error such as `undefined` is
    /// reported through the exit code alone.
    pub fn run_string(&mut self, script: &str) -> Result<i32> {
        self.require("run_string", &[State::Initialized])?;
        let script = CString::new(script).map_err(|_| GsError::InteriorNul {
            what: "script (use run_string_with_length)".to_string(),
        })?;
        let mut exit_code = 0;
        let code = self.handle.engine().run_string(&script, USER_ERRORS, &mut exit_code);
        self.finish_run("run_string", code, exit_code)
    }

    /// Execute a script of explicit length; embedded NUL bytes are kept
    pub fn run_string_with_length(&mut self, script: &[u8]) -> Result<i32> {
        self.require("run_string_with_length", &[State::Initialized])?;
        check_length("script", script)?;
        let mut exit_code = 0;
        let code = self
            .handle
            .engine()
            .run_string_with_length(script, USER_ERRORS, &mut exit_code);
        self.finish_run("run_string_with_length", code, exit_code)
    }

    /// Execute a file
    ///
    /// A missing file fails with [`GsError::FileNotFound`] before the
    /// interpreter is called.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<i32> {
        let path = path.as_ref();
        self.require("run_file", &[State::Initialized])?;
        if !path.exists() {
            return Err(GsError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let c_path = path_to_cstring(path)?;
        let mut exit_code = 0;
        let code = self.handle.engine().run_file(&c_path, USER_ERRORS, &mut exit_code);
        self.finish_run("run_file", code, exit_code)
    }

    /// Open a chunked execution session
    pub fn run_string_begin(&mut self) -> Result<i32> {
        self.require("run_string_begin", &[State::Initialized])?;
        let mut exit_code = 0;
        let code = self.handle.engine().run_string_begin(USER_ERRORS, &mut exit_code);
        self.finish_run("run_string_begin", code, exit_code)
    }

    /// Feed one chunk to the open session
    ///
    /// `NeedInput` is the normal reply between chunks and never raises.
    pub fn run_string_continue(&mut self, chunk: &[u8]) -> Result<i32> {
        self.require("run_string_continue", &[State::Initialized])?;
        check_length("chunk", chunk)?;
        let mut exit_code = 0;
        let code = self
            .handle
            .engine()
            .run_string_continue(chunk, USER_ERRORS, &mut exit_code);
        if code == ErrorCode::NEED_INPUT.0 {
            log::trace!("run_string_continue: {} bytes, need more input", chunk.len());
            return Ok(exit_code);
        }
        self.finish_run("run_string_continue", code, exit_code)
    }

    /// Close the chunked session
    pub fn run_string_end(&mut self) -> Result<i32> {
        self.require("run_string_end", &[State::Initialized])?;
        let mut exit_code = 0;
        let code = self.handle.engine().run_string_end(USER_ERRORS, &mut exit_code);
        self.finish_run("run_string_end", code, exit_code)
    }

    /// Run `chunks` as one chunked session and return the final exit code
    pub fn run_chunks<I>(&mut self, chunks: I) -> Result<i32>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.run_string_begin()?;
        for chunk in chunks {
            self.run_string_continue(chunk.as_ref())?;
        }
        self.run_string_end()
    }

    // === Shutdown ===

    /// Shut the interpreter down
    ///
    /// A no-op unless `init` fully succeeded. A failing status is logged
    /// and dropped so teardown always completes; `Quit` counts as success.
    pub fn exit(&mut self) {
        if !self.initialized {
            return;
        }
        let code = self.handle.engine().exit();
        self.initialized = false;
        self.state = State::Exited;
        log::debug!("exit -> status {}", code);
        if let Err(err) = check_error(code, "exit") {
            log::warn!("ignoring error while shutting interpreter down: {}", err);
        }
    }

    /// Exit if needed, then destroy the native instance
    ///
    /// Never fails; teardown errors are logged. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == State::Destroyed {
            return;
        }
        self.exit();
        self.handle.destroy();
        self.state = State::Destroyed;
    }

    // === Parameters ===

    /// Set a parameter
    ///
    /// With `more_to_come` the value is queued and applied together with the
    /// next set that clears the flag.
    pub fn set_param(&mut self, name: &str, value: impl Into<ParamValue>, more_to_come: bool) -> Result<()> {
        self.require("set_param", &[State::Initialized])?;
        let value = value.into();
        value.validate(name)?;
        let c_name = param_name(name)?;
        log::debug!("set_param {}={}{}", name, value, if more_to_come { " (batched)" } else { "" });
        let code = self.handle.engine().set_param(&c_name, &value, more_to_come);
        check_error(code, &format!("set_param '{name}'"))
    }

    /// Read a parameter as `ty`
    ///
    /// Text values are read in two steps: a size query, then a read into a
    /// buffer of that size.
    pub fn get_param(&mut self, name: &str, ty: ParamType) -> Result<ParamValue> {
        self.require("get_param", &[State::Initialized])?;
        let c_name = param_name(name)?;
        let context = format!("get_param '{name}'");
        let engine = self.handle.engine();

        if ty.is_textual() {
            let size = engine.get_param(&c_name, ty, None);
            check_error(size, &context)?;
            let mut buf = vec![0u8; usize::try_from(size).unwrap_or(0)];
            if !buf.is_empty() {
                let code = engine.get_param(&c_name, ty, Some(&mut buf));
                check_error(code, &context)?;
            }
            return Ok(decode_text(ty, buf));
        }

        let Some(width) = ty.scalar_width() else {
            return Err(GsError::MalformedParam {
                name: name.to_string(),
                reason: format!("{ty} values cannot be read"),
            });
        };
        let mut slot = ScalarSlot::default();
        let code = engine.get_param(&c_name, ty, Some(&mut slot.0[..width]));
        check_error(code, &context)?;
        decode_scalar(name, ty, &slot.0[..width])
    }

    /// Read a boolean parameter
    pub fn get_param_bool(&mut self, name: &str) -> Result<bool> {
        match self.get_param(name, ParamType::Bool)? {
            ParamValue::Bool(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read an `int` parameter
    pub fn get_param_int(&mut self, name: &str) -> Result<i32> {
        match self.get_param(name, ParamType::Int)? {
            ParamValue::Int(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read a `float` parameter
    pub fn get_param_float(&mut self, name: &str) -> Result<f32> {
        match self.get_param(name, ParamType::Float)? {
            ParamValue::Float(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read a `long` parameter
    pub fn get_param_long(&mut self, name: &str) -> Result<i64> {
        match self.get_param(name, ParamType::Long)? {
            ParamValue::Long(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read a 64-bit parameter
    pub fn get_param_i64(&mut self, name: &str) -> Result<i64> {
        match self.get_param(name, ParamType::I64)? {
            ParamValue::I64(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read a `size_t` parameter
    pub fn get_param_size(&mut self, name: &str) -> Result<u64> {
        match self.get_param(name, ParamType::SizeT)? {
            ParamValue::SizeT(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read a string parameter
    pub fn get_param_string(&mut self, name: &str) -> Result<String> {
        match self.get_param(name, ParamType::String)? {
            ParamValue::String(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Read a name parameter
    pub fn get_param_name(&mut self, name: &str) -> Result<String> {
        match self.get_param(name, ParamType::Name)? {
            ParamValue::Name(value) => Ok(value),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Enumerate the interpreter's parameters
    ///
    /// Requires a fully initialised interpreter. Each call starts a fresh
    /// enumeration.
    pub fn enumerate_params(&mut self) -> Result<ParamIter<'_>> {
        if !self.initialized {
            return Err(GsError::InvalidState {
                operation: "enumerate_params",
                state: self.state,
            });
        }
        Ok(ParamIter::new(self.handle.engine()))
    }

    // === Path control ===

    /// Permit `path` for `kind` access
    pub fn add_control_path(&mut self, kind: PathKind, path: &str) -> Result<()> {
        self.require_live("add_control_path")?;
        let c_path = control_path(path)?;
        let code = self.handle.engine().add_control_path(kind, &c_path);
        check_error(code, &format!("add_control_path {kind} '{path}'"))
    }

    /// Withdraw a permitted path
    pub fn remove_control_path(&mut self, kind: PathKind, path: &str) -> Result<()> {
        self.require_live("remove_control_path")?;
        let c_path = control_path(path)?;
        let code = self.handle.engine().remove_control_path(kind, &c_path);
        check_error(code, &format!("remove_control_path {kind} '{path}'"))
    }

    /// Remove every permitted path of `kind`
    pub fn purge_control_paths(&mut self, kind: PathKind) -> Result<()> {
        self.require_live("purge_control_paths")?;
        self.handle.engine().purge_control_paths(kind);
        Ok(())
    }

    /// Turn path enforcement on or off
    pub fn activate_path_control(&mut self, enable: bool) -> Result<()> {
        self.require_live("activate_path_control")?;
        self.handle.engine().activate_path_control(enable);
        Ok(())
    }

    /// Whether path enforcement is on
    pub fn is_path_control_active(&mut self) -> Result<bool> {
        self.require_live("is_path_control_active")?;
        Ok(self.handle.engine().is_path_control_active())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .field("arg_encoding", &self.arg_encoding)
            .finish()
    }
}

fn check_length(what: &'static str, data: &[u8]) -> Result<()> {
    if u32::try_from(data.len()).is_err() {
        return Err(GsError::InvalidLength { what, len: data.len() });
    }
    Ok(())
}

fn param_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| GsError::InteriorNul {
        what: format!("parameter name {name:?}"),
    })
}

fn control_path(path: &str) -> Result<CString> {
    CString::new(path).map_err(|_| GsError::InteriorNul {
        what: format!("control path {path:?}"),
    })
}

fn unexpected(name: &str, value: &ParamValue) -> GsError {
    GsError::MalformedParam {
        name: name.to_string(),
        reason: format!("unexpected {} value {}", value.param_type(), value),
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(|_| GsError::InteriorNul {
        what: format!("path {}", path.display()),
    })
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.to_string_lossy().into_owned()).map_err(|_| GsError::InteriorNul {
        what: format!("path {}", path.display()),
    })
}
