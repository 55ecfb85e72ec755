//! The interpreter API as a Rust trait
//!
//! [`Engine`] mirrors the native `gsapi_*` entry points one to one and keeps
//! their raw status-code contract: methods return the signed integer the
//! library returned and leave classification to the caller. The wrapper in
//! [`crate::instance`] is written against this trait only, so it can drive
//! the real library ([`crate::native::NativeEngine`], feature `native`) or a
//! scripted stand-in ([`crate::testing::MockEngine`]).
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use gshost_runtime::engine::Engine;
//!
//! struct RemoteEngine { /* connection to an interpreter service */ }
//!
//! impl Engine for RemoteEngine {
//!     fn new_instance(&mut self) -> i32 {
//!         // open a session, return 0 or a negative status
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

use std::ffi::CStr;

use crate::args::{ArgEncoding, EncodedArgs};
use crate::error::{GsError, Result};
use crate::io::{CalloutHandler, CalloutId, PollHandler, StdioHandler};
use crate::params::{ParamCursor, ParamType, ParamValue};
use crate::path_control::PathKind;
use crate::revision::Revision;

/// Native interpreter entry points
///
/// All methods other than [`Engine::revision`] operate on the single native
/// instance owned by the engine, created by [`Engine::new_instance`] and
/// released by [`Engine::delete_instance`]. Run methods write the
/// interpreter's own exit code into `exit_code`, separately from the status
/// they return.
pub trait Engine {
    /// Library revision; available without an instance
    fn revision(&self) -> std::result::Result<Revision, i32>;

    /// Create the native instance
    fn new_instance(&mut self) -> i32;

    /// Release the native instance; a no-op when none exists
    fn delete_instance(&mut self);

    /// Select how init arguments are decoded
    fn set_arg_encoding(&mut self, encoding: ArgEncoding) -> i32;

    /// Redirect stdin/stdout/stderr to `handler`
    fn set_stdio(&mut self, handler: Box<dyn StdioHandler>) -> i32;

    /// Install the poll handler
    fn set_poll(&mut self, handler: Box<dyn PollHandler>) -> i32;

    /// Register a device callout handler
    fn register_callout(&mut self, handler: Box<dyn CalloutHandler>) -> std::result::Result<CalloutId, i32>;

    /// Remove a callout handler registered earlier
    fn deregister_callout(&mut self, id: CalloutId);

    /// Replace the list of devices tried when none is selected
    fn set_default_device_list(&mut self, list: &[u8]) -> i32;

    /// Current default device list
    fn get_default_device_list(&mut self) -> std::result::Result<Vec<u8>, i32>;

    /// Initialise the interpreter with a full argument vector
    fn init_with_args(&mut self, args: &EncodedArgs) -> i32;

    /// Execute a NUL-terminated script
    fn run_string(&mut self, script: &CStr, user_errors: i32, exit_code: &mut i32) -> i32;

    /// Execute a script of explicit length (may contain NUL bytes)
    fn run_string_with_length(&mut self, script: &[u8], user_errors: i32, exit_code: &mut i32) -> i32;

    /// Open a chunked execution session
    fn run_string_begin(&mut self, user_errors: i32, exit_code: &mut i32) -> i32;

    /// Feed one chunk to the open session
    fn run_string_continue(&mut self, chunk: &[u8], user_errors: i32, exit_code: &mut i32) -> i32;

    /// Close the chunked session
    fn run_string_end(&mut self, user_errors: i32, exit_code: &mut i32) -> i32;

    /// Execute a file
    fn run_file(&mut self, path: &CStr, user_errors: i32, exit_code: &mut i32) -> i32;

    /// Shut the interpreter down
    fn exit(&mut self) -> i32;

    /// Set a parameter; `more_to_come` defers application until a later set
    fn set_param(&mut self, name: &CStr, value: &ParamValue, more_to_come: bool) -> i32;

    /// Read a parameter
    ///
    /// With `value == None` returns the byte size the value needs. Otherwise
    /// writes the value into the buffer (native-endian for scalars, NUL
    /// terminated for text) and returns a non-negative status.
    fn get_param(&mut self, name: &CStr, ty: ParamType, value: Option<&mut [u8]>) -> i32;

    /// Advance a parameter enumeration
    ///
    /// `Ok(None)` means no more elements.
    fn enumerate_params(&mut self, cursor: &mut ParamCursor) -> std::result::Result<Option<(String, ParamType)>, i32>;

    /// Permit `path` for `kind` access
    fn add_control_path(&mut self, kind: PathKind, path: &CStr) -> i32;

    /// Withdraw a permitted path
    fn remove_control_path(&mut self, kind: PathKind, path: &CStr) -> i32;

    /// Remove every permitted path of `kind`
    fn purge_control_paths(&mut self, kind: PathKind);

    /// Switch path enforcement on or off
    fn activate_path_control(&mut self, enable: bool);

    /// Whether path enforcement is on
    fn is_path_control_active(&mut self) -> bool;
}

/// Engine bound to the system interpreter library
///
/// Fails with [`GsError::EngineUnavailable`] when the crate was built
/// without the `native` feature.
pub fn default_engine() -> Result<Box<dyn Engine>> {
    #[cfg(feature = "native")]
    {
        Ok(Box::new(crate::native::NativeEngine::new()))
    }
    #[cfg(not(feature = "native"))]
    {
        Err(GsError::EngineUnavailable(
            "built without the `native` feature; rebuild with `--features native` to link libgs".to_string(),
        ))
    }
}

/// Revision of the system interpreter library
pub fn revision() -> Result<Revision> {
    let engine = default_engine()?;
    engine
        .revision()
        .map_err(|code| GsError::native(code, "gsapi_revision"))
}

#[cfg(all(test, not(feature = "native")))]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_unavailable_without_native() {
        match default_engine() {
            Err(GsError::EngineUnavailable(reason)) => assert!(reason.contains("native")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("engine should not be available"),
        }
        assert!(matches!(revision(), Err(GsError::EngineUnavailable(_))));
    }
}
