//! [`Engine`] backed by the system interpreter library
//!
//! Handlers are boxed twice: the outer box gives the trait object a stable
//! thin address that is handed to the library as its caller handle, and the
//! trampolines below turn that address back into `&mut dyn Handler`. The
//! engine owns every box until the handler is replaced or the instance is
//! deleted, so the library never sees a dangling handle.

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int, c_uint};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use gshost_sys as sys;

use crate::args::{ArgEncoding, EncodedArgs};
use crate::engine::Engine;
use crate::error::ErrorCode;
use crate::io::{CalloutEvent, CalloutHandler, CalloutId, PollHandler, StdioHandler};
use crate::params::{ParamCursor, ParamType, ParamValue, ScalarSlot};
use crate::path_control::PathKind;
use crate::revision::Revision;

type StdioBox = Box<Box<dyn StdioHandler>>;
type PollBox = Box<Box<dyn PollHandler>>;
type CalloutBox = Box<Box<dyn CalloutHandler>>;

/// Status returned to the library when a handler panicked
const HANDLER_PANIC: c_int = ErrorCode::UNKNOWN_ERROR.0;

/// Run a handler body, turning a panic into an error status
fn guarded(body: impl FnOnce() -> c_int) -> c_int {
    catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        log::error!("interpreter callback panicked");
        HANDLER_PANIC
    })
}

unsafe extern "C" fn stdin_trampoline(handle: *mut c_void, buf: *mut c_char, len: c_int) -> c_int {
    if handle.is_null() || buf.is_null() || len <= 0 {
        return 0;
    }
    let handler = &mut *(handle as *mut Box<dyn StdioHandler>);
    let buf = std::slice::from_raw_parts_mut(buf as *mut u8, len as usize);
    guarded(|| handler.read_stdin(buf))
}

unsafe extern "C" fn stdout_trampoline(handle: *mut c_void, data: *const c_char, len: c_int) -> c_int {
    if handle.is_null() || data.is_null() || len <= 0 {
        return len.max(0);
    }
    let handler = &mut *(handle as *mut Box<dyn StdioHandler>);
    let data = std::slice::from_raw_parts(data as *const u8, len as usize);
    guarded(|| handler.write_stdout(data))
}

unsafe extern "C" fn stderr_trampoline(handle: *mut c_void, data: *const c_char, len: c_int) -> c_int {
    if handle.is_null() || data.is_null() || len <= 0 {
        return len.max(0);
    }
    let handler = &mut *(handle as *mut Box<dyn StdioHandler>);
    let data = std::slice::from_raw_parts(data as *const u8, len as usize);
    guarded(|| handler.write_stderr(data))
}

unsafe extern "C" fn poll_trampoline(handle: *mut c_void) -> c_int {
    if handle.is_null() {
        return 0;
    }
    let handler = &mut *(handle as *mut Box<dyn PollHandler>);
    guarded(|| handler.poll())
}

unsafe extern "C" fn callout_trampoline(
    _instance: *mut c_void,
    handle: *mut c_void,
    device_name: *const c_char,
    id: c_int,
    size: c_int,
    data: *mut c_void,
) -> c_int {
    if handle.is_null() {
        return crate::io::CALLOUT_UNHANDLED;
    }
    let handler = &mut *(handle as *mut Box<dyn CalloutHandler>);
    let device_name = if device_name.is_null() {
        std::borrow::Cow::Borrowed("")
    } else {
        CStr::from_ptr(device_name).to_string_lossy()
    };
    let event = CalloutEvent {
        device_name: &device_name,
        id,
        size,
        data,
    };
    guarded(|| handler.callout(&event))
}

fn handle_of<T: ?Sized>(boxed: &mut Box<Box<T>>) -> *mut c_void {
    &mut **boxed as *mut Box<T> as *mut c_void
}

/// Engine calling straight into `libgs`
pub struct NativeEngine {
    instance: *mut sys::gs_main_instance,
    stdio: Option<StdioBox>,
    poll: Option<PollBox>,
    callouts: Vec<Option<CalloutBox>>,
}

impl NativeEngine {
    /// Engine with no instance yet
    pub fn new() -> Self {
        Self {
            instance: ptr::null_mut(),
            stdio: None,
            poll: None,
            callouts: Vec::new(),
        }
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.delete_instance();
    }
}

impl Engine for NativeEngine {
    fn revision(&self) -> Result<Revision, i32> {
        let mut raw = sys::gsapi_revision_t {
            product: ptr::null(),
            copyright: ptr::null(),
            revision: 0,
            revisiondate: 0,
        };
        let len = std::mem::size_of::<sys::gsapi_revision_t>() as c_int;
        let code = unsafe { sys::gsapi_revision(&mut raw, len) };
        if code != 0 {
            // a positive return is the struct size the library expected
            return Err(if code > 0 { ErrorCode::LIMIT_CHECK.0 } else { code });
        }
        let text = |p: *const c_char| {
            if p.is_null() {
                String::new()
            } else {
                unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
            }
        };
        Ok(Revision {
            product: text(raw.product),
            copyright: text(raw.copyright),
            revision: i64::from(raw.revision),
            revision_date: i64::from(raw.revisiondate),
        })
    }

    fn new_instance(&mut self) -> i32 {
        if !self.instance.is_null() {
            return ErrorCode::FATAL.0;
        }
        let mut instance = ptr::null_mut();
        let code = unsafe { sys::gsapi_new_instance(&mut instance, ptr::null_mut()) };
        if code >= 0 {
            self.instance = instance;
        }
        code
    }

    fn delete_instance(&mut self) {
        if self.instance.is_null() {
            return;
        }
        unsafe { sys::gsapi_delete_instance(self.instance) };
        self.instance = ptr::null_mut();
        self.stdio = None;
        self.poll = None;
        self.callouts.clear();
    }

    fn set_arg_encoding(&mut self, encoding: ArgEncoding) -> i32 {
        unsafe { sys::gsapi_set_arg_encoding(self.instance, encoding.raw()) }
    }

    fn set_stdio(&mut self, handler: Box<dyn StdioHandler>) -> i32 {
        let mut boxed: StdioBox = Box::new(handler);
        let code = unsafe {
            sys::gsapi_set_stdio_with_handle(
                self.instance,
                Some(stdin_trampoline),
                Some(stdout_trampoline),
                Some(stderr_trampoline),
                handle_of(&mut boxed),
            )
        };
        if code >= 0 {
            self.stdio = Some(boxed);
        }
        code
    }

    fn set_poll(&mut self, handler: Box<dyn PollHandler>) -> i32 {
        let mut boxed: PollBox = Box::new(handler);
        let code = unsafe { sys::gsapi_set_poll_with_handle(self.instance, Some(poll_trampoline), handle_of(&mut boxed)) };
        if code >= 0 {
            self.poll = Some(boxed);
        }
        code
    }

    fn register_callout(&mut self, handler: Box<dyn CalloutHandler>) -> Result<CalloutId, i32> {
        let mut boxed: CalloutBox = Box::new(handler);
        let code = unsafe { sys::gsapi_register_callout(self.instance, Some(callout_trampoline), handle_of(&mut boxed)) };
        if code < 0 {
            return Err(code);
        }
        self.callouts.push(Some(boxed));
        Ok(CalloutId(self.callouts.len() - 1))
    }

    fn deregister_callout(&mut self, id: CalloutId) {
        if let Some(slot) = self.callouts.get_mut(id.0) {
            if let Some(mut boxed) = slot.take() {
                unsafe {
                    sys::gsapi_deregister_callout(self.instance, Some(callout_trampoline), handle_of(&mut boxed))
                };
            }
        }
    }

    fn set_default_device_list(&mut self, list: &[u8]) -> i32 {
        let Ok(len) = c_int::try_from(list.len()) else {
            return ErrorCode::LIMIT_CHECK.0;
        };
        unsafe { sys::gsapi_set_default_device_list(self.instance, list.as_ptr() as *const c_char, len) }
    }

    fn get_default_device_list(&mut self) -> Result<Vec<u8>, i32> {
        let mut list: *mut c_char = ptr::null_mut();
        let mut len: c_int = 0;
        let code = unsafe { sys::gsapi_get_default_device_list(self.instance, &mut list, &mut len) };
        if code < 0 {
            return Err(code);
        }
        if list.is_null() || len <= 0 {
            return Ok(Vec::new());
        }
        // the list is owned by the library; copy it out
        let bytes = unsafe { std::slice::from_raw_parts(list as *const u8, len as usize) };
        Ok(bytes.to_vec())
    }

    fn init_with_args(&mut self, args: &EncodedArgs) -> i32 {
        let mut argv = args.argv();
        let Ok(argc) = c_int::try_from(argv.len()) else {
            return ErrorCode::LIMIT_CHECK.0;
        };
        unsafe { sys::gsapi_init_with_args(self.instance, argc, argv.as_mut_ptr()) }
    }

    fn run_string(&mut self, script: &CStr, user_errors: i32, exit_code: &mut i32) -> i32 {
        unsafe { sys::gsapi_run_string(self.instance, script.as_ptr(), user_errors, exit_code) }
    }

    fn run_string_with_length(&mut self, script: &[u8], user_errors: i32, exit_code: &mut i32) -> i32 {
        let Ok(len) = c_uint::try_from(script.len()) else {
            return ErrorCode::LIMIT_CHECK.0;
        };
        unsafe {
            sys::gsapi_run_string_with_length(self.instance, script.as_ptr() as *const c_char, len, user_errors, exit_code)
        }
    }

    fn run_string_begin(&mut self, user_errors: i32, exit_code: &mut i32) -> i32 {
        unsafe { sys::gsapi_run_string_begin(self.instance, user_errors, exit_code) }
    }

    fn run_string_continue(&mut self, chunk: &[u8], user_errors: i32, exit_code: &mut i32) -> i32 {
        let Ok(len) = c_uint::try_from(chunk.len()) else {
            return ErrorCode::LIMIT_CHECK.0;
        };
        unsafe {
            sys::gsapi_run_string_continue(self.instance, chunk.as_ptr() as *const c_char, len, user_errors, exit_code)
        }
    }

    fn run_string_end(&mut self, user_errors: i32, exit_code: &mut i32) -> i32 {
        unsafe { sys::gsapi_run_string_end(self.instance, user_errors, exit_code) }
    }

    fn run_file(&mut self, path: &CStr, user_errors: i32, exit_code: &mut i32) -> i32 {
        unsafe { sys::gsapi_run_file(self.instance, path.as_ptr(), user_errors, exit_code) }
    }

    fn exit(&mut self) -> i32 {
        unsafe { sys::gsapi_exit(self.instance) }
    }

    fn set_param(&mut self, name: &CStr, value: &ParamValue, more_to_come: bool) -> i32 {
        let mut ty = value.param_type().raw();
        if more_to_come {
            ty |= sys::gs_spt_more_to_come;
        }
        let mut slot = ScalarSlot::default();
        let text;
        let pointer: *const c_void = match value.scalar_bytes() {
            Some(bytes) => {
                slot.0[..bytes.len()].copy_from_slice(&bytes);
                slot.0.as_ptr() as *const c_void
            }
            None => {
                text = match value.c_text() {
                    Some(text) => text,
                    None => return ErrorCode::TYPE_CHECK.0,
                };
                text.as_ptr() as *const c_void
            }
        };
        unsafe { sys::gsapi_set_param(self.instance, name.as_ptr(), pointer, ty) }
    }

    fn get_param(&mut self, name: &CStr, ty: ParamType, value: Option<&mut [u8]>) -> i32 {
        let pointer = match value {
            Some(buf) => buf.as_mut_ptr() as *mut c_void,
            None => ptr::null_mut(),
        };
        unsafe { sys::gsapi_get_param(self.instance, name.as_ptr(), pointer, ty.raw()) }
    }

    fn enumerate_params(&mut self, cursor: &mut ParamCursor) -> Result<Option<(String, ParamType)>, i32> {
        let mut iterator = cursor.0 as *mut c_void;
        let mut key: *const c_char = ptr::null();
        let mut raw_type: sys::gs_set_param_type = sys::gs_spt_invalid;
        let code = unsafe { sys::gsapi_enumerate_params(self.instance, &mut iterator, &mut key, &mut raw_type) };
        cursor.0 = iterator as usize;
        if code < 0 {
            return Err(code);
        }
        if code > 0 || key.is_null() {
            return Ok(None);
        }
        let name = unsafe { CStr::from_ptr(key) }.to_string_lossy().into_owned();
        match ParamType::from_raw(raw_type) {
            Some(ty) => Ok(Some((name, ty))),
            None => {
                log::warn!("parameter '{}' has unknown type tag {}", name, raw_type);
                Err(ErrorCode::TYPE_CHECK.0)
            }
        }
    }

    fn add_control_path(&mut self, kind: PathKind, path: &CStr) -> i32 {
        unsafe { sys::gsapi_add_control_path(self.instance, kind.raw(), path.as_ptr()) }
    }

    fn remove_control_path(&mut self, kind: PathKind, path: &CStr) -> i32 {
        unsafe { sys::gsapi_remove_control_path(self.instance, kind.raw(), path.as_ptr()) }
    }

    fn purge_control_paths(&mut self, kind: PathKind) {
        unsafe { sys::gsapi_purge_control_paths(self.instance, kind.raw()) }
    }

    fn activate_path_control(&mut self, enable: bool) {
        unsafe { sys::gsapi_activate_path_control(self.instance, c_int::from(enable)) }
    }

    fn is_path_control_active(&mut self) -> bool {
        unsafe { sys::gsapi_is_path_control_active(self.instance) != 0 }
    }
}
