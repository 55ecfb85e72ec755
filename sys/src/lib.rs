//! Raw bindings to the Ghostscript interpreter API (`iapi.h`)
//!
//! These are the C-linkage entry points of the `gs` shared library exactly as
//! the library exports them. Nothing here is safe to call directly; the
//! `gshost-runtime` crate wraps them behind its `Engine` trait.
//!
//! Every function returns a signed status code: `0` for success, a negative
//! `gs_error_*` value otherwise. A few (revision, get_param with a null value,
//! enumerate_params) use positive returns for sizes or "no more elements".
//!
//! The link directive is only emitted with the `link` feature. On Windows the
//! library ships as `gsdll64`; everywhere else it is `libgs`.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(clippy::missing_safety_doc)]

use std::os::raw::{c_char, c_int, c_long, c_uint, c_void};

/// Opaque interpreter instance pointer handed out by `gsapi_new_instance`
pub type gs_main_instance = c_void;

/// Library revision record filled in by `gsapi_revision`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gsapi_revision_t {
    /// Product name, static C string owned by the library
    pub product: *const c_char,
    /// Copyright notice, static C string owned by the library
    pub copyright: *const c_char,
    /// Revision number, e.g. `10020` for 10.02.0
    pub revision: c_long,
    /// Revision date as `yyyymmdd`
    pub revisiondate: c_long,
}

// ============================================================================
// Argument encodings (gsapi_set_arg_encoding)
// ============================================================================

/// Arguments are in the local 8-bit code page
pub const GS_ARG_ENCODING_LOCAL: c_int = 0;
/// Arguments are UTF-8
pub const GS_ARG_ENCODING_UTF8: c_int = 1;
/// Arguments are UTF-16LE (`wchar_t` on Windows)
pub const GS_ARG_ENCODING_UTF16LE: c_int = 2;

// ============================================================================
// Parameter types (gs_set_param_type)
// ============================================================================

/// Discriminant passed with every set/get/enumerate param call
pub type gs_set_param_type = c_int;

pub const gs_spt_invalid: gs_set_param_type = -1;
/// Value pointer is null
pub const gs_spt_null: gs_set_param_type = 0;
/// Value points to an `int` (0 false, non-zero true)
pub const gs_spt_bool: gs_set_param_type = 1;
/// Value points to an `int`
pub const gs_spt_int: gs_set_param_type = 2;
/// Value points to a `float`
pub const gs_spt_float: gs_set_param_type = 3;
/// Value is a NUL-terminated name
pub const gs_spt_name: gs_set_param_type = 4;
/// Value is a NUL-terminated string
pub const gs_spt_string: gs_set_param_type = 5;
/// Value points to a `long`
pub const gs_spt_long: gs_set_param_type = 6;
/// Value points to an `int64_t`
pub const gs_spt_i64: gs_set_param_type = 7;
/// Value points to a `size_t`
pub const gs_spt_size_t: gs_set_param_type = 8;
/// Value is a string parsed as PostScript by the interpreter
pub const gs_spt_parsed: gs_set_param_type = 9;
/// OR'd into the type to defer application until a set without it
pub const gs_spt_more_to_come: gs_set_param_type = 1 << 31;

// ============================================================================
// Path control categories (gs_path_control_t)
// ============================================================================

/// Path-control category passed to the control path functions
pub type gs_path_control_t = c_int;

pub const gs_permit_file_reading: gs_path_control_t = 0;
pub const gs_permit_file_writing: gs_path_control_t = 1;
pub const gs_permit_file_control: gs_path_control_t = 2;

// ============================================================================
// Callback signatures
// ============================================================================

/// Reads up to `len` bytes of stdin into `buf`; returns bytes read, 0 at EOF
pub type gsapi_stdin_fn =
    Option<unsafe extern "C" fn(caller_handle: *mut c_void, buf: *mut c_char, len: c_int) -> c_int>;

/// Consumes `len` bytes of stdout/stderr; returns bytes consumed
pub type gsapi_stdout_fn = Option<
    unsafe extern "C" fn(caller_handle: *mut c_void, str: *const c_char, len: c_int) -> c_int,
>;

/// Polled periodically during execution; a negative return aborts
pub type gsapi_poll_fn = Option<unsafe extern "C" fn(caller_handle: *mut c_void) -> c_int>;

/// Device callout; returns a negative value when the event is not handled
pub type gs_callout = Option<
    unsafe extern "C" fn(
        instance: *mut c_void,
        callout_handle: *mut c_void,
        device_name: *const c_char,
        id: c_int,
        size: c_int,
        data: *mut c_void,
    ) -> c_int,
>;

// ============================================================================
// Raw function declarations (extern "C")
// ============================================================================

#[cfg_attr(all(feature = "link", windows), link(name = "gsdll64"))]
#[cfg_attr(all(feature = "link", not(windows)), link(name = "gs"))]
extern "C" {
    // Revision
    pub fn gsapi_revision(pr: *mut gsapi_revision_t, len: c_int) -> c_int;

    // Instance lifecycle
    pub fn gsapi_new_instance(pinstance: *mut *mut gs_main_instance, caller_handle: *mut c_void) -> c_int;
    pub fn gsapi_delete_instance(instance: *mut gs_main_instance);

    // Stdio and polling
    pub fn gsapi_set_stdio(
        instance: *mut gs_main_instance,
        stdin_fn: gsapi_stdin_fn,
        stdout_fn: gsapi_stdout_fn,
        stderr_fn: gsapi_stdout_fn,
    ) -> c_int;
    pub fn gsapi_set_stdio_with_handle(
        instance: *mut gs_main_instance,
        stdin_fn: gsapi_stdin_fn,
        stdout_fn: gsapi_stdout_fn,
        stderr_fn: gsapi_stdout_fn,
        caller_handle: *mut c_void,
    ) -> c_int;
    pub fn gsapi_set_poll(instance: *mut gs_main_instance, poll_fn: gsapi_poll_fn) -> c_int;
    pub fn gsapi_set_poll_with_handle(
        instance: *mut gs_main_instance,
        poll_fn: gsapi_poll_fn,
        caller_handle: *mut c_void,
    ) -> c_int;

    // Callouts
    pub fn gsapi_register_callout(
        instance: *mut gs_main_instance,
        callout: gs_callout,
        callout_handle: *mut c_void,
    ) -> c_int;
    pub fn gsapi_deregister_callout(
        instance: *mut gs_main_instance,
        callout: gs_callout,
        callout_handle: *mut c_void,
    );

    // Devices and argument encoding
    pub fn gsapi_set_default_device_list(
        instance: *mut gs_main_instance,
        list: *const c_char,
        listlen: c_int,
    ) -> c_int;
    pub fn gsapi_get_default_device_list(
        instance: *mut gs_main_instance,
        list: *mut *mut c_char,
        listlen: *mut c_int,
    ) -> c_int;
    pub fn gsapi_set_arg_encoding(instance: *mut gs_main_instance, encoding: c_int) -> c_int;

    // Initialisation
    pub fn gsapi_init_with_args(instance: *mut gs_main_instance, argc: c_int, argv: *mut *mut c_char) -> c_int;

    // Execution
    pub fn gsapi_run_string_begin(
        instance: *mut gs_main_instance,
        user_errors: c_int,
        pexit_code: *mut c_int,
    ) -> c_int;
    pub fn gsapi_run_string_continue(
        instance: *mut gs_main_instance,
        str: *const c_char,
        length: c_uint,
        user_errors: c_int,
        pexit_code: *mut c_int,
    ) -> c_int;
    pub fn gsapi_run_string_end(
        instance: *mut gs_main_instance,
        user_errors: c_int,
        pexit_code: *mut c_int,
    ) -> c_int;
    pub fn gsapi_run_string_with_length(
        instance: *mut gs_main_instance,
        str: *const c_char,
        length: c_uint,
        user_errors: c_int,
        pexit_code: *mut c_int,
    ) -> c_int;
    pub fn gsapi_run_string(
        instance: *mut gs_main_instance,
        str: *const c_char,
        user_errors: c_int,
        pexit_code: *mut c_int,
    ) -> c_int;
    pub fn gsapi_run_file(
        instance: *mut gs_main_instance,
        file_name: *const c_char,
        user_errors: c_int,
        pexit_code: *mut c_int,
    ) -> c_int;

    // Shutdown
    pub fn gsapi_exit(instance: *mut gs_main_instance) -> c_int;

    // Parameters
    pub fn gsapi_set_param(
        instance: *mut gs_main_instance,
        param: *const c_char,
        value: *const c_void,
        type_: gs_set_param_type,
    ) -> c_int;
    pub fn gsapi_get_param(
        instance: *mut gs_main_instance,
        param: *const c_char,
        value: *mut c_void,
        type_: gs_set_param_type,
    ) -> c_int;
    pub fn gsapi_enumerate_params(
        instance: *mut gs_main_instance,
        iterator: *mut *mut c_void,
        key: *mut *const c_char,
        type_: *mut gs_set_param_type,
    ) -> c_int;

    // Path control
    pub fn gsapi_add_control_path(instance: *mut gs_main_instance, type_: c_int, path: *const c_char) -> c_int;
    pub fn gsapi_remove_control_path(instance: *mut gs_main_instance, type_: c_int, path: *const c_char) -> c_int;
    pub fn gsapi_purge_control_paths(instance: *mut gs_main_instance, type_: c_int);
    pub fn gsapi_activate_path_control(instance: *mut gs_main_instance, enable: c_int);
    pub fn gsapi_is_path_control_active(instance: *mut gs_main_instance) -> c_int;
}
