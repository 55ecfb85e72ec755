//! Argument-list marshaling for `init_with_args`
//!
//! Arguments are opaque command-line strings (`-dSAFER`, `-sDEVICE=png16m`,
//! ...) passed through verbatim. The interpreter ignores `argv[0]`, so a
//! program-name placeholder is always prepended here.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use gshost_sys::{GS_ARG_ENCODING_LOCAL, GS_ARG_ENCODING_UTF16LE, GS_ARG_ENCODING_UTF8};
use serde::{Deserialize, Serialize};

use crate::error::{GsError, Result};

/// Placeholder passed as `argv[0]`
pub const PROGRAM_NAME: &str = "gshost";

/// How the interpreter should decode the argument strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgEncoding {
    /// Local 8-bit code page; bytes are passed unchanged
    #[default]
    Local,
    /// UTF-8
    Utf8,
    /// UTF-16 little endian
    Utf16le,
}

impl ArgEncoding {
    /// Native `GS_ARG_ENCODING_*` value
    pub fn raw(self) -> c_int {
        match self {
            ArgEncoding::Local => GS_ARG_ENCODING_LOCAL,
            ArgEncoding::Utf8 => GS_ARG_ENCODING_UTF8,
            ArgEncoding::Utf16le => GS_ARG_ENCODING_UTF16LE,
        }
    }
}

/// Arguments encoded for the C API, program name included
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedArgs {
    /// NUL-terminated 8-bit strings (local and UTF-8 encodings)
    Narrow(Vec<CString>),
    /// NUL-terminated UTF-16LE strings
    Wide(Vec<Vec<u16>>),
}

impl EncodedArgs {
    /// Encode `args` for `encoding`, prepending [`PROGRAM_NAME`]
    pub fn encode<S: AsRef<str>>(encoding: ArgEncoding, args: &[S]) -> Result<Self> {
        let all = std::iter::once(PROGRAM_NAME).chain(args.iter().map(AsRef::as_ref));
        match encoding {
            ArgEncoding::Local | ArgEncoding::Utf8 => all
                .map(|arg| {
                    CString::new(arg).map_err(|_| GsError::InteriorNul {
                        what: format!("argument {arg:?}"),
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(EncodedArgs::Narrow),
            ArgEncoding::Utf16le => all
                .map(|arg| {
                    if arg.contains('\0') {
                        return Err(GsError::InteriorNul {
                            what: format!("argument {arg:?}"),
                        });
                    }
                    Ok(arg.encode_utf16().chain(std::iter::once(0)).collect())
                })
                .collect::<Result<Vec<_>>>()
                .map(EncodedArgs::Wide),
        }
    }

    /// Number of entries, program name included
    pub fn len(&self) -> usize {
        match self {
            EncodedArgs::Narrow(args) => args.len(),
            EncodedArgs::Wide(args) => args.len(),
        }
    }

    /// Always false; the program name is always present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode back to strings, program name included
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            EncodedArgs::Narrow(args) => args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            EncodedArgs::Wide(args) => args
                .iter()
                .map(|arg| {
                    let end = arg.iter().position(|&unit| unit == 0).unwrap_or(arg.len());
                    String::from_utf16_lossy(&arg[..end])
                })
                .collect(),
        }
    }

    /// Pointer table for `argv`; valid while `self` is alive and unmoved
    #[cfg_attr(not(feature = "native"), allow(dead_code))]
    pub(crate) fn argv(&self) -> Vec<*mut c_char> {
        match self {
            EncodedArgs::Narrow(args) => args.iter().map(|arg| arg.as_ptr() as *mut c_char).collect(),
            EncodedArgs::Wide(args) => args.iter().map(|arg| arg.as_ptr() as *mut c_char).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_is_prepended() {
        let args = EncodedArgs::encode(ArgEncoding::Utf8, &["-dSAFER", "-dBATCH"]).unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args.to_strings(), vec![PROGRAM_NAME, "-dSAFER", "-dBATCH"]);
    }

    #[test]
    fn test_empty_list_still_has_program_name() {
        let args = EncodedArgs::encode::<&str>(ArgEncoding::Local, &[]).unwrap();
        assert_eq!(args.to_strings(), vec![PROGRAM_NAME]);
        assert!(!args.is_empty());
    }

    #[test]
    fn test_wide_encoding_is_nul_terminated() {
        let args = EncodedArgs::encode(ArgEncoding::Utf16le, &["-sOutputFile=é.png"]).unwrap();
        match &args {
            EncodedArgs::Wide(wide) => {
                assert_eq!(wide.len(), 2);
                assert_eq!(wide[1].last(), Some(&0));
                assert!(wide[1].contains(&0x00e9));
            }
            EncodedArgs::Narrow(_) => panic!("expected wide arguments"),
        }
        assert_eq!(args.to_strings()[1], "-sOutputFile=é.png");
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        for encoding in [ArgEncoding::Local, ArgEncoding::Utf8, ArgEncoding::Utf16le] {
            let err = EncodedArgs::encode(encoding, &["-sA=\0b"]).unwrap_err();
            assert!(matches!(err, GsError::InteriorNul { .. }));
        }
    }

    #[test]
    fn test_raw_encoding_values() {
        assert_eq!(ArgEncoding::Local.raw(), 0);
        assert_eq!(ArgEncoding::Utf8.raw(), 1);
        assert_eq!(ArgEncoding::Utf16le.raw(), 2);
        assert_eq!(ArgEncoding::default(), ArgEncoding::Local);
    }

    #[test]
    fn test_argv_points_at_each_argument() {
        let args = EncodedArgs::encode(ArgEncoding::Utf8, &["-q"]).unwrap();
        let argv = args.argv();
        assert_eq!(argv.len(), 2);
        assert!(argv.iter().all(|ptr| !ptr.is_null()));
    }
}
