//! Tagged parameter protocol
//!
//! The interpreter exposes device and system parameters through a single
//! untyped entry point plus a type discriminant. [`ParamValue`] is the Rust
//! side of that union; the batching bit (`gs_spt_more_to_come`) is kept out
//! of the type and passed as a separate flag on set.

use std::ffi::{c_long, CString};
use std::iter::FusedIterator;
use std::mem::size_of;

use gshost_sys::{
    gs_set_param_type, gs_spt_bool, gs_spt_float, gs_spt_i64, gs_spt_int, gs_spt_long,
    gs_spt_name, gs_spt_null, gs_spt_parsed, gs_spt_size_t, gs_spt_string,
};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{GsError, Result};

/// Type tag of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// No value
    Null,
    /// Boolean, carried as a C `int`
    Bool,
    /// C `int`
    Int,
    /// C `float`
    Float,
    /// PostScript name
    Name,
    /// PostScript string
    String,
    /// C `long`
    Long,
    /// 64-bit integer
    I64,
    /// C `size_t`
    SizeT,
    /// Text parsed as PostScript by the interpreter
    Parsed,
}

impl ParamType {
    /// Native `gs_spt_*` discriminant
    pub fn raw(self) -> gs_set_param_type {
        match self {
            ParamType::Null => gs_spt_null,
            ParamType::Bool => gs_spt_bool,
            ParamType::Int => gs_spt_int,
            ParamType::Float => gs_spt_float,
            ParamType::Name => gs_spt_name,
            ParamType::String => gs_spt_string,
            ParamType::Long => gs_spt_long,
            ParamType::I64 => gs_spt_i64,
            ParamType::SizeT => gs_spt_size_t,
            ParamType::Parsed => gs_spt_parsed,
        }
    }

    /// Decode a native discriminant (without the batching bit)
    #[allow(non_upper_case_globals)]
    pub fn from_raw(raw: gs_set_param_type) -> Option<Self> {
        let ty = match raw {
            gs_spt_null => ParamType::Null,
            gs_spt_bool => ParamType::Bool,
            gs_spt_int => ParamType::Int,
            gs_spt_float => ParamType::Float,
            gs_spt_name => ParamType::Name,
            gs_spt_string => ParamType::String,
            gs_spt_long => ParamType::Long,
            gs_spt_i64 => ParamType::I64,
            gs_spt_size_t => ParamType::SizeT,
            gs_spt_parsed => ParamType::Parsed,
            _ => return None,
        };
        Some(ty)
    }

    /// True for the types transferred as NUL-terminated text
    pub fn is_textual(self) -> bool {
        matches!(self, ParamType::Name | ParamType::String | ParamType::Parsed)
    }

    /// Byte width of a scalar value, `None` for text and null
    pub fn scalar_width(self) -> Option<usize> {
        match self {
            ParamType::Bool | ParamType::Int => Some(size_of::<i32>()),
            ParamType::Float => Some(size_of::<f32>()),
            ParamType::Long => Some(size_of::<c_long>()),
            ParamType::I64 => Some(size_of::<i64>()),
            ParamType::SizeT => Some(size_of::<usize>()),
            ParamType::Null | ParamType::Name | ParamType::String | ParamType::Parsed => None,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamType::Null => "null",
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Name => "name",
            ParamType::String => "string",
            ParamType::Long => "long",
            ParamType::I64 => "i64",
            ParamType::SizeT => "size_t",
            ParamType::Parsed => "parsed",
        };
        f.write_str(name)
    }
}

/// A parameter value
///
/// In JSON the common kinds are plain values: booleans, integers, floats
/// and strings map to `Bool`, `Int` (or `I64` when out of `i32` range),
/// `Float` and `String`. The other kinds are single-key objects:
/// `{"name": "pdfwrite"}`, `{"parsed": "<< /A 1 >>"}`, `{"long": 7}` and
/// `{"size_t": 4096}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParamRepr", into = "ParamRepr")]
pub enum ParamValue {
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    I64(i64),
    /// Single-precision float
    Float(f32),
    /// PostScript string
    String(String),
    /// PostScript name
    Name(String),
    /// PostScript source parsed by the interpreter, e.g. `<< /A 1 >>`
    Parsed(String),
    /// C `long`
    Long(i64),
    /// C `size_t`
    SizeT(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ParamRepr {
    Bool(bool),
    Int(i32),
    I64(i64),
    Float(f32),
    String(String),
    Tagged(TaggedParam),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedParam {
    Name(String),
    Parsed(String),
    Long(i64),
    SizeT(u64),
}

impl From<ParamRepr> for ParamValue {
    fn from(repr: ParamRepr) -> Self {
        match repr {
            ParamRepr::Bool(value) => ParamValue::Bool(value),
            ParamRepr::Int(value) => ParamValue::Int(value),
            ParamRepr::I64(value) => ParamValue::I64(value),
            ParamRepr::Float(value) => ParamValue::Float(value),
            ParamRepr::String(text) => ParamValue::String(text),
            ParamRepr::Tagged(TaggedParam::Name(text)) => ParamValue::Name(text),
            ParamRepr::Tagged(TaggedParam::Parsed(text)) => ParamValue::Parsed(text),
            ParamRepr::Tagged(TaggedParam::Long(value)) => ParamValue::Long(value),
            ParamRepr::Tagged(TaggedParam::SizeT(value)) => ParamValue::SizeT(value),
        }
    }
}

impl From<ParamValue> for ParamRepr {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::Bool(value) => ParamRepr::Bool(value),
            ParamValue::Int(value) => ParamRepr::Int(value),
            ParamValue::I64(value) => ParamRepr::I64(value),
            ParamValue::Float(value) => ParamRepr::Float(value),
            ParamValue::String(text) => ParamRepr::String(text),
            ParamValue::Name(text) => ParamRepr::Tagged(TaggedParam::Name(text)),
            ParamValue::Parsed(text) => ParamRepr::Tagged(TaggedParam::Parsed(text)),
            ParamValue::Long(value) => ParamRepr::Tagged(TaggedParam::Long(value)),
            ParamValue::SizeT(value) => ParamRepr::Tagged(TaggedParam::SizeT(value)),
        }
    }
}

impl ParamValue {
    /// Type tag sent with this value
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::I64(_) => ParamType::I64,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Name(_) => ParamType::Name,
            ParamValue::Parsed(_) => ParamType::Parsed,
            ParamValue::Long(_) => ParamType::Long,
            ParamValue::SizeT(_) => ParamType::SizeT,
        }
    }

    /// Text payload of the textual variants
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::String(text) | ParamValue::Name(text) | ParamValue::Parsed(text) => Some(text),
            _ => None,
        }
    }

    /// Reject values the C API cannot carry
    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        if let Some(text) = self.as_text() {
            if text.contains('\0') {
                return Err(GsError::InteriorNul {
                    what: format!("value of parameter '{name}'"),
                });
            }
        }
        if let ParamValue::Long(value) = self {
            if c_long::try_from(*value).is_err() {
                return Err(GsError::MalformedParam {
                    name: name.to_string(),
                    reason: format!("{value} does not fit a C long"),
                });
            }
        }
        if let ParamValue::SizeT(value) = self {
            if usize::try_from(*value).is_err() {
                return Err(GsError::MalformedParam {
                    name: name.to_string(),
                    reason: format!("{value} does not fit a size_t"),
                });
            }
        }
        Ok(())
    }

    /// Native-endian bytes of a scalar value, `None` for text
    pub fn scalar_bytes(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            ParamValue::Bool(value) => i32::from(*value).to_ne_bytes().to_vec(),
            ParamValue::Int(value) => value.to_ne_bytes().to_vec(),
            ParamValue::I64(value) => value.to_ne_bytes().to_vec(),
            ParamValue::Float(value) => value.to_ne_bytes().to_vec(),
            ParamValue::Long(value) => c_long::try_from(*value).ok()?.to_ne_bytes().to_vec(),
            ParamValue::SizeT(value) => usize::try_from(*value).ok()?.to_ne_bytes().to_vec(),
            ParamValue::String(_) | ParamValue::Name(_) | ParamValue::Parsed(_) => return None,
        };
        Some(bytes)
    }

    /// NUL-terminated payload of a textual value
    #[cfg_attr(not(feature = "native"), allow(dead_code))]
    pub(crate) fn c_text(&self) -> Option<CString> {
        self.as_text().and_then(|text| CString::new(text).ok())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::I64(value) | ParamValue::Long(value) => write!(f, "{value}"),
            ParamValue::SizeT(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::String(text) => write!(f, "({text})"),
            ParamValue::Name(text) => write!(f, "/{text}"),
            ParamValue::Parsed(text) => f.write_str(text),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::I64(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

/// Buffer for scalar reads, aligned for any scalar parameter type
#[repr(C, align(8))]
#[derive(Default)]
pub(crate) struct ScalarSlot(pub(crate) [u8; 8]);

/// Decode the bytes written by a scalar read
pub(crate) fn decode_scalar(name: &str, ty: ParamType, bytes: &[u8]) -> Result<ParamValue> {
    fn array<const N: usize>(name: &str, bytes: &[u8]) -> Result<[u8; N]> {
        bytes.get(..N).and_then(|b| b.try_into().ok()).ok_or_else(|| GsError::MalformedParam {
            name: name.to_string(),
            reason: format!("expected {N} bytes, got {}", bytes.len()),
        })
    }

    let value = match ty {
        ParamType::Bool => ParamValue::Bool(i32::from_ne_bytes(array(name, bytes)?) != 0),
        ParamType::Int => ParamValue::Int(i32::from_ne_bytes(array(name, bytes)?)),
        ParamType::Float => ParamValue::Float(f32::from_ne_bytes(array(name, bytes)?)),
        ParamType::Long => {
            let raw = c_long::from_ne_bytes(array(name, bytes)?);
            ParamValue::Long(i64::from(raw))
        }
        ParamType::I64 => ParamValue::I64(i64::from_ne_bytes(array(name, bytes)?)),
        ParamType::SizeT => {
            let raw = usize::from_ne_bytes(array(name, bytes)?);
            ParamValue::SizeT(raw as u64)
        }
        ParamType::Null | ParamType::Name | ParamType::String | ParamType::Parsed => {
            return Err(GsError::MalformedParam {
                name: name.to_string(),
                reason: format!("{ty} is not a scalar type"),
            })
        }
    };
    Ok(value)
}

/// Decode a textual read, dropping the trailing NUL terminator(s)
pub(crate) fn decode_text(ty: ParamType, mut bytes: Vec<u8>) -> ParamValue {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    let text = String::from_utf8_lossy(&bytes).into_owned();
    match ty {
        ParamType::Name => ParamValue::Name(text),
        ParamType::Parsed => ParamValue::Parsed(text),
        _ => ParamValue::String(text),
    }
}

/// A parameter reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    /// Parameter name
    pub name: String,
    /// Its type tag
    #[serde(rename = "type")]
    pub ty: ParamType,
}

/// Opaque enumeration position
///
/// Starts at zero; engines store whatever token they need in it between
/// calls. A fresh cursor always restarts the enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamCursor(pub usize);

/// Lazy, single-pass enumeration of the interpreter's parameters
///
/// Stops after the engine reports no more elements, or after the first
/// error (which is yielded once).
pub struct ParamIter<'a> {
    engine: &'a mut dyn Engine,
    cursor: ParamCursor,
    done: bool,
}

impl<'a> ParamIter<'a> {
    pub(crate) fn new(engine: &'a mut dyn Engine) -> Self {
        Self {
            engine,
            cursor: ParamCursor::default(),
            done: false,
        }
    }
}

impl Iterator for ParamIter<'_> {
    type Item = Result<ParamInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.engine.enumerate_params(&mut self.cursor) {
            Ok(Some((name, ty))) => Some(Ok(ParamInfo { name, ty })),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(code) => {
                self.done = true;
                Some(Err(GsError::native(code, "enumerate_params")))
            }
        }
    }
}

impl FusedIterator for ParamIter<'_> {}
