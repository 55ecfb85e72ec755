//! File-access sandbox categories

use gshost_sys::{gs_path_control_t, gs_permit_file_control, gs_permit_file_reading, gs_permit_file_writing};
use serde::{Deserialize, Serialize};

/// Kind of access a control path grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    /// Open for reading
    Read,
    /// Open for writing
    Write,
    /// Delete, rename and other control operations
    Control,
}

impl PathKind {
    /// Every kind, in native order
    pub const ALL: [PathKind; 3] = [PathKind::Read, PathKind::Write, PathKind::Control];

    /// Native `gs_permit_file_*` value
    pub fn raw(self) -> gs_path_control_t {
        match self {
            PathKind::Read => gs_permit_file_reading,
            PathKind::Write => gs_permit_file_writing,
            PathKind::Control => gs_permit_file_control,
        }
    }
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PathKind::Read => "read",
            PathKind::Write => "write",
            PathKind::Control => "control",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values() {
        assert_eq!(PathKind::ALL.map(PathKind::raw), [0, 1, 2]);
        assert_eq!(PathKind::Control.to_string(), "control");
        let kind: PathKind = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(kind, PathKind::Write);
    }
}
