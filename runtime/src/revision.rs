//! Linked library revision

use serde::{Deserialize, Serialize};

/// Identification of the interpreter library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Product name, e.g. "GPL Ghostscript"
    pub product: String,
    /// Copyright notice
    pub copyright: String,
    /// Revision number; `10020` is 10.02.0
    pub revision: i64,
    /// Release date as `yyyymmdd`
    pub revision_date: i64,
}

impl Revision {
    /// `(major, minor, patch)` decoded from the revision number
    pub fn version(&self) -> (i64, i64, i64) {
        let major = self.revision / 1000;
        let minor = (self.revision % 1000) / 10;
        let patch = self.revision % 10;
        (major, minor, patch)
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.version();
        write!(
            f,
            "{} {}.{:02}.{} ({})",
            self.product, major, minor, patch, self.revision_date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_decoding() {
        let revision = Revision {
            product: "GPL Ghostscript".into(),
            copyright: "Copyright (C) 2023 Artifex Software, Inc.".into(),
            revision: 10020,
            revision_date: 20230913,
        };
        assert_eq!(revision.version(), (10, 2, 0));
        assert_eq!(revision.to_string(), "GPL Ghostscript 10.02.0 (20230913)");

        let older = Revision { revision: 9561, ..revision };
        assert_eq!(older.version(), (9, 56, 1));
    }
}
