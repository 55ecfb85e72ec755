//! PostScript string literal escaping

use std::path::Path;

use crate::error::{Result, ToolError};

/// Escape `text` for use inside a PostScript `( ... )` string literal
///
/// Backslash and both parentheses are prefixed with a backslash; nothing
/// else is touched.
pub fn escape_ps_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `path` as text, refusing paths that would not survive the conversion
pub(crate) fn path_text(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| ToolError::NonUtf8Path(path.to_path_buf()))
}

/// `path` as an escaped PostScript string body
pub(crate) fn escape_path(path: &Path) -> Result<String> {
    path_text(path).map(escape_ps_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_specials_only() {
        assert_eq!(escape_ps_string("plain.pdf"), "plain.pdf");
        assert_eq!(escape_ps_string("a(1).pdf"), "a\\(1\\).pdf");
        assert_eq!(escape_ps_string("C:\\docs\\x.pdf"), "C:\\\\docs\\\\x.pdf");
        assert_eq!(escape_ps_string("é (ü)"), "é \\(ü\\)");
        assert_eq!(escape_ps_string(""), "");
    }

    #[test]
    fn test_escape_path() {
        let escaped = escape_path(Path::new("/tmp/report (final).pdf")).unwrap();
        assert_eq!(escaped, "/tmp/report \\(final\\).pdf");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/scan-\xff.pdf"));
        assert!(matches!(path_text(path), Err(ToolError::NonUtf8Path(_))));
        assert!(matches!(escape_path(path), Err(ToolError::NonUtf8Path(_))));
    }
}
