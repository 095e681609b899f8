//! LSP protocol utilities for URI/path conversions

use anyhow::{Context, Result};
use lsp_types::Uri;
use std::path::{Path, PathBuf};

/// Convert an LSP URI to a file path
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    let s = uri.as_str();
    let path_str = s.strip_prefix("file://")?;
    let path_str = percent_decode(path_str);

    #[cfg(windows)]
    {
        // On Windows, skip the leading / before drive letter
        let path_str = path_str.strip_prefix('/').unwrap_or(&path_str);
        let mut path_str = path_str.replace('/', "\\");
        // Clients disagree on the drive letter case
        if path_str.as_bytes().get(1) == Some(&b':') {
            path_str[..1].make_ascii_uppercase();
        }
        Some(PathBuf::from(path_str))
    }
    #[cfg(not(windows))]
    {
        Some(PathBuf::from(path_str))
    }
}

/// Convert a file path to an LSP URI
pub fn path_to_uri(path: &Path) -> Result<Uri> {
    let path_str = path.to_string_lossy();
    #[cfg(windows)]
    let uri_str = format!("file:///{}", percent_encode(&path_str.replace('\\', "/")));
    #[cfg(not(windows))]
    let uri_str = format!("file://{}", percent_encode(&path_str));
    uri_str
        .parse()
        .with_context(|| format!("Cannot build a URI for {}", path.display()))
}

/// Decode `%XX` escapes; malformed escapes are kept as written
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Punctuation allowed verbatim in a URI path
const PATH_SAFE: &[u8] = b"/-_.~:@!$&'+,;=";

/// Escape the characters that are not allowed verbatim in a URI path
fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || PATH_SAFE.contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_to_path_windows() {
        let uri: Uri = "file:///C:/Users/test/file.al".parse().unwrap();
        let path = uri_to_path(&uri);
        #[cfg(windows)]
        assert_eq!(path, Some(PathBuf::from("C:\\Users\\test\\file.al")));
        #[cfg(not(windows))]
        assert_eq!(path, Some(PathBuf::from("/C:/Users/test/file.al")));
    }

    #[test]
    fn test_uri_to_path_decodes_escapes() {
        let uri: Uri = "file:///home/dev/My%20Project/%28Test%29%C3%A9.al".parse().unwrap();
        #[cfg(not(windows))]
        assert_eq!(
            uri_to_path(&uri),
            Some(PathBuf::from("/home/dev/My Project/(Test)é.al"))
        );
    }

    #[test]
    fn test_non_file_uri_has_no_path() {
        let uri: Uri = "untitled:Untitled-1".parse().unwrap();
        assert_eq!(uri_to_path(&uri), None);
    }

    #[test]
    fn test_path_roundtrip() {
        #[cfg(not(windows))]
        {
            let path = PathBuf::from("/home/dev/My Project/Sales #1.al");
            let uri = path_to_uri(&path).unwrap();
            assert_eq!(uri.as_str(), "file:///home/dev/My%20Project/Sales%20%231.al");
            assert_eq!(uri_to_path(&uri), Some(path));
        }
        #[cfg(windows)]
        {
            let path = PathBuf::from("C:\\Users\\test\\file.al");
            let uri = path_to_uri(&path).unwrap();
            assert_eq!(uri.as_str(), "file:///C:/Users/test/file.al");
        }
    }

    #[test]
    fn test_percent_decode_keeps_malformed_escapes() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
