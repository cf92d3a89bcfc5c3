//! File read/write for authz documents.
//!
//! Reads decode UTF-8 when the bytes are valid UTF-8 and fall back to
//! ISO-8859-1 otherwise (every byte sequence is valid there, so reads never
//! fail on encoding). Writes put the fully generated buffer on disk in one
//! operation; nothing is written if generation failed earlier.

use std::fs;
use std::path::Path as StdPath;

// encoding_rs resolves the iso-8859-1 label to windows-1252, per WHATWG.
use encoding_rs::WINDOWS_1252;
use tracing::{debug, warn};

use crate::error::AuthzError;

/// Read an authz file into a string, detecting the encoding.
pub(crate) fn read_authz_file(path: &StdPath) -> Result<String, AuthzError> {
    let bytes = fs::read(path).map_err(|e| AuthzError::Resource {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;

    match String::from_utf8(bytes) {
        Ok(text) => {
            debug!(event = "Io", phase = "Read", path = %path.display(), encoding = "utf-8");
            Ok(text)
        }
        Err(err) => {
            // Fixed fallback when the content is not valid UTF-8.
            warn!(
                event = "Io",
                phase = "Read",
                path = %path.display(),
                encoding = "iso-8859-1",
                "input is not valid UTF-8, decoding with fallback encoding"
            );
            let (text, _, _) = WINDOWS_1252.decode(err.as_bytes());
            Ok(text.into_owned())
        }
    }
}

/// Write generated authz text to a file as UTF-8.
pub(crate) fn write_authz_file(path: &StdPath, text: &str) -> Result<(), AuthzError> {
    fs::write(path, text).map_err(|e| AuthzError::Resource {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    debug!(event = "Io", phase = "Write", path = %path.display(), bytes = text.len());
    Ok(())
}
