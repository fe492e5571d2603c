//! Unpacking the executable from a zip release asset

use crate::error::{QuickLaunchError, Result};
use std::io::{self, Read, Seek, Write};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Lowercase file name without a trailing `.exe`
fn program_stem(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

fn unreadable(archive_name: &str, error: &zip::result::ZipError) -> QuickLaunchError {
    QuickLaunchError::VerificationFailed(format!("{archive_name} is not a readable zip archive: {error}"))
}

/// Copy the entry named like `exe_name` out of a zip archive into `out`
///
/// Entries are matched on their file name, case-insensitively and ignoring
/// a `.exe` suffix, at any depth inside the archive. Entries whose path
/// escapes the archive root are skipped. Returns the number of bytes written.
pub fn extract_executable<R, W>(archive: R, archive_name: &str, exe_name: &str, out: &mut W) -> Result<u64>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    let mut zip = ZipArchive::new(archive).map_err(|e| unreadable(archive_name, &e))?;
    let wanted = program_stem(exe_name);

    let mut found = None;
    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(|e| unreadable(archive_name, &e))?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            warn!("Skipping entry {:?} outside the root of {}", entry.name(), archive_name);
            continue;
        };
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| program_stem(name) == wanted);
        if matches {
            found = Some(index);
            break;
        }
    }

    let index = found.ok_or_else(|| {
        QuickLaunchError::VerificationFailed(format!("{archive_name} does not contain {exe_name}"))
    })?;
    let mut entry = zip.by_index(index).map_err(|e| unreadable(archive_name, &e))?;
    let written = io::copy(&mut entry, out)?;
    if written == 0 {
        return Err(QuickLaunchError::VerificationFailed(format!(
            "{} in {archive_name} is empty",
            entry.name()
        )));
    }

    debug!("Extracted {} from {} ({} bytes)", entry.name(), archive_name, written);
    Ok(written)
}
