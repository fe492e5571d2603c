//! Release asset selection and artifact verification

use crate::error::{QuickLaunchError, Result};
use crate::update::source::ReleaseAsset;
use sha2::{Digest, Sha256};
use std::io::{self, Write};

const SIDECAR_SUFFIXES: [&str; 4] = [".sha256", ".sig", ".asc", ".txt"];

/// Packaging formats that cannot be turned into an executable here
const UNSUPPORTED_SUFFIXES: [&str; 14] = [
    ".tar", ".gz", ".tgz", ".xz", ".txz", ".bz2", ".zst", ".7z", ".rar", ".dmg", ".pkg", ".msi",
    ".deb", ".rpm",
];

/// How a release asset becomes the executable that gets installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// The asset is the executable itself
    Executable,
    /// A zip archive containing the executable
    Zip,
}

impl ArtifactKind {
    /// Kind of the asset called `name`, or `None` for unsupported packaging
    pub fn of(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if UNSUPPORTED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            None
        } else {
            Some(Self::Executable)
        }
    }
}

fn os_aliases(os: &str) -> &'static [&'static str] {
    match os {
        "windows" => &["windows", "win64", "win32"],
        "macos" => &["macos", "darwin", "osx", "mac"],
        "linux" => &["linux"],
        "freebsd" => &["freebsd"],
        _ => &[],
    }
}

fn arch_aliases(arch: &str) -> &'static [&'static str] {
    match arch {
        "x86_64" => &["x86_64", "amd64", "x64"],
        "aarch64" => &["aarch64", "arm64"],
        "x86" => &["i686", "i386", "x86", "386"],
        "arm" => &["armv7", "armhf", "arm"],
        _ => &[],
    }
}

/// Pick the asset built for `os`/`arch` (values of `std::env::consts`)
///
/// Names are matched case-insensitively against common aliases, so
/// `quicklaunch_Windows_amd64.exe` is found for `windows`/`x86_64`.
/// Checksum and signature sidecars are never selected, nor are archives
/// other than zip. A bare executable wins over a zip for the same platform.
pub fn select_asset<'a>(assets: &'a [ReleaseAsset], os: &str, arch: &str) -> Option<&'a ReleaseAsset> {
    let os_names = os_aliases(os);
    let arch_names = arch_aliases(arch);

    assets
        .iter()
        .filter(|asset| {
            let name = asset.name.to_lowercase();
            if SIDECAR_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                return false;
            }
            // 32-bit aliases are substrings of 64-bit names
            if arch == "x86" && name.contains("64") {
                return false;
            }
            os_names.iter().any(|alias| name.contains(alias))
                && arch_names.iter().any(|alias| name.contains(alias))
        })
        .filter_map(|asset| ArtifactKind::of(&asset.name).map(|kind| (kind, asset)))
        .min_by_key(|(kind, _)| *kind)
        .map(|(_, asset)| asset)
}

/// The checksum asset covering `asset_name`, if the release has one
///
/// A dedicated `<asset>.sha256` wins over a shared `checksums.txt`.
pub fn checksum_asset<'a>(assets: &'a [ReleaseAsset], asset_name: &str) -> Option<&'a ReleaseAsset> {
    let sidecar = format!("{asset_name}.sha256").to_lowercase();
    assets
        .iter()
        .find(|asset| asset.name.to_lowercase() == sidecar)
        .or_else(|| {
            assets
                .iter()
                .find(|asset| asset.name.eq_ignore_ascii_case("checksums.txt"))
        })
}

fn is_sha256_hex(text: &str) -> bool {
    text.len() == 64 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Find the digest for `asset_name` in a checksum file
///
/// Accepts `sha256sum` output (`<hex>  <name>` or `<hex> *<name>`) and a bare
/// digest on its own line. Returns lowercase hex.
pub fn parse_checksum(text: &str, asset_name: &str) -> Option<String> {
    let mut bare = None;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut parts = line.split_whitespace();
        let Some(digest) = parts.next().filter(|d| is_sha256_hex(d)) else {
            continue;
        };
        match parts.next() {
            Some(name) if name.trim_start_matches('*') == asset_name => {
                return Some(digest.to_lowercase());
            }
            Some(_) => {}
            None => bare = bare.or_else(|| Some(digest.to_lowercase())),
        }
    }
    bare
}

/// Writer that hashes everything passing through it
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    /// Wrap `inner`
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Lowercase hex SHA-256 of the bytes written so far
    pub fn hex_digest(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Check a downloaded artifact against its advertised size and digest
pub fn verify_artifact(
    expected_size: u64,
    actual_size: u64,
    expected_digest: Option<&str>,
    actual_digest: &str,
) -> Result<()> {
    if expected_size != actual_size {
        return Err(QuickLaunchError::VerificationFailed(format!(
            "expected {expected_size} bytes, received {actual_size}"
        )));
    }
    if let Some(expected) = expected_digest
        && !expected.eq_ignore_ascii_case(actual_digest)
    {
        return Err(QuickLaunchError::VerificationFailed(format!(
            "SHA-256 mismatch: expected {expected}, got {actual_digest}"
        )));
    }
    Ok(())
}
