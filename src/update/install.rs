//! Staging and installing a downloaded executable
//!
//! The artifact is written to a temporary file in the executable's own
//! directory so the final move is a same-filesystem rename. Installing moves
//! the running executable aside to `<exe>.old` and persists the staged file
//! in its place; if that fails the original is moved back.

use crate::error::{QuickLaunchError, Result};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Replaces the installed program with a downloaded build
pub trait Installer: Send + Sync {
    /// Writable file the artifact is downloaded into
    fn create_staging(&self) -> Result<NamedTempFile>;

    /// Install a fully written and verified staging file
    fn apply(&self, staged: NamedTempFile) -> Result<()>;

    /// Start the installed program as a new process
    fn relaunch(&self) -> Result<()>;

    /// File name of the installed program, used to find it inside archives
    fn executable_name(&self) -> String {
        format!("quicklaunch{}", std::env::consts::EXE_SUFFIX)
    }
}

/// [`Installer`] that swaps the file of the running executable
pub struct ExecutableInstaller {
    exe: PathBuf,
}

impl ExecutableInstaller {
    /// Installer for the executable at `exe`
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// Installer for the currently running executable
    pub fn current() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Executable path being managed
    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Path the previous executable is moved to during install
    pub fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.exe.as_os_str());
        name.push(".old");
        PathBuf::from(name)
    }

    /// Remove the backup left by a previous successful install
    pub fn cleanup_backup(&self) {
        let backup = self.backup_path();
        match fs::remove_file(&backup) {
            Ok(()) => info!("Removed previous executable {:?}", backup),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {:?}: {}", backup, e),
        }
    }

    fn staging_dir(&self) -> &Path {
        self.exe
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl Installer for ExecutableInstaller {
    fn create_staging(&self) -> Result<NamedTempFile> {
        let staged = tempfile::Builder::new()
            .prefix(".quicklaunch-update-")
            .tempfile_in(self.staging_dir())?;
        debug!("Staging update at {:?}", staged.path());
        Ok(staged)
    }

    fn apply(&self, staged: NamedTempFile) -> Result<()> {
        // Carry over the executable bit and other permissions
        if let Ok(metadata) = fs::metadata(&self.exe) {
            fs::set_permissions(staged.path(), metadata.permissions())?;
        }

        let backup = self.backup_path();
        match fs::remove_file(&backup) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(QuickLaunchError::Install(Box::new(e))),
        }

        fs::rename(&self.exe, &backup).map_err(|e| QuickLaunchError::Install(Box::new(e)))?;

        if let Err(e) = staged.persist(&self.exe) {
            warn!("Failed to install update, restoring previous executable: {}", e.error);
            if let Err(restore) = fs::rename(&backup, &self.exe) {
                warn!("Failed to restore previous executable: {}", restore);
            }
            return Err(QuickLaunchError::Install(Box::new(e.error)));
        }

        info!("Update installed to {:?}", self.exe);
        Ok(())
    }

    fn relaunch(&self) -> Result<()> {
        info!("Relaunching {:?}", self.exe);
        Command::new(&self.exe).spawn()?;
        Ok(())
    }

    fn executable_name(&self) -> String {
        self.exe
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("quicklaunch{}", std::env::consts::EXE_SUFFIX))
    }
}
