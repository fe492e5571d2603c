//! Start-at-login management
//!
//! Windows uses the per-user `Run` registry key. Linux uses an XDG autostart
//! desktop entry and macOS a per-user LaunchAgent; on those platforms the
//! entry file existing is what "enabled" means.

use crate::error::{QuickLaunchError, Result, StringError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name the entry is registered under
pub const APP_NAME: &str = "QuickLaunch";

/// OS start-at-login entry
pub trait AutoStart: Send + Sync {
    /// Whether the program is currently registered to start at login
    fn is_enabled(&self) -> Result<bool>;

    /// Register or unregister the program
    fn set_enabled(&self, enabled: bool) -> Result<()>;
}

impl<T: AutoStart + ?Sized> AutoStart for std::sync::Arc<T> {
    fn is_enabled(&self) -> Result<bool> {
        (**self).is_enabled()
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        (**self).set_enabled(enabled)
    }
}

/// Format of a file-based start-at-login entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// freedesktop.org `.desktop` file
    DesktopEntry,
    /// launchd property list
    LaunchAgent,
}

impl EntryFormat {
    fn render(self, exe: &Path) -> String {
        let exe = exe.display().to_string();
        match self {
            Self::DesktopEntry => format!(
                "[Desktop Entry]\n\
                 Type=Application\n\
                 Name={APP_NAME}\n\
                 Comment=Quick application launcher\n\
                 Exec=\"{}\"\n\
                 Icon=quicklaunch\n\
                 Terminal=false\n\
                 Categories=Utility;\n\
                 X-GNOME-Autostart-enabled=true\n",
                exe.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            Self::LaunchAgent => format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
                 \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
                 <plist version=\"1.0\">\n\
                 <dict>\n\
                 \x20   <key>Label</key>\n\
                 \x20   <string>com.quicklaunch.app</string>\n\
                 \x20   <key>ProgramArguments</key>\n\
                 \x20   <array>\n\
                 \x20       <string>{}</string>\n\
                 \x20   </array>\n\
                 \x20   <key>RunAtLoad</key>\n\
                 \x20   <true/>\n\
                 \x20   <key>KeepAlive</key>\n\
                 \x20   <false/>\n\
                 </dict>\n\
                 </plist>\n",
                xml_escape(&exe)
            ),
        }
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn autostart_error(e: io::Error) -> QuickLaunchError {
    QuickLaunchError::AutoStart(Box::new(e))
}

/// File-based [`AutoStart`] for Linux and macOS
pub struct FileAutoStart {
    entry_path: PathBuf,
    exe: PathBuf,
    format: EntryFormat,
}

impl FileAutoStart {
    /// Manage the entry at `entry_path` launching `exe`
    pub fn new(entry_path: impl Into<PathBuf>, exe: impl Into<PathBuf>, format: EntryFormat) -> Self {
        Self {
            entry_path: entry_path.into(),
            exe: exe.into(),
            format,
        }
    }

    /// Location of the entry file
    pub fn entry_path(&self) -> &Path {
        &self.entry_path
    }
}

impl AutoStart for FileAutoStart {
    fn is_enabled(&self) -> Result<bool> {
        Ok(self.entry_path.is_file())
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        if !enabled {
            return match fs::remove_file(&self.entry_path) {
                Ok(()) => {
                    info!("Auto-start entry removed: {:?}", self.entry_path);
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(autostart_error(e)),
            };
        }

        if let Some(dir) = self.entry_path.parent() {
            fs::create_dir_all(dir).map_err(autostart_error)?;
        }
        fs::write(&self.entry_path, self.format.render(&self.exe)).map_err(autostart_error)?;
        info!("Auto-start entry written: {:?}", self.entry_path);
        Ok(())
    }
}

/// Registry-based [`AutoStart`] for Windows
#[cfg(windows)]
pub struct RegistryAutoStart {
    exe: PathBuf,
}

#[cfg(windows)]
impl RegistryAutoStart {
    const RUN_KEY: &'static str = r"Software\Microsoft\Windows\CurrentVersion\Run";

    /// Register `exe` under the current user's `Run` key
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }
}

#[cfg(windows)]
impl AutoStart for RegistryAutoStart {
    fn is_enabled(&self) -> Result<bool> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, KEY_QUERY_VALUE};

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = match hkcu.open_subkey_with_flags(Self::RUN_KEY, KEY_QUERY_VALUE) {
            Ok(key) => key,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(autostart_error(e)),
        };
        match key.get_value::<String, _>(APP_NAME) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(autostart_error(e)),
        }
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        use winreg::RegKey;
        use winreg::enums::HKEY_CURRENT_USER;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let (key, _) = hkcu.create_subkey(Self::RUN_KEY).map_err(autostart_error)?;

        if enabled {
            let value = format!("\"{}\"", self.exe.display());
            key.set_value(APP_NAME, &value).map_err(autostart_error)?;
            info!("Auto-start registry value set");
        } else {
            match key.delete_value(APP_NAME) {
                Ok(()) => info!("Auto-start registry value removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(autostart_error(e)),
            }
        }
        Ok(())
    }
}

/// Picks the start-at-login mechanism for the running platform
pub struct AutoStartManager;

impl AutoStartManager {
    /// [`AutoStart`] for the current executable on this platform
    pub fn for_current_platform() -> Result<Box<dyn AutoStart>> {
        let exe = std::env::current_exe()?;
        debug!("Auto-start target executable: {:?}", exe);
        Self::for_platform(std::env::consts::OS, exe)
    }

    fn for_platform(os: &str, exe: PathBuf) -> Result<Box<dyn AutoStart>> {
        match os {
            #[cfg(windows)]
            "windows" => Ok(Box::new(RegistryAutoStart::new(exe))),
            "macos" => {
                let home = dirs::home_dir().ok_or_else(|| {
                    QuickLaunchError::AutoStart(StringError::new("home directory not found"))
                })?;
                let entry = home
                    .join("Library")
                    .join("LaunchAgents")
                    .join("com.quicklaunch.app.plist");
                Ok(Box::new(FileAutoStart::new(entry, exe, EntryFormat::LaunchAgent)))
            }
            "linux" | "freebsd" | "openbsd" | "netbsd" => {
                let config = dirs::config_dir().ok_or_else(|| {
                    QuickLaunchError::AutoStart(StringError::new("config directory not found"))
                })?;
                let entry = config.join("autostart").join("quicklaunch.desktop");
                Ok(Box::new(FileAutoStart::new(entry, exe, EntryFormat::DesktopEntry)))
            }
            other => Err(QuickLaunchError::AutoStart(StringError::new(format!(
                "auto-start is not supported on {other}"
            )))),
        }
    }
}
