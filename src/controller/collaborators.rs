//! Services the controller delegates to
//!
//! Launching targets and picking folders belong to the host shell. The
//! controller only sees these traits so the host can supply its own.

use crate::config::ActionKind;
use crate::error::{QuickLaunchError, Result, StringError};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Runs a tile's action
pub trait Executor: Send + Sync {
    /// Run `kind` against `target`
    fn execute(&self, kind: ActionKind, target: &str) -> Result<()>;

    /// Run `kind` against `target` in the context of `path`
    fn execute_with_path(&self, kind: ActionKind, target: &str, path: &str) -> Result<()>;
}

/// Lets the user choose a directory
pub trait FolderPicker: Send + Sync {
    /// The chosen directory, or `None` when the dialog was dismissed
    fn pick_folder(&self) -> Result<Option<String>>;
}

/// [`Executor`] that starts processes with the platform's opener
///
/// - `app` starts `target`, passing `path` as its argument when given
/// - `folder` opens `path` (or `target`) in the file manager
/// - `url` opens `target` in the default browser
/// - `powershell` runs `target` in a PowerShell session, inside `path` when given
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandExecutor;

impl CommandExecutor {
    fn opener(subject: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/c", "start", "", subject]);
            cmd
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(subject);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(subject);
            cmd
        }
    }

    fn command(kind: ActionKind, target: &str, path: Option<&str>) -> Command {
        match kind {
            ActionKind::App => {
                let mut cmd = Command::new(target);
                if let Some(path) = path {
                    cmd.arg(path);
                }
                cmd
            }
            ActionKind::Folder => Self::opener(path.unwrap_or(target)),
            ActionKind::Url => Self::opener(target),
            ActionKind::Powershell => {
                let shell = if cfg!(windows) { "powershell" } else { "pwsh" };
                let mut cmd = Command::new(shell);
                cmd.args(["-NoExit", "-Command", target]);
                if let Some(path) = path {
                    let dir = std::path::absolute(Path::new(path))
                        .unwrap_or_else(|_| Path::new(path).to_path_buf());
                    cmd.current_dir(dir);
                }
                cmd
            }
        }
    }

    fn spawn(kind: ActionKind, target: &str, path: Option<&str>) -> Result<()> {
        if target.trim().is_empty() && path.is_none() {
            return Err(QuickLaunchError::Collaborator(StringError::new(
                "nothing to launch",
            )));
        }
        let mut cmd = Self::command(kind, target, path);
        debug!("Spawning {:?}", cmd);
        cmd.spawn()
            .map(drop)
            .map_err(|e| QuickLaunchError::Collaborator(Box::new(e)))
    }
}

impl Executor for CommandExecutor {
    fn execute(&self, kind: ActionKind, target: &str) -> Result<()> {
        Self::spawn(kind, target, None)
    }

    fn execute_with_path(&self, kind: ActionKind, target: &str, path: &str) -> Result<()> {
        Self::spawn(kind, target, Some(path))
    }
}
