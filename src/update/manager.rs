//! Update lifecycle state machine
//!
//! ```text
//! Idle ──check──▶ Checking ──newer──▶ Available ──download──▶ Downloading ──▶ Ready
//!   ▲                │  └──not newer──▶ Idle        │ ▲                 │
//!   │                └──failure──▶ Error ◀──failure─┘ └──── re-check    │
//!   └──────────reset─────────────────┘                          restart ◀┘
//! ```
//!
//! Checks and downloads run on their own threads and hand back a
//! [`TaskHandle`]. At most one of each kind runs at a time. Cancelling a task
//! returns the machine to the state it started from. Any trigger not allowed
//! in the current state is rejected without changing it.

use crate::error::{QuickLaunchError, Result};
use crate::events::{AppEvent, EventBus};
use crate::update::classify::ErrorClass;
use crate::update::install::Installer;
use crate::update::source::{Release, ReleaseSource};
use crate::update::task::{CancelToken, TaskHandle};
use crate::update::archive::extract_executable;
use crate::update::verify::{
    ArtifactKind, HashingWriter, checksum_asset, parse_checksum, select_asset, verify_artifact,
};
use crate::update::{UpdateInfo, UpdateStatus};
use parking_lot::Mutex;
use semver::Version;
use serde::Serialize;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Classified description of the last failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFailure {
    /// Coarse failure class
    pub class: ErrorClass,
    /// Message suitable for the settings view
    pub message: String,
    /// Full error text for logs and bug reports
    pub detail: String,
}

/// Point-in-time view of the update lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSnapshot {
    /// Current state
    pub status: UpdateStatus,
    /// Result of the last completed check
    pub info: Option<UpdateInfo>,
    /// Set while in `Error`
    pub error: Option<UpdateFailure>,
}

struct State {
    status: UpdateStatus,
    release: Option<Release>,
    info: Option<UpdateInfo>,
    failure: Option<UpdateFailure>,
}

#[derive(Clone)]
struct Context {
    current: Version,
    source: Arc<dyn ReleaseSource>,
    installer: Arc<dyn Installer>,
    events: EventBus,
    os: String,
    arch: String,
    state: Arc<Mutex<State>>,
}

/// Drives checks, downloads, installation and restart
pub struct UpdateManager {
    ctx: Context,
}

impl UpdateManager {
    /// Create a manager for the running `current` version on this platform
    pub fn new(
        current: Version,
        source: Arc<dyn ReleaseSource>,
        installer: Arc<dyn Installer>,
        events: EventBus,
    ) -> Self {
        Self {
            ctx: Context {
                current,
                source,
                installer,
                events,
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
                state: Arc::new(Mutex::new(State {
                    status: UpdateStatus::Idle,
                    release: None,
                    info: None,
                    failure: None,
                })),
            },
        }
    }

    /// Select release assets for another platform
    #[must_use]
    pub fn with_platform(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.ctx.os = os.into();
        self.ctx.arch = arch.into();
        self
    }

    /// Running version
    pub fn current_version(&self) -> &Version {
        &self.ctx.current
    }

    /// Current lifecycle state
    pub fn status(&self) -> UpdateStatus {
        self.ctx.state.lock().status
    }

    /// State, last check result and last failure
    pub fn snapshot(&self) -> UpdateSnapshot {
        let state = self.ctx.state.lock();
        UpdateSnapshot {
            status: state.status,
            info: state.info.clone(),
            error: state.failure.clone(),
        }
    }

    /// Start a check for a newer release
    ///
    /// Allowed from `Idle` and `Available`.
    pub fn check(&self) -> Result<TaskHandle<UpdateInfo>> {
        let previous = self.begin(
            "check for updates",
            UpdateStatus::Checking,
            &[UpdateStatus::Idle, UpdateStatus::Available],
            "Update check",
        )?;

        let token = CancelToken::new();
        let worker_token = token.clone();
        let ctx = self.ctx.clone();
        let handle = self.spawn("update-check", previous, move || {
            let outcome = ctx.source.latest_release();
            ctx.finish_check(previous, &worker_token, outcome)
        })?;
        Ok(TaskHandle::new(token, handle))
    }

    /// Start downloading and installing the release found by the last check
    ///
    /// Allowed from `Available` only. Resolves to the installed version.
    pub fn download(&self) -> Result<TaskHandle<String>> {
        let previous = self.begin(
            "download the update",
            UpdateStatus::Downloading,
            &[UpdateStatus::Available],
            "Update download",
        )?;

        let release = {
            let mut state = self.ctx.state.lock();
            match state.release.clone() {
                Some(release) => release,
                None => {
                    state.status = UpdateStatus::Idle;
                    return Err(QuickLaunchError::NoUpdateAvailable);
                }
            }
        };

        let token = CancelToken::new();
        let worker_token = token.clone();
        let ctx = self.ctx.clone();
        let handle = self.spawn("update-download", previous, move || {
            let outcome = ctx.install_release(&release, &worker_token);
            ctx.finish_download(previous, &worker_token, outcome)
        })?;
        Ok(TaskHandle::new(token, handle))
    }

    /// Run a check and wait for it
    pub fn check_for_update(&self) -> Result<UpdateInfo> {
        self.check()?.wait()
    }

    /// Download and install the newest release, checking first if needed
    pub fn download_and_apply(&self) -> Result<String> {
        if self.status() != UpdateStatus::Available {
            let info = self.check_for_update()?;
            if !info.available {
                return Err(QuickLaunchError::NoUpdateAvailable);
            }
        }
        self.download()?.wait()
    }

    /// Leave `Error` for `Idle`
    pub fn reset(&self) -> Result<()> {
        let mut state = self.ctx.state.lock();
        if state.status != UpdateStatus::Error {
            return Err(QuickLaunchError::InvalidState {
                action: "reset",
                status: state.status.as_str(),
            });
        }
        state.status = UpdateStatus::Idle;
        state.failure = None;
        info!("Update status: error -> idle");
        Ok(())
    }

    /// Start the installed build; the caller ends this process afterwards
    pub fn restart_app(&self) -> Result<()> {
        let status = self.status();
        if status != UpdateStatus::Ready {
            return Err(QuickLaunchError::InvalidState {
                action: "restart",
                status: status.as_str(),
            });
        }
        self.ctx.installer.relaunch()
    }

    fn begin(
        &self,
        action: &'static str,
        target: UpdateStatus,
        allowed: &[UpdateStatus],
        busy: &'static str,
    ) -> Result<UpdateStatus> {
        let mut state = self.ctx.state.lock();
        let current = state.status;
        if current == target {
            return Err(QuickLaunchError::OperationInProgress(busy));
        }
        if !allowed.contains(&current) {
            return Err(QuickLaunchError::InvalidState {
                action,
                status: current.as_str(),
            });
        }
        state.status = target;
        info!("Update status: {} -> {}", current, target);
        Ok(current)
    }

    fn spawn<T, F>(
        &self,
        name: &str,
        previous: UpdateStatus,
        work: F,
    ) -> Result<thread::JoinHandle<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(work)
            .map_err(|e| {
                warn!("Failed to start {} thread: {}", name, e);
                self.ctx.state.lock().status = previous;
                QuickLaunchError::IoError(e)
            })
    }
}

impl Context {
    fn info_for(&self, release: Option<&Release>, available: bool) -> UpdateInfo {
        let asset = release.and_then(|r| select_asset(&r.assets, &self.os, &self.arch));
        UpdateInfo {
            available,
            current_version: self.current.to_string(),
            latest_version: release.map_or_else(|| self.current.to_string(), |r| r.version.to_string()),
            release_url: release.map(|r| r.html_url.clone()).unwrap_or_default(),
            release_note: release.map(|r| r.notes.clone()).unwrap_or_default(),
            asset_url: asset.map(|a| a.download_url.clone()).unwrap_or_default(),
            asset_size: asset.map_or(0, |a| a.size),
        }
    }

    fn fail(&self, state: &mut State, error: &QuickLaunchError) {
        let class = ErrorClass::of(error);
        warn!("Update failed ({}): {}", class, error);
        state.status = UpdateStatus::Error;
        state.failure = Some(UpdateFailure {
            class,
            message: class.user_message().to_string(),
            detail: error.to_string(),
        });
    }

    fn finish_check(
        &self,
        previous: UpdateStatus,
        token: &CancelToken,
        outcome: Result<Option<Release>>,
    ) -> Result<UpdateInfo> {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            info!("Update check cancelled");
            state.status = previous;
            return Err(QuickLaunchError::Cancelled);
        }

        match outcome {
            Ok(Some(release)) if release.version > self.current => {
                info!("Update available: {} -> {}", self.current, release.version);
                let info = self.info_for(Some(&release), true);
                state.status = UpdateStatus::Available;
                state.release = Some(release);
                state.info = Some(info.clone());
                Ok(info)
            }
            Ok(release) => {
                info!("Application is up to date");
                let info = self.info_for(release.as_ref(), false);
                state.status = UpdateStatus::Idle;
                state.release = None;
                state.info = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                self.fail(&mut state, &e);
                Err(e)
            }
        }
    }

    fn install_release(&self, release: &Release, token: &CancelToken) -> Result<String> {
        let asset = select_asset(&release.assets, &self.os, &self.arch).ok_or_else(|| {
            QuickLaunchError::VerificationFailed(format!(
                "release {} has no build for {}/{}",
                release.version, self.os, self.arch
            ))
        })?;

        let expected_digest = match checksum_asset(&release.assets, &asset.name) {
            Some(list) => {
                let text = self.source.fetch_text(&list.download_url)?;
                let digest = parse_checksum(&text, &asset.name).ok_or_else(|| {
                    QuickLaunchError::VerificationFailed(format!(
                        "{} does not list {}",
                        list.name, asset.name
                    ))
                })?;
                Some(digest)
            }
            None => None,
        };

        let mut staged = self.installer.create_staging()?;
        let (written, digest) = {
            let mut writer = HashingWriter::new(staged.as_file_mut());
            let written = self
                .source
                .download(&asset.download_url, &mut writer, token)?;
            writer.flush()?;
            (written, writer.hex_digest())
        };
        staged.as_file().sync_all()?;

        verify_artifact(asset.size, written, expected_digest.as_deref(), &digest)?;
        info!("Verified {} ({} bytes)", asset.name, written);

        let program = match ArtifactKind::of(&asset.name) {
            Some(ArtifactKind::Zip) => self.unpack(staged, &asset.name)?,
            _ => staged,
        };

        if token.is_cancelled() {
            return Err(QuickLaunchError::Cancelled);
        }
        self.installer.apply(program)?;
        Ok(release.version.to_string())
    }

    /// Extract the executable from a verified zip into a fresh staging file
    fn unpack(&self, mut archive: NamedTempFile, archive_name: &str) -> Result<NamedTempFile> {
        let exe_name = self.installer.executable_name();
        let mut program = self.installer.create_staging()?;

        archive.as_file_mut().seek(SeekFrom::Start(0))?;
        let size = extract_executable(archive.as_file_mut(), archive_name, &exe_name, program.as_file_mut())?;
        program.as_file().sync_all()?;

        info!("Unpacked {} from {} ({} bytes)", exe_name, archive_name, size);
        Ok(program)
    }

    fn finish_download(
        &self,
        previous: UpdateStatus,
        token: &CancelToken,
        outcome: Result<String>,
    ) -> Result<String> {
        let mut state = self.state.lock();
        match outcome {
            Ok(version) => {
                state.status = UpdateStatus::Ready;
                drop(state);
                info!("Update {} ready, restart to finish", version);
                self.events.emit(&AppEvent::UpdateReady {
                    version: version.clone(),
                });
                Ok(version)
            }
            Err(e) if token.is_cancelled() || matches!(e, QuickLaunchError::Cancelled) => {
                info!("Update download cancelled");
                state.status = previous;
                Err(QuickLaunchError::Cancelled)
            }
            Err(e) => {
                self.fail(&mut state, &e);
                Err(e)
            }
        }
    }
}
