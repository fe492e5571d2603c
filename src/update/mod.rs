//! Self-update module
//!
//! [`UpdateManager`] runs the update lifecycle as an explicit state machine:
//! check the release source, download and verify the artifact for this
//! platform, unpack it when it ships as a zip, install it next to the
//! running executable and relaunch.

pub mod archive;
pub mod classify;
pub mod install;
pub mod manager;
pub mod source;
pub mod task;
pub mod verify;

pub use classify::ErrorClass;
pub use install::{ExecutableInstaller, Installer};
pub use manager::{UpdateFailure, UpdateManager, UpdateSnapshot};
pub use source::{GitHubReleaseSource, Release, ReleaseAsset, ReleaseSource};
pub use task::{CancelToken, TaskHandle};

use serde::{Deserialize, Serialize};

/// Repository releases are published to
pub const REPO_OWNER: &str = "phelmer";
/// Repository name
pub const REPO_NAME: &str = "quicklaunch";

/// Update lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Nothing in progress, no newer release known
    Idle,
    /// Asking the release source for the latest release
    Checking,
    /// A newer release is known and can be downloaded
    Available,
    /// Downloading and verifying the artifact
    Downloading,
    /// The new build is installed and waits for a restart
    Ready,
    /// The last check or download failed
    Error,
}

impl UpdateStatus {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Available => "available",
            Self::Downloading => "downloading",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an update check as shown to the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    /// Whether `latest_version` is newer than `current_version`
    pub available: bool,
    /// Running version
    pub current_version: String,
    /// Latest published version
    pub latest_version: String,
    /// Release page
    pub release_url: String,
    /// Release notes
    pub release_note: String,
    /// Artifact chosen for this platform (empty when none matches)
    pub asset_url: String,
    /// Advertised artifact size in bytes
    pub asset_size: u64,
}
