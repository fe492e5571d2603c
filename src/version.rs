//! Build identification

use semver::Version;
use serde::{Deserialize, Serialize};

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit the binary was built from, `unknown` when not provided
pub const COMMIT: &str = match option_env!("QUICKLAUNCH_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// Build timestamp, `unknown` when not provided
pub const BUILD_TIME: &str = match option_env!("QUICKLAUNCH_BUILD_TIME") {
    Some(time) => time,
    None => "unknown",
};

/// Version details shown in the about section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Semantic version
    pub version: String,
    /// Source commit
    pub commit: String,
    /// Build timestamp
    pub build_time: String,
}

impl VersionInfo {
    /// Information about this build
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            commit: COMMIT.to_string(),
            build_time: BUILD_TIME.to_string(),
        }
    }
}

/// The running version, parsed
pub fn current_version() -> Version {
    // CARGO_PKG_VERSION is validated as semver by cargo
    Version::parse(VERSION).unwrap_or_else(|_| Version::new(0, 0, 0))
}
