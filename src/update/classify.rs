//! Coarse classification of update failures
//!
//! Structured information (error variant, HTTP status, I/O error kind,
//! reqwest's timeout and connect flags) decides the class first. Matching
//! on message text is only a fallback for errors that carry no structure.

use crate::error::QuickLaunchError;
use std::error::Error as StdError;
use std::io;

/// Failure classes shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// The release API refused the request because of rate limiting
    RateLimited,
    /// Transport failure or timeout
    Network,
    /// Nothing newer to install
    NoUpdateAvailable,
    /// Anything else
    Generic,
}

impl ErrorClass {
    /// Classify `error`
    pub fn of(error: &QuickLaunchError) -> Self {
        match error {
            QuickLaunchError::Network {
                status: Some(429), ..
            } => Self::RateLimited,
            QuickLaunchError::Network { source, .. } => {
                if from_text(&chain_text(source.as_ref())) == Self::RateLimited {
                    Self::RateLimited
                } else {
                    Self::Network
                }
            }
            QuickLaunchError::NoUpdateAvailable => Self::NoUpdateAvailable,
            QuickLaunchError::IoError(e) if is_network_io(e.kind()) => Self::Network,
            QuickLaunchError::Validation(_)
            | QuickLaunchError::NotFound(_)
            | QuickLaunchError::VersionParse(_)
            | QuickLaunchError::JsonError(_)
            | QuickLaunchError::InvalidState { .. }
            | QuickLaunchError::OperationInProgress(_)
            | QuickLaunchError::Cancelled
            | QuickLaunchError::VerificationFailed(_)
            | QuickLaunchError::Logging(_) => Self::Generic,
            other => structured_source(other).unwrap_or_else(|| from_text(&chain_text(other))),
        }
    }

    /// Stable identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate-limited",
            Self::Network => "network",
            Self::NoUpdateAvailable => "no-update-available",
            Self::Generic => "generic",
        }
    }

    /// Short message for the settings view
    pub fn user_message(self) -> &'static str {
        match self {
            Self::RateLimited => {
                "GitHub is limiting update checks right now. Please try again in an hour."
            }
            Self::Network => "Could not reach the update server. Check your internet connection.",
            Self::NoUpdateAvailable => "You are running the latest version.",
            Self::Generic => "The update failed. Please try again later.",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_network_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
    )
}

/// Look for a reqwest or I/O error anywhere in the source chain
fn structured_source(error: &(dyn StdError + 'static)) -> Option<ErrorClass> {
    let mut current = error.source();
    while let Some(source) = current {
        if let Some(http) = source.downcast_ref::<reqwest::Error>() {
            if http.status().is_some_and(|s| s.as_u16() == 429) {
                return Some(ErrorClass::RateLimited);
            }
            if http.is_timeout() || http.is_connect() || http.is_request() {
                return Some(ErrorClass::Network);
            }
        }
        if let Some(io_error) = source.downcast_ref::<io::Error>()
            && is_network_io(io_error.kind())
        {
            return Some(ErrorClass::Network);
        }
        current = source.source();
    }
    None
}

fn chain_text(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        text.push_str(": ");
        text.push_str(&source.to_string());
        current = source.source();
    }
    text.to_lowercase()
}

fn from_text(text: &str) -> ErrorClass {
    const RATE_LIMIT: [&str; 3] = ["rate limit", "ratelimit", "too many requests"];
    const NETWORK: [&str; 6] = [
        "timed out",
        "timeout",
        "connection",
        "dns",
        "no such host",
        "network",
    ];
    const NO_UPDATE: [&str; 2] = ["no update available", "already up to date"];

    if RATE_LIMIT.iter().any(|needle| text.contains(needle)) {
        ErrorClass::RateLimited
    } else if NO_UPDATE.iter().any(|needle| text.contains(needle)) {
        ErrorClass::NoUpdateAvailable
    } else if NETWORK.iter().any(|needle| text.contains(needle)) {
        ErrorClass::Network
    } else {
        ErrorClass::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StringError;

    #[test]
    fn test_status_429_is_rate_limited() {
        let error = QuickLaunchError::network(Some(429), StringError::new("Forbidden"));
        assert_eq!(ErrorClass::of(&error), ErrorClass::RateLimited);
    }

    #[test]
    fn test_other_status_is_network() {
        let error = QuickLaunchError::network(Some(502), StringError::new("Bad gateway"));
        assert_eq!(ErrorClass::of(&error), ErrorClass::Network);
    }

    #[test]
    fn test_rate_limit_message_without_status() {
        let error = QuickLaunchError::network(None, StringError::new("API rate limit exceeded"));
        assert_eq!(ErrorClass::of(&error), ErrorClass::RateLimited);
    }

    #[test]
    fn test_no_update_variant() {
        assert_eq!(
            ErrorClass::of(&QuickLaunchError::NoUpdateAvailable),
            ErrorClass::NoUpdateAvailable
        );
    }

    #[test]
    fn test_io_timeout_is_network() {
        let error = QuickLaunchError::IoError(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(ErrorClass::of(&error), ErrorClass::Network);
    }

    #[test]
    fn test_wrapped_io_error_is_found_in_chain() {
        let error = QuickLaunchError::Collaborator(Box::new(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        )));
        assert_eq!(ErrorClass::of(&error), ErrorClass::Network);
    }

    #[test]
    fn test_text_fallback() {
        let error = QuickLaunchError::Collaborator(StringError::new("DNS lookup failed"));
        assert_eq!(ErrorClass::of(&error), ErrorClass::Network);

        let error = QuickLaunchError::Collaborator(StringError::new("disk quota"));
        assert_eq!(ErrorClass::of(&error), ErrorClass::Generic);
    }

    #[test]
    fn test_verification_is_generic_even_with_network_words() {
        let error = QuickLaunchError::VerificationFailed("connection closed early".to_string());
        assert_eq!(ErrorClass::of(&error), ErrorClass::Generic);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(ErrorClass::RateLimited.as_str(), "rate-limited");
        assert_eq!(ErrorClass::NoUpdateAvailable.to_string(), "no-update-available");
    }
}
