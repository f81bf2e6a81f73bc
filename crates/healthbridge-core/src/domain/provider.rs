//! Platform, provider descriptor and user identity types
//!
//! The [`ProviderDescriptor`] is derived once per process from the running
//! platform and is never persisted. [`UserId`] is a validated newtype for the
//! identity handed to us by the host's session layer.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// UserId
// ============================================================================

/// Identifier of an authenticated user as issued by the host
///
/// Opaque to Healthbridge; the only rule is that it must not be blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, rejecting blank values
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidUserId(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Operating system family the bridge is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Apple iOS / iPadOS (HealthKit)
    Ios,
    /// Android (Health Connect)
    Android,
    /// Anything else; only the generic bridge can serve it
    Other,
}

impl Platform {
    /// Detects the platform from the compilation target
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Other
        }
    }

    /// Stable storage/wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Other => "other",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "other" => Ok(Platform::Other),
            other => Err(DomainError::InvalidPlatform(other.to_string())),
        }
    }
}

// ============================================================================
// ProviderDescriptor
// ============================================================================

/// Describes which native health provider serves the running platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    /// Platform this descriptor was derived from
    pub platform: Platform,
    /// Stable provider identifier, persisted on the connection row
    pub provider_id: String,
    /// Label suitable for a settings screen
    pub human_label: String,
}

impl ProviderDescriptor {
    /// Derives the descriptor for a platform
    pub fn for_platform(platform: Platform) -> Self {
        let (provider_id, human_label) = match platform {
            Platform::Ios => ("apple_health", "Apple Health"),
            Platform::Android => ("health_connect", "Health Connect"),
            Platform::Other => ("generic_health_bridge", "Health data"),
        };
        Self {
            platform,
            provider_id: provider_id.to_string(),
            human_label: human_label.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
    }

    #[test]
    fn test_user_id_trims() {
        let id = UserId::new("  user-1 ").unwrap();
        assert_eq!(id.as_str(), "user-1");
        assert_eq!(id.to_string(), "user-1");
    }

    #[test]
    fn test_platform_round_trip() {
        for platform in [Platform::Ios, Platform::Android, Platform::Other] {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert!("windows-phone".parse::<Platform>().is_err());
    }

    #[test]
    fn test_descriptor_per_platform() {
        let ios = ProviderDescriptor::for_platform(Platform::Ios);
        assert_eq!(ios.provider_id, "apple_health");
        assert_eq!(ios.human_label, "Apple Health");

        let android = ProviderDescriptor::for_platform(Platform::Android);
        assert_eq!(android.provider_id, "health_connect");

        let other = ProviderDescriptor::for_platform(Platform::Other);
        assert_eq!(other.platform, Platform::Other);
    }
}
