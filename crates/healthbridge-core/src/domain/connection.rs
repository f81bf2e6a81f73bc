//! HealthConnection domain entity
//!
//! One persisted row per user × platform. The row is created on the first
//! successful permission grant, stamped by every completed sync attempt, and
//! never deleted: disconnecting only clears `is_connected`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{
    capability::Capabilities,
    provider::{Platform, ProviderDescriptor, UserId},
};

/// Represents a user's link to the platform health store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConnection {
    /// Owner of this connection
    user_id: UserId,
    /// Platform the connection was made on
    platform: Platform,
    /// Provider identifier (see [`ProviderDescriptor::provider_id`])
    provider: String,
    /// Whether the user currently wants the bridge active
    is_connected: bool,
    /// Capabilities proven so far
    capabilities: Capabilities,
    /// Local calendar day of the last completed sync
    last_synced_date: Option<NaiveDate>,
    /// Instant of the last completed sync
    last_synced_at: Option<DateTime<Utc>>,
}

impl HealthConnection {
    /// Creates a connected record after a successful permission grant
    pub fn new(user_id: UserId, descriptor: &ProviderDescriptor, capabilities: Capabilities) -> Self {
        Self {
            user_id,
            platform: descriptor.platform,
            provider: descriptor.provider_id.clone(),
            is_connected: true,
            capabilities,
            last_synced_date: None,
            last_synced_at: None,
        }
    }

    /// Reconstitutes a record from storage
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        user_id: UserId,
        platform: Platform,
        provider: impl Into<String>,
        is_connected: bool,
        capabilities: Capabilities,
        last_synced_date: Option<NaiveDate>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            platform,
            provider: provider.into(),
            is_connected,
            capabilities,
            last_synced_date,
            last_synced_at,
        }
    }

    // --- Getters ---

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn last_synced_date(&self) -> Option<NaiveDate> {
        self.last_synced_date
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    // --- State changes ---

    /// Marks the connection active again with freshly granted capabilities
    pub fn reconnect(&mut self, descriptor: &ProviderDescriptor, granted: Capabilities) {
        self.is_connected = true;
        self.provider = descriptor.provider_id.clone();
        self.capabilities = self.capabilities.merge(granted);
    }

    /// Marks the connection inactive; the row itself is kept
    pub fn disconnect(&mut self) {
        self.is_connected = false;
    }

    /// Returns true if the last sync happened less than `interval` before `now`
    ///
    /// A `last_synced_at` in the future (clock skew) counts as recent.
    pub fn synced_within(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        match self.last_synced_at {
            Some(at) => now - at < interval,
            None => false,
        }
    }
}
