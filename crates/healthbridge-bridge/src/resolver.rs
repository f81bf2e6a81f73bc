//! One-time binding resolution
//!
//! The resolver asks the host's [`INativeModuleLoader`] for the native
//! library of each tier the first time that tier is needed, and remembers the
//! answer for the rest of the process. A failed load is remembered too: the
//! loader is never asked twice for the same tier.

use std::sync::{Arc, OnceLock};

use healthbridge_core::domain::{Platform, ProviderDescriptor};
use healthbridge_core::ports::INativeModuleLoader;
use tracing::{debug, info, warn};

use crate::binding::{BindingTier, HealthBinding};
use crate::bindings::{GenericBinding, HealthConnectBinding, HealthKitBinding};

type Slot = OnceLock<Option<Arc<dyn HealthBinding>>>;

/// Chooses and caches the binding for each tier
pub struct BindingResolver {
    platform: Platform,
    descriptor: ProviderDescriptor,
    loader: Arc<dyn INativeModuleLoader>,
    direct: Slot,
    generic: Slot,
}

impl BindingResolver {
    pub fn new(platform: Platform, loader: Arc<dyn INativeModuleLoader>) -> Self {
        Self {
            platform,
            descriptor: ProviderDescriptor::for_platform(platform),
            loader,
            direct: OnceLock::new(),
            generic: OnceLock::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Provider descriptor of the running platform
    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Binding for `tier`, loading it on first use
    pub fn resolve(&self, tier: BindingTier) -> Option<Arc<dyn HealthBinding>> {
        let slot = match tier {
            BindingTier::Direct => &self.direct,
            BindingTier::Generic => &self.generic,
        };
        slot.get_or_init(|| self.load(tier)).clone()
    }

    /// The preferred binding: direct when loadable, generic otherwise
    pub fn active(&self) -> Option<Arc<dyn HealthBinding>> {
        self.resolve(BindingTier::Direct)
            .or_else(|| self.resolve(BindingTier::Generic))
    }

    /// Returns true if any tier has a native library behind it
    pub fn is_bridge_installed(&self) -> bool {
        self.active().is_some()
    }

    fn load(&self, tier: BindingTier) -> Option<Arc<dyn HealthBinding>> {
        let loaded: Result<Arc<dyn HealthBinding>, _> = match (tier, self.platform) {
            (BindingTier::Direct, Platform::Ios) => self
                .loader
                .load_healthkit()
                .map(|module| Arc::new(HealthKitBinding::new(module)) as Arc<dyn HealthBinding>),
            (BindingTier::Direct, Platform::Android) => self
                .loader
                .load_health_connect()
                .map(|module| Arc::new(HealthConnectBinding::new(module)) as Arc<dyn HealthBinding>),
            (BindingTier::Direct, Platform::Other) => {
                debug!(platform = %self.platform.as_str(), "No direct health library for platform");
                return None;
            }
            (BindingTier::Generic, _) => self
                .loader
                .load_generic()
                .map(|module| Arc::new(GenericBinding::new(module)) as Arc<dyn HealthBinding>),
        };

        match loaded {
            Ok(binding) => {
                info!(
                    tier = ?tier,
                    binding = binding.name(),
                    platform = %self.platform.as_str(),
                    "Resolved health binding"
                );
                Some(binding)
            }
            Err(missing) => {
                warn!(tier = ?tier, error = %missing, "Health binding unavailable");
                None
            }
        }
    }
}

impl std::fmt::Debug for BindingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingResolver")
            .field("platform", &self.platform)
            .field("provider_id", &self.descriptor.provider_id)
            .finish_non_exhaustive()
    }
}
