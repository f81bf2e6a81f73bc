//! Identity taken from configuration

use healthbridge_core::ports::IIdentityProvider;

/// Treats the configured `sync.user_id` as the signed-in user
pub struct ConfiguredIdentity {
    user_id: Option<String>,
}

impl ConfiguredIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        let user_id = user_id.filter(|id| !id.trim().is_empty());
        Self { user_id }
    }
}

#[async_trait::async_trait]
impl IIdentityProvider for ConfiguredIdentity {
    async fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_user_is_signed_out() {
        assert_eq!(ConfiguredIdentity::new(Some("  ".into())).current_user_id().await, None);
        assert_eq!(ConfiguredIdentity::new(None).current_user_id().await, None);
        assert_eq!(
            ConfiguredIdentity::new(Some("user-1".into())).current_user_id().await,
            Some("user-1".to_string())
        );
    }
}
