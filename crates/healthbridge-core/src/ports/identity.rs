//! Authenticated identity port (driven/secondary port)

/// Port trait exposing the signed-in user, if any
#[async_trait::async_trait]
pub trait IIdentityProvider: Send + Sync {
    /// Returns the current user's identifier, or `None` when signed out
    async fn current_user_id(&self) -> Option<String>;
}
