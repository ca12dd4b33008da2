//! Identity provider interface and the explicit session context.
//!
//! The provider authenticates principals and, like hosted auth services, keeps
//! one "active" principal that it reports through change notifications. The
//! rest of the crate never reads that ambient state: workflows receive a
//! [`Session`] created by [`crate::core::account::login`] and consumed by
//! [`crate::core::account::logout`].

/// In-process provider used for local deployments and tests
pub mod local;
/// Password hashing for the local provider
pub mod password;
/// Authenticated session context
pub mod session;

pub use local::LocalIdentityProvider;
pub use session::Session;

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Identity as the provider knows it, without household role information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalInfo {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Opaque token that lets a signed-in principal be made active again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a successful sign-in
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub principal: PrincipalInfo,
    pub token: SessionToken,
}

/// Operations the workflows need from the identity provider.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    /// Creates a principal and returns its id.
    ///
    /// Providers may make the new principal the active one as a side effect.
    async fn create_principal(&self, email: &str, password: &str) -> Result<String>;

    async fn set_display_name(&self, principal_id: &str, display_name: &str) -> Result<()>;

    async fn update_password(&self, principal_id: &str, new_password: &str) -> Result<()>;

    /// Removes a principal; used to compensate a failed provisioning.
    async fn delete_principal(&self, principal_id: &str) -> Result<()>;

    /// Authenticates and makes the principal active.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn>;

    /// Makes the principal behind `token` active again without credentials.
    async fn resume(&self, token: &SessionToken) -> Result<PrincipalInfo>;

    /// Clears the active principal.
    async fn sign_out(&self) -> Result<()>;

    async fn current_principal(&self) -> Result<Option<PrincipalInfo>>;

    /// Receives the active principal every time it changes.
    fn subscribe(&self) -> watch::Receiver<Option<PrincipalInfo>>;
}
