//! The authenticated session passed to every workflow.

use crate::errors::{Error, Result};
use crate::identity::SessionToken;
use crate::models::{Role, UserProfile};

/// Authenticated principal with its household role.
///
/// Owned by whoever called `login`/`register_parent` and handed back to
/// `logout`; workflows only borrow it. Deliberately not `Clone`.
#[derive(Debug)]
pub struct Session {
    profile: UserProfile,
    token: SessionToken,
}

impl Session {
    pub(crate) const fn new(profile: UserProfile, token: SessionToken) -> Self {
        Self { profile, token }
    }

    /// Profile document of the signed-in principal
    #[must_use]
    pub const fn profile(&self) -> &UserProfile {
        &self.profile
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.profile.uid
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.profile.role
    }

    /// Token used to restore this principal as the provider's active one
    #[must_use]
    pub const fn token(&self) -> &SessionToken {
        &self.token
    }

    pub(crate) fn set_display_name(&mut self, display_name: String) {
        self.profile.display_name = display_name;
    }

    /// Returns the caller's uid if it is a parent.
    pub fn require_parent(&self) -> Result<&str> {
        match self.profile.role {
            Role::Parent => Ok(&self.profile.uid),
            Role::Child => Err(Error::not_authorized(
                "only parent accounts can perform this action",
            )),
        }
    }

    /// Returns the owning parent's uid if the caller is a linked child.
    pub fn linked_parent(&self) -> Result<&str> {
        match (self.profile.role, self.profile.parent_id.as_deref()) {
            (Role::Child, Some(parent_id)) => Ok(parent_id),
            _ => Err(Error::not_authorized(
                "only child accounts linked to a parent can perform this action",
            )),
        }
    }
}
