//! In-process identity provider.
//!
//! Accounts, password hashes and issued tokens live in memory behind a
//! `tokio` lock. By default it behaves like hosted auth services and makes a
//! freshly created principal the active one, which is exactly the side effect
//! the provisioning workflow has to undo.

use crate::errors::{Error, Result};
use crate::identity::{
    IdentityProvider, PrincipalInfo, SessionToken, SignedIn,
    password::{hash_password, verify_password},
};
use std::collections::HashMap;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
struct Account {
    info: PrincipalInfo,
    password_hash: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// token -> principal id
    tokens: HashMap<String, String>,
    active: Option<String>,
}

impl State {
    fn find_by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|a| a.info.email.eq_ignore_ascii_case(email))
    }

    fn active_info(&self) -> Option<PrincipalInfo> {
        self.active
            .as_ref()
            .and_then(|id| self.accounts.get(id))
            .map(|a| a.info.clone())
    }
}

/// Identity provider holding accounts in process memory.
#[derive(Debug)]
pub struct LocalIdentityProvider {
    state: RwLock<State>,
    changes: watch::Sender<Option<PrincipalInfo>>,
    switch_on_create: bool,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    /// Provider that activates newly created principals, like hosted services do.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            state: RwLock::new(State::default()),
            changes,
            switch_on_create: true,
        }
    }

    /// Provider that leaves the active principal untouched on creation.
    #[must_use]
    pub fn without_session_switch() -> Self {
        Self {
            switch_on_create: false,
            ..Self::new()
        }
    }

    fn notify(&self, state: &State) {
        self.changes.send_replace(state.active_info());
    }

    fn issue_token(state: &mut State, principal_id: &str) -> SessionToken {
        let token = Uuid::new_v4().to_string();
        state.tokens.insert(token.clone(), principal_id.to_string());
        SessionToken::new(token)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    async fn create_principal(&self, email: &str, password: &str) -> Result<String> {
        let password_hash = hash_password(password)?;
        let mut state = self.state.write().await;

        if state.find_by_email(email).is_some() {
            return Err(Error::validation("email", "email address is already in use"));
        }

        let id = Uuid::new_v4().to_string();
        state.accounts.insert(
            id.clone(),
            Account {
                info: PrincipalInfo {
                    id: id.clone(),
                    email: email.to_string(),
                    display_name: None,
                },
                password_hash,
            },
        );
        info!("Created principal {id}");

        if self.switch_on_create {
            debug!("Principal {id} is now the active principal");
            state.active = Some(id.clone());
            self.notify(&state);
        }
        Ok(id)
    }

    async fn set_display_name(&self, principal_id: &str, display_name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(principal_id)
            .ok_or_else(|| Error::not_found("principal", principal_id))?;
        account.info.display_name = Some(display_name.to_string());
        if state.active.as_deref() == Some(principal_id) {
            self.notify(&state);
        }
        Ok(())
    }

    async fn update_password(&self, principal_id: &str, new_password: &str) -> Result<()> {
        let password_hash = hash_password(new_password)?;
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(principal_id)
            .ok_or_else(|| Error::not_found("principal", principal_id))?;
        account.password_hash = password_hash;
        Ok(())
    }

    async fn delete_principal(&self, principal_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.accounts.remove(principal_id).is_none() {
            return Err(Error::not_found("principal", principal_id));
        }
        state.tokens.retain(|_, id| id != principal_id);
        if state.active.as_deref() == Some(principal_id) {
            state.active = None;
            self.notify(&state);
        }
        info!("Deleted principal {principal_id}");
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        let mut state = self.state.write().await;
        let (principal, password_hash) = match state.find_by_email(email) {
            Some(account) => (account.info.clone(), account.password_hash.clone()),
            None => return Err(Error::not_authorized("invalid email or password")),
        };
        if !verify_password(password, &password_hash)? {
            return Err(Error::not_authorized("invalid email or password"));
        }

        let token = Self::issue_token(&mut state, &principal.id);
        state.active = Some(principal.id.clone());
        self.notify(&state);
        debug!("Principal {} signed in", principal.id);
        Ok(SignedIn { principal, token })
    }

    async fn resume(&self, token: &SessionToken) -> Result<PrincipalInfo> {
        let mut state = self.state.write().await;
        let principal_id = state
            .tokens
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| Error::not_authorized("session token is no longer valid"))?;
        let info = state
            .accounts
            .get(&principal_id)
            .map(|a| a.info.clone())
            .ok_or_else(|| Error::not_found("principal", principal_id.clone()))?;
        state.active = Some(principal_id);
        self.notify(&state);
        Ok(info)
    }

    async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(id) = state.active.take() {
            state.tokens.retain(|_, principal| *principal != id);
            debug!("Principal {id} signed out");
        }
        self.notify(&state);
        Ok(())
    }

    async fn current_principal(&self) -> Result<Option<PrincipalInfo>> {
        Ok(self.state.read().await.active_info())
    }

    fn subscribe(&self) -> watch::Receiver<Option<PrincipalInfo>> {
        self.changes.subscribe()
    }
}
