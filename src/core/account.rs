//! Account business logic - registration, sessions, profiles and child provisioning.
//!
//! Child provisioning touches two systems that share no transaction: the
//! identity provider (principal) and the document store (profile and
//! membership). It therefore runs as a saga. Once the principal exists, any
//! failing step triggers a compensating delete of the principal and its
//! profile document. Only when that compensation itself fails does the caller
//! see [`Error::AccountPartiallyCreated`].

use crate::{
    config::AccountSettings,
    core::with_read_retry,
    errors::{Error, Result},
    identity::{IdentityProvider, Session},
    models::{ChildMembership, Role, UserProfile},
    store::DocumentStore,
};
use chrono::Utc;
use tracing::{error, info, warn};

/// Checks the registration / child-creation form fields.
pub fn validate_account_input(
    settings: &AccountSettings,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<()> {
    validate_display_name(settings, display_name)?;
    validate_email(email)?;
    validate_password(settings, password)
}

fn validate_display_name(settings: &AccountSettings, display_name: &str) -> Result<()> {
    if display_name.trim().chars().count() < settings.min_display_name_length {
        return Err(Error::validation(
            "display_name",
            format!(
                "name must be at least {} characters",
                settings.min_display_name_length
            ),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if !valid || email.contains(char::is_whitespace) {
        return Err(Error::validation(
            "email",
            "please enter a valid email address",
        ));
    }
    Ok(())
}

fn validate_password(settings: &AccountSettings, password: &str) -> Result<()> {
    if password.chars().count() < settings.min_password_length {
        return Err(Error::validation(
            "password",
            format!(
                "password must be at least {} characters",
                settings.min_password_length
            ),
        ));
    }
    Ok(())
}

/// Registers a new parent account and signs it in.
///
/// If writing the profile fails the freshly created principal is deleted
/// again, so a failed registration can be retried with the same email.
pub async fn register_parent<S, I>(
    store: &S,
    identity: &I,
    settings: &AccountSettings,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<Session>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    validate_account_input(settings, email, password, display_name)?;
    let email = email.trim();
    let display_name = display_name.trim();

    let uid = identity.create_principal(email, password).await?;
    let profile = UserProfile {
        uid: uid.clone(),
        email: email.to_string(),
        display_name: display_name.to_string(),
        role: Role::Parent,
        parent_id: None,
        created_at: Utc::now(),
    };

    if let Err(err) = write_profile(store, identity, &profile).await {
        return Err(compensate(store, identity, &uid, err).await);
    }

    let signed_in = identity.sign_in(email, password).await?;
    info!("Registered parent account {uid}");
    Ok(Session::new(profile, signed_in.token))
}

/// Signs in and attaches the household role from the profile document.
///
/// A principal without a profile document (for example an orphan left by an
/// interrupted provisioning) is signed out again and reported as not found.
pub async fn login<S, I>(store: &S, identity: &I, email: &str, password: &str) -> Result<Session>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    let signed_in = identity.sign_in(email.trim(), password).await?;
    let uid = signed_in.principal.id.as_str();

    let profile = match with_read_retry("profile lookup", || store.get_user(uid)).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            warn!("Principal {uid} has no profile document");
            identity.sign_out().await?;
            return Err(Error::not_found("user", uid));
        }
        Err(err) => {
            identity.sign_out().await?;
            return Err(err);
        }
    };

    info!("Principal {uid} logged in as {}", profile.role.as_str());
    Ok(Session::new(profile, signed_in.token))
}

/// Ends the session. Consumes it so it cannot be used afterwards.
pub async fn logout<I: IdentityProvider>(identity: &I, session: Session) -> Result<()> {
    identity.sign_out().await?;
    info!("Principal {} logged out", session.uid());
    Ok(())
}

/// Renames the caller in the identity provider, the profile document and,
/// for children, the parent's membership record.
pub async fn update_display_name<S, I>(
    store: &S,
    identity: &I,
    settings: &AccountSettings,
    session: &mut Session,
    display_name: &str,
) -> Result<()>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    validate_display_name(settings, display_name)?;
    let display_name = display_name.trim();
    let uid = session.uid().to_string();

    identity.set_display_name(&uid, display_name).await?;
    store.update_display_name(&uid, display_name).await?;

    if let Some(parent_id) = session.profile().parent_id.as_deref() {
        if let Some(mut membership) = store.get_membership(parent_id, &uid).await? {
            membership.display_name = display_name.to_string();
            store.put_membership(parent_id, &membership).await?;
        }
    }

    session.set_display_name(display_name.to_string());
    Ok(())
}

/// Changes the caller's password.
pub async fn update_password<I: IdentityProvider>(
    identity: &I,
    settings: &AccountSettings,
    session: &Session,
    new_password: &str,
) -> Result<()> {
    validate_password(settings, new_password)?;
    identity.update_password(session.uid(), new_password).await
}

/// Creates a child account owned by the calling parent.
///
/// Returns the new child's uid. On return the identity provider's active
/// principal is the parent again, even if the provider switched to the new
/// child while creating it.
pub async fn create_child_account<S, I>(
    store: &S,
    identity: &I,
    settings: &AccountSettings,
    session: &Session,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<String>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    let parent_id = session.require_parent()?;
    validate_account_input(settings, email, password, display_name)?;
    let email = email.trim();
    let display_name = display_name.trim();

    info!("Parent {parent_id} is creating child account {email}");
    let child_id = identity.create_principal(email, password).await?;

    // Creating a principal may have made it the active one
    let provisioned = match identity.resume(session.token()).await {
        Ok(_) => {
            write_child_records(store, identity, parent_id, &child_id, email, display_name).await
        }
        Err(err) => Err(err),
    };

    match provisioned {
        Ok(()) => {
            info!("Created child account {child_id} for parent {parent_id}");
            Ok(child_id)
        }
        Err(err) => Err(compensate(store, identity, &child_id, err).await),
    }
}

async fn write_child_records<S, I>(
    store: &S,
    identity: &I,
    parent_id: &str,
    child_id: &str,
    email: &str,
    display_name: &str,
) -> Result<()>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    let now = Utc::now();
    let profile = UserProfile {
        uid: child_id.to_string(),
        email: email.to_string(),
        display_name: display_name.to_string(),
        role: Role::Child,
        parent_id: Some(parent_id.to_string()),
        created_at: now,
    };
    write_profile(store, identity, &profile).await?;

    store
        .put_membership(
            parent_id,
            &ChildMembership {
                uid: child_id.to_string(),
                email: email.to_string(),
                display_name: display_name.to_string(),
                created_at: now,
            },
        )
        .await
}

async fn write_profile<S, I>(store: &S, identity: &I, profile: &UserProfile) -> Result<()>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    identity
        .set_display_name(&profile.uid, &profile.display_name)
        .await?;
    store.put_user(profile).await
}

/// Undoes a half-finished account creation and returns the error to report.
async fn compensate<S, I>(store: &S, identity: &I, uid: &str, cause: Error) -> Error
where
    S: DocumentStore,
    I: IdentityProvider,
{
    warn!("Account creation for {uid} failed ({cause}), rolling back");

    let profile_cleanup = store.delete_user(uid).await;
    let principal_cleanup = identity.delete_principal(uid).await;

    match (profile_cleanup, principal_cleanup) {
        (Ok(()), Ok(())) => {
            info!("Rolled back account {uid}");
            cause
        }
        (profile, principal) => {
            let failures: Vec<String> = [profile.err(), principal.err()]
                .into_iter()
                .flatten()
                .map(|e| e.to_string())
                .collect();
            error!(
                "Rollback of account {uid} failed: {}",
                failures.join("; ")
            );
            Error::AccountPartiallyCreated {
                child_id: uid.to_string(),
                message: format!("{cause}; cleanup failed: {}", failures.join("; ")),
            }
        }
    }
}

/// Lists the calling parent's children from the membership records.
pub async fn list_children<S: DocumentStore>(
    store: &S,
    session: &Session,
) -> Result<Vec<ChildMembership>> {
    let parent_id = session.require_parent()?;
    with_read_retry("membership listing", || store.list_memberships(parent_id)).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::identity::LocalIdentityProvider;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_validate_account_input() {
        let settings = AccountSettings::default();
        assert!(validate_account_input(&settings, "kid@example.com", "secret1", "Asha").is_ok());

        let cases = [
            ("kid@example.com", "secret1", "A", "display_name"),
            ("kid.example.com", "secret1", "Asha", "email"),
            ("kid@example", "secret1", "Asha", "email"),
            ("@example.com", "secret1", "Asha", "email"),
            ("kid@exa mple.com", "secret1", "Asha", "email"),
            ("kid@example.com", "12345", "Asha", "password"),
        ];
        for (email, password, name, expected) in cases {
            let result = validate_account_input(&settings, email, password, name);
            assert!(
                matches!(result, Err(Error::Validation { field, .. }) if field == expected),
                "{email} / {password} / {name} should fail on {expected}"
            );
        }
    }

    #[tokio::test]
    async fn test_register_and_login_parent() -> Result<()> {
        let (store, identity) = setup_household().await?;
        let settings = AccountSettings::default();

        let session = register_parent(
            &store,
            &identity,
            &settings,
            " mum@example.com ",
            "secret1",
            "Mum",
        )
        .await?;
        assert_eq!(session.role(), Role::Parent);
        assert_eq!(session.profile().email, "mum@example.com");
        let active = identity.current_principal().await?.unwrap();
        assert_eq!(active.id, session.uid());
        assert_eq!(active.display_name.as_deref(), Some("Mum"));

        logout(&identity, session).await?;
        assert!(identity.current_principal().await?.is_none());

        let session = login(&store, &identity, "mum@example.com", "secret1").await?;
        assert_eq!(session.role(), Role::Parent);
        assert_eq!(session.profile().display_name, "Mum");
        Ok(())
    }

    #[tokio::test]
    async fn test_register_rolls_back_principal_when_profile_write_fails() -> Result<()> {
        let identity = LocalIdentityProvider::new();
        let store = FlakyStore::new(setup_test_store().await?).fail_user_writes();

        let result = register_parent(
            &store,
            &identity,
            &AccountSettings::default(),
            "mum@example.com",
            "secret1",
            "Mum",
        )
        .await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable { .. })));
        // The email is free again
        assert!(identity.sign_in("mum@example.com", "secret1").await.is_err());
        identity
            .create_principal("mum@example.com", "secret1")
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_login_without_profile_is_not_found() -> Result<()> {
        let (store, identity) = setup_household().await?;
        identity
            .create_principal("orphan@example.com", "secret1")
            .await?;

        let result = login(&store, &identity, "orphan@example.com", "secret1").await;
        assert!(matches!(result, Err(Error::NotFound { entity: "user", .. })));
        assert!(identity.current_principal().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_child_account_links_both_sides() -> Result<()> {
        let (store, identity) = setup_household().await?;
        let settings = AccountSettings::default();
        let parent = register_test_parent(&store, &identity).await?;

        let child_id = create_child_account(
            &store,
            &identity,
            &settings,
            &parent,
            "asha@example.com",
            "secret2",
            "Asha",
        )
        .await?;

        // Session restored to the parent
        let active = identity.current_principal().await?.unwrap();
        assert_eq!(active.id, parent.uid());

        let profile = store.get_user(&child_id).await?.unwrap();
        assert_eq!(profile.role, Role::Child);
        assert_eq!(profile.parent_id.as_deref(), Some(parent.uid()));
        assert_eq!(profile.display_name, "Asha");

        let children = list_children(&store, &parent).await?;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].uid, child_id);
        assert_eq!(children[0].email, "asha@example.com");

        // The child can log in with its own credentials
        let child = login(&store, &identity, "asha@example.com", "secret2").await?;
        assert_eq!(child.linked_parent()?, parent.uid());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_child_account_requires_parent() -> Result<()> {
        let (store, identity) = setup_household().await?;
        let settings = AccountSettings::default();
        let parent = register_test_parent(&store, &identity).await?;
        create_child_account(
            &store,
            &identity,
            &settings,
            &parent,
            "asha@example.com",
            "secret2",
            "Asha",
        )
        .await?;
        let child = login(&store, &identity, "asha@example.com", "secret2").await?;

        let result = create_child_account(
            &store,
            &identity,
            &settings,
            &child,
            "sibling@example.com",
            "secret3",
            "Ravi",
        )
        .await;
        assert!(matches!(result, Err(Error::NotAuthorized { .. })));
        // No principal was created
        assert!(
            identity
                .create_principal("sibling@example.com", "secret3")
                .await
                .is_ok()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_create_child_account_validation_creates_nothing() -> Result<()> {
        // Validation fails before any store or provider call
        let store = crate::store::SeaOrmStore::new(
            MockDatabase::new(DatabaseBackend::Sqlite).into_connection(),
        );
        let identity = LocalIdentityProvider::new();
        let parent = test_session(parent_profile("p1", "p@example.com"));

        let result = create_child_account(
            &store,
            &identity,
            &AccountSettings::default(),
            &parent,
            "not-an-email",
            "secret2",
            "Asha",
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { field: "email", .. })));
        assert!(identity.current_principal().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_membership_write_is_compensated() -> Result<()> {
        let identity = LocalIdentityProvider::new();
        let store = FlakyStore::new(setup_test_store().await?).fail_membership_writes();
        let settings = AccountSettings::default();
        let parent = register_test_parent(&store, &identity).await?;

        let result = create_child_account(
            &store,
            &identity,
            &settings,
            &parent,
            "asha@example.com",
            "secret2",
            "Asha",
        )
        .await;
        assert!(matches!(result, Err(Error::UpstreamUnavailable { .. })));

        // Principal and profile were removed, parent is still active
        assert!(identity.sign_in("asha@example.com", "secret2").await.is_err());
        identity.resume(parent.token()).await?;
        assert_eq!(
            identity.current_principal().await?.unwrap().id,
            parent.uid()
        );
        assert!(store.inner().list_memberships(parent.uid()).await?.is_empty());
        assert_eq!(store.user_count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_compensation_reports_partial_account() -> Result<()> {
        let identity = FailingDeleteIdentity::new(LocalIdentityProvider::new());
        let store = FlakyStore::new(setup_test_store().await?).fail_membership_writes();
        let settings = AccountSettings::default();
        let parent = register_test_parent(&store, &identity).await?;

        let result = create_child_account(
            &store,
            &identity,
            &settings,
            &parent,
            "asha@example.com",
            "secret2",
            "Asha",
        )
        .await;
        let Err(Error::AccountPartiallyCreated { child_id, message }) = result else {
            panic!("expected AccountPartiallyCreated, got {result:?}");
        };
        assert!(!child_id.is_empty());
        assert!(message.contains("cleanup failed"));
        assert_eq!(
            identity.current_principal().await?.unwrap().id,
            parent.uid()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_update_display_name_updates_membership_mirror() -> Result<()> {
        let (store, identity) = setup_household().await?;
        let settings = AccountSettings::default();
        let parent = register_test_parent(&store, &identity).await?;
        create_child_account(
            &store,
            &identity,
            &settings,
            &parent,
            "asha@example.com",
            "secret2",
            "Asha",
        )
        .await?;
        let mut child = login(&store, &identity, "asha@example.com", "secret2").await?;

        update_display_name(&store, &identity, &settings, &mut child, "Asha K").await?;
        assert_eq!(child.profile().display_name, "Asha K");
        assert_eq!(
            store.get_user(child.uid()).await?.unwrap().display_name,
            "Asha K"
        );
        let children = store.list_memberships(parent.uid()).await?;
        assert_eq!(children[0].display_name, "Asha K");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_password() -> Result<()> {
        let (store, identity) = setup_household().await?;
        let settings = AccountSettings::default();
        let parent = register_test_parent(&store, &identity).await?;

        let short = update_password(&identity, &settings, &parent, "abc").await;
        assert!(matches!(short, Err(Error::Validation { field: "password", .. })));

        update_password(&identity, &settings, &parent, "new-secret").await?;
        logout(&identity, parent).await?;
        assert!(login(&store, &identity, TEST_PARENT_EMAIL, "new-secret").await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_children_requires_parent() -> Result<()> {
        let store = setup_test_store().await?;
        let child = test_session(child_profile("c1", "c@example.com", "p1"));
        let result = list_children(&store, &child).await;
        assert!(matches!(result, Err(Error::NotAuthorized { .. })));
        Ok(())
    }
}
