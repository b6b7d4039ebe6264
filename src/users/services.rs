use tracing::info;

use crate::{
    auth::{repo::CredentialStore, repo_types::User},
    error::{AuthError, AuthResult},
    users::dto::{AdminUpdateUserRequest, UpdateProfileRequest},
};

fn non_empty_name(name: &str) -> AuthResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::validation("full_name must not be empty"));
    }
    Ok(name.to_string())
}

pub async fn get_user(store: &dyn CredentialStore, id: i64) -> AuthResult<User> {
    store
        .find_user_by_id(id)
        .await?
        .ok_or(AuthError::UserNotFound)
}

pub async fn update_profile(
    store: &dyn CredentialStore,
    id: i64,
    patch: UpdateProfileRequest,
) -> AuthResult<User> {
    let mut user = get_user(store, id).await?;
    if let Some(name) = patch.full_name {
        user.full_name = non_empty_name(&name)?;
    }
    if let Some(address) = patch.address {
        user.address = address;
    }
    if let Some(avatar_url) = patch.avatar_url {
        user.avatar_url = Some(avatar_url);
    }
    let user = store.save_user(&user).await?;
    info!(user_id = user.id, "profile updated");
    Ok(user)
}

pub async fn list_users(store: &dyn CredentialStore) -> AuthResult<Vec<User>> {
    Ok(store.list_users().await?)
}

pub async fn admin_update_user(
    store: &dyn CredentialStore,
    id: i64,
    input: AdminUpdateUserRequest,
) -> AuthResult<User> {
    let mut user = get_user(store, id).await?;
    user.full_name = non_empty_name(&input.full_name)?;
    user.role = input.role;
    user.address = input.address;
    user.avatar_url = input.avatar_url;
    let user = store.save_user(&user).await?;
    info!(user_id = user.id, role = %user.role, "user updated by admin");
    Ok(user)
}

/// Blocking only affects future logins; issued access tokens stay valid.
pub async fn set_blocked(store: &dyn CredentialStore, id: i64, blocked: bool) -> AuthResult<User> {
    let mut user = get_user(store, id).await?;
    user.is_blocked = blocked;
    let user = store.save_user(&user).await?;
    info!(user_id = user.id, blocked, "block flag changed");
    Ok(user)
}

pub async fn delete_user(store: &dyn CredentialStore, id: i64) -> AuthResult<()> {
    if !store.soft_delete_user(id).await? {
        return Err(AuthError::UserNotFound);
    }
    info!(user_id = id, "user soft-deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        memory::MemoryStore,
        repo_types::{NewUser, Role},
    };

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                full_name: "Ada".into(),
                email: "ada@x.com".into(),
                password_hash: "h".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn profile_patch_touches_only_given_fields() {
        let (store, user) = seeded().await;
        let updated = update_profile(
            &store,
            user.id,
            UpdateProfileRequest {
                address: Some("1 Main St".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.address, "1 Main St");
        assert_eq!(updated.full_name, "Ada");
        assert_eq!(updated.avatar_url, None);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (store, user) = seeded().await;
        let err = update_profile(
            &store,
            user.id,
            UpdateProfileRequest {
                full_name: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn admin_edit_replaces_fields_and_role() {
        let (store, user) = seeded().await;
        let updated = admin_update_user(
            &store,
            user.id,
            AdminUpdateUserRequest {
                full_name: "Ada L".into(),
                role: Role::Admin,
                address: String::new(),
                avatar_url: Some("https://img/a.png".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.full_name, "Ada L");
        assert_eq!(updated.avatar_url.as_deref(), Some("https://img/a.png"));
    }

    #[tokio::test]
    async fn block_unblock_and_delete() {
        let (store, user) = seeded().await;
        assert!(set_blocked(&store, user.id, true).await.unwrap().is_blocked);
        assert!(!set_blocked(&store, user.id, false).await.unwrap().is_blocked);

        delete_user(&store, user.id).await.unwrap();
        assert!(matches!(
            get_user(&store, user.id).await.unwrap_err(),
            AuthError::UserNotFound
        ));
        assert!(list_users(&store).await.unwrap().is_empty());
        assert!(matches!(
            delete_user(&store, user.id).await.unwrap_err(),
            AuthError::UserNotFound
        ));
    }
}
