use async_trait::async_trait;
use serde_json::Map;

use pixie_core::types::User;

use crate::error::SecurityError;
use crate::jwt::{CUSTOM_CLAIM_FULL_NAME, CUSTOM_CLAIM_ROLE, CUSTOM_CLAIM_USERNAME};
use crate::AuthCore;

/// The minimal user-table surface the login endpoint needs, implemented by
/// the metadata store. Kept here rather than depending on `pixie-data`
/// directly, so the store crate can depend on `pixie-security` for token
/// validation without a cycle.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, SecurityError>;
    async fn update_last_login(&self, user_id: uuid::Uuid) -> Result<(), SecurityError>;
}

fn custom_claims(user: &User) -> Map<String, serde_json::Value> {
    let mut custom = Map::new();
    custom.insert(CUSTOM_CLAIM_ROLE.into(), user.role.as_str().into());
    custom.insert(CUSTOM_CLAIM_USERNAME.into(), user.username.clone().into());
    if let Some(full_name) = &user.full_name {
        custom.insert(CUSTOM_CLAIM_FULL_NAME.into(), full_name.clone().into());
    }
    custom
}

/// `POST /api/auth/login`: look up the user, bcrypt-compare the password,
/// reject inactive accounts, record `last_login`, and mint a token carrying
/// `role`/`username`/`full_name` as custom claims.
pub async fn login(
    auth: &AuthCore,
    users: &dyn UserLookup,
    username: &str,
    password: &str,
) -> Result<String, SecurityError> {
    let user = users
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| SecurityError::Invalid("invalid username or password".into()))?;

    if !user.active {
        return Err(SecurityError::Invalid("account is disabled".into()));
    }

    let matches = bcrypt::verify(password, &user.password_hash)
        .map_err(|e| SecurityError::Invalid(format!("malformed password hash: {e}")))?;
    if !matches {
        return Err(SecurityError::Invalid("invalid username or password".into()));
    }

    users.update_last_login(user.id).await?;

    auth.generate_token(user.id, custom_claims(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use pixie_core::config::SigningScheme;
    use pixie_core::types::Role;

    struct FakeUsers {
        user: Option<User>,
        last_login_calls: Mutex<Vec<uuid::Uuid>>,
    }

    #[async_trait]
    impl UserLookup for FakeUsers {
        async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, SecurityError> {
            Ok(self
                .user
                .as_ref()
                .filter(|u| u.username == username)
                .cloned())
        }

        async fn update_last_login(&self, user_id: uuid::Uuid) -> Result<(), SecurityError> {
            self.last_login_calls.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    fn auth() -> AuthCore {
        AuthCore::new(
            &SigningScheme::Hmac {
                secret: "test-secret".into(),
            },
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    fn user_with_password(password: &str) -> User {
        User {
            id: uuid::Uuid::new_v4(),
            username: "alice".into(),
            password_hash: bcrypt::hash(password, bcrypt::DEFAULT_COST).unwrap(),
            email: None,
            full_name: Some("Alice Example".into()),
            role: Role::Admin,
            created_at: chrono::Utc::now(),
            last_login: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn correct_password_mints_token_and_records_login() {
        let user = user_with_password("correct horse battery staple");
        let user_id = user.id;
        let users = FakeUsers {
            user: Some(user),
            last_login_calls: Mutex::new(Vec::new()),
        };
        let auth = auth();

        let token = login(&auth, &users, "alice", "correct horse battery staple")
            .await
            .unwrap();

        let identity = auth.validate_token(&token).unwrap();
        assert_eq!(identity.subject, user_id);
        assert_eq!(identity.role(), Some("admin"));
        assert_eq!(users.last_login_calls.lock().unwrap().as_slice(), &[user_id]);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let users = FakeUsers {
            user: Some(user_with_password("correct horse battery staple")),
            last_login_calls: Mutex::new(Vec::new()),
        };
        let auth = auth();

        let result = login(&auth, &users, "alice", "wrong password").await;
        assert!(result.is_err());
        assert!(users.last_login_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_account_is_rejected() {
        let mut user = user_with_password("correct horse battery staple");
        user.active = false;
        let users = FakeUsers {
            user: Some(user),
            last_login_calls: Mutex::new(Vec::new()),
        };
        let auth = auth();

        let result = login(&auth, &users, "alice", "correct horse battery staple").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_username_is_rejected() {
        let users = FakeUsers {
            user: None,
            last_login_calls: Mutex::new(Vec::new()),
        };
        let auth = auth();

        let result = login(&auth, &users, "nobody", "whatever").await;
        assert!(result.is_err());
    }
}
