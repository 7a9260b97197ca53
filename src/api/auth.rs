//! Credential resolution. This module owns only the *contract*: which
//! of the mechanisms a request used (trusted reverse-proxy header,
//! API key, username+password, or username+token), detecting
//! conflicting or unsupported ones, and turning a resolved identity
//! into a `User`. Actual password hashing and LDAP lookups are
//! explicitly out of scope; callers plug in a [`CredentialVerifier`]
//! and the resolver treats it as a black box.

use crate::config::Config;
use crate::db::models::User;
use crate::db::pool::Executor;
use crate::db::{self, models::UserType};

use super::error::ApiError;

/// The verification backend a deployment plugs in. The default
/// [`PermissiveVerifier`] accepts any credential for any user and
/// exists only so the rest of the request pipeline has something to
/// exercise; real deployments supply their own.
pub trait CredentialVerifier: Send + Sync {
    fn verify_password(&self, user: &User, password: &str) -> bool;
    fn verify_token(&self, user: &User, token: &str, salt: &str) -> bool;
    fn is_ldap_backed(&self, user: &User) -> bool;

    /// Checked before `verify_password` for password-mechanism logins.
    /// A verifier backed by a rate limiter returns `true` once a user
    /// has failed too many attempts recently, short-circuiting to
    /// `ApiError::LoginThrottled` without ever checking the password.
    fn is_login_throttled(&self, _user: &User) -> bool {
        false
    }

    /// Resolves a bare `apiKey` query parameter to a username, for
    /// deployments that hand out long-lived keys instead of passwords.
    /// `None` maps to `ApiError::InvalidApiKey`.
    fn verify_api_key(&self, _api_key: &str) -> Option<String> {
        None
    }
}

pub struct PermissiveVerifier;

impl CredentialVerifier for PermissiveVerifier {
    fn verify_password(&self, _user: &User, _password: &str) -> bool {
        true
    }
    fn verify_token(&self, _user: &User, _token: &str, _salt: &str) -> bool {
        true
    }
    fn is_ldap_backed(&self, _user: &User) -> bool {
        false
    }
    fn verify_api_key(&self, api_key: &str) -> Option<String> {
        Some(api_key.to_string())
    }
}

enum Mechanism<'a> {
    Password(&'a str),
    Token { token: &'a str, salt: &'a str },
}

/// Selects between username+password and username+token once the
/// trusted-header and API-key mechanisms have already been ruled out.
fn select_mechanism<'a>(params: &'a std::collections::HashMap<String, String>) -> Result<Mechanism<'a>, ApiError> {
    let password = params.get("p").map(String::as_str);
    let token = params.get("t").map(String::as_str);
    let salt = params.get("s").map(String::as_str);

    match (password, token, salt) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(ApiError::MultipleConflictingAuthMechanisms),
        (Some(password), None, None) => Ok(Mechanism::Password(password)),
        (None, Some(token), Some(salt)) => Ok(Mechanism::Token { token, salt }),
        (None, Some(_), None) | (None, None, Some(_)) => Err(ApiError::RequiredParameterMissing("s".to_string())),
        (None, None, None) => Err(ApiError::RequiredParameterMissing("p".to_string())),
    }
}

/// Resolves a request's credentials into a `User`, creating nothing:
/// an unknown username always fails rather than auto-provisioning an
/// account. Tries, in order: a trusted reverse-proxy header (if one is
/// configured and present), a bare `apiKey` parameter, then the
/// `u`/`p`/`t`/`s` query parameters.
pub async fn resolve(
    tx: &mut impl Executor,
    config: &Config,
    verifier: &dyn CredentialVerifier,
    params: &std::collections::HashMap<String, String>,
    trusted_header_value: Option<&str>,
) -> Result<User, ApiError> {
    if let Some(username) = trusted_header_value {
        return db::user::find_by_name(tx, username)
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::UserNotAuthorized);
    }

    if let Some(api_key) = params.get("apiKey") {
        let username = verifier.verify_api_key(api_key).ok_or(ApiError::InvalidApiKey)?;
        return db::user::find_by_name(tx, &username)
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::InvalidApiKey);
    }

    let username = params.get("u").ok_or_else(|| ApiError::RequiredParameterMissing("u".to_string()))?;
    let mechanism = select_mechanism(params)?;

    let user = db::user::find_by_name(tx, username)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::WrongUsernameOrPassword)?;

    match mechanism {
        Mechanism::Password(password) => {
            if !config.support_user_password_auth {
                return Err(ApiError::AuthMechanismNotSupported);
            }
            if verifier.is_login_throttled(&user) {
                return Err(ApiError::LoginThrottled);
            }
            if !verifier.verify_password(&user, password) {
                return Err(ApiError::WrongUsernameOrPassword);
            }
        }
        Mechanism::Token { token, salt } => {
            if verifier.is_ldap_backed(&user) {
                return Err(ApiError::TokenAuthNotSupportedForLdap);
            }
            if !verifier.verify_token(&user, token, salt) {
                return Err(ApiError::WrongUsernameOrPassword);
            }
        }
    }

    Ok(user)
}

/// `admin`-gated endpoints (user management, scan control) require
/// this in addition to a resolved identity.
pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.user_type == UserType::Admin {
        Ok(())
    } else {
        Err(ApiError::UserNotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> std::collections::HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn password_and_token_together_is_a_conflict() {
        let p = params(&[("u", "alice"), ("p", "secret"), ("t", "abc"), ("s", "xyz")]);
        assert!(matches!(select_mechanism(&p), Err(ApiError::MultipleConflictingAuthMechanisms)));
    }

    #[test]
    fn token_without_salt_is_missing_parameter() {
        let p = params(&[("u", "alice"), ("t", "abc")]);
        assert!(matches!(select_mechanism(&p), Err(ApiError::RequiredParameterMissing(_))));
    }

    #[test]
    fn plain_password_selects_password_mechanism() {
        let p = params(&[("u", "alice"), ("p", "secret")]);
        assert!(matches!(select_mechanism(&p), Ok(Mechanism::Password("secret"))));
    }

    use crate::db::pool::SessionPool;
    use crate::db::{models::UserType as DbUserType, user as db_user};

    struct ThrottlingVerifier;

    impl CredentialVerifier for ThrottlingVerifier {
        fn verify_password(&self, _user: &User, _password: &str) -> bool {
            true
        }
        fn verify_token(&self, _user: &User, _token: &str, _salt: &str) -> bool {
            true
        }
        fn is_ldap_backed(&self, _user: &User) -> bool {
            false
        }
        fn is_login_throttled(&self, _user: &User) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn trusted_header_resolves_without_any_credential_params() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        db_user::create(&mut tx, "alice", DbUserType::Regular).await.unwrap();
        tx.commit().await.unwrap();

        let session = pool.session().await.unwrap();
        let mut tx = session.read().await.unwrap();
        let config = Config::default();
        let user = resolve(&mut tx, &config, &PermissiveVerifier, &params(&[]), Some("alice")).await.unwrap();
        assert_eq!(user.name, "alice");
    }

    #[tokio::test]
    async fn unknown_trusted_header_username_is_unauthorized() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.read().await.unwrap();
        let config = Config::default();
        let err = resolve(&mut tx, &config, &PermissiveVerifier, &params(&[]), Some("ghost")).await.unwrap_err();
        assert!(matches!(err, ApiError::UserNotAuthorized));
    }

    #[tokio::test]
    async fn api_key_resolves_to_the_username_the_verifier_returns() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        db_user::create(&mut tx, "alice", DbUserType::Regular).await.unwrap();
        tx.commit().await.unwrap();

        let session = pool.session().await.unwrap();
        let mut tx = session.read().await.unwrap();
        let config = Config::default();
        let user = resolve(&mut tx, &config, &PermissiveVerifier, &params(&[("apiKey", "alice")]), None).await.unwrap();
        assert_eq!(user.name, "alice");
    }

    struct RejectingApiKeyVerifier;

    impl CredentialVerifier for RejectingApiKeyVerifier {
        fn verify_password(&self, _user: &User, _password: &str) -> bool {
            true
        }
        fn verify_token(&self, _user: &User, _token: &str, _salt: &str) -> bool {
            true
        }
        fn is_ldap_backed(&self, _user: &User) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn unrecognized_api_key_is_rejected() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.read().await.unwrap();
        let config = Config::default();
        let err = resolve(&mut tx, &config, &RejectingApiKeyVerifier, &params(&[("apiKey", "whatever")]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidApiKey));
    }

    #[tokio::test]
    async fn throttled_login_is_rejected_before_password_is_checked() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        db_user::create(&mut tx, "alice", DbUserType::Regular).await.unwrap();
        tx.commit().await.unwrap();

        let session = pool.session().await.unwrap();
        let mut tx = session.read().await.unwrap();
        let config = Config::default();
        let err = resolve(&mut tx, &config, &ThrottlingVerifier, &params(&[("u", "alice"), ("p", "secret")]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::LoginThrottled));
    }
}
