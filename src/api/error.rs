//! The Subsonic error taxonomy: every failure a handler can produce
//! maps to one of the fixed numeric codes the protocol defines,
//! independent of the HTTP status (structured endpoints always answer
//! 200 with a `status="failed"` envelope; only the binary handlers in
//! `crate::streaming` use real HTTP status codes).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("a generic error")]
    NotImplemented,
    #[error("unknown entry point")]
    UnknownEntryPoint,
    #[error("required parameter is missing: {0}")]
    RequiredParameterMissing(String),
    #[error("incompatible client version")]
    ClientMustUpgrade,
    #[error("incompatible server version")]
    ServerMustUpgrade,
    #[error("wrong username or password")]
    WrongUsernameOrPassword,
    #[error("token authentication not supported for LDAP users")]
    TokenAuthNotSupportedForLdap,
    #[error("provided authentication mechanism is not supported")]
    AuthMechanismNotSupported,
    #[error("multiple conflicting authentication mechanisms provided")]
    MultipleConflictingAuthMechanisms,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("user is not authorized for the requested operation")]
    UserNotAuthorized,
    #[error("the requested data was not found")]
    RequestedDataNotFound,
    #[error("bad parameter: {0}")]
    BadParameter(String),
    #[error("parameter value is too high: {0}")]
    ParameterValueTooHigh(String),
    #[error("internal server error")]
    InternalError(String),
    #[error("login throttled")]
    LoginThrottled,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("password is too weak")]
    PasswordTooWeak,
    #[error("password must match login name")]
    PasswordMustMatchLoginName,
}

impl ApiError {
    pub fn generic_bad_parameter(name: &str) -> Self {
        ApiError::BadParameter(name.to_string())
    }

    /// The numeric Subsonic error code the wire protocol defines.
    pub fn code(&self) -> u32 {
        match self {
            ApiError::NotImplemented
            | ApiError::UnknownEntryPoint
            | ApiError::BadParameter(_)
            | ApiError::ParameterValueTooHigh(_)
            | ApiError::InternalError(_)
            | ApiError::LoginThrottled
            | ApiError::UserAlreadyExists
            | ApiError::PasswordTooWeak
            | ApiError::PasswordMustMatchLoginName => 0,
            ApiError::RequiredParameterMissing(_) => 10,
            ApiError::ClientMustUpgrade => 20,
            ApiError::ServerMustUpgrade => 30,
            ApiError::WrongUsernameOrPassword => 40,
            ApiError::TokenAuthNotSupportedForLdap => 41,
            ApiError::AuthMechanismNotSupported => 42,
            ApiError::MultipleConflictingAuthMechanisms => 43,
            ApiError::InvalidApiKey => 44,
            ApiError::UserNotAuthorized => 50,
            ApiError::RequestedDataNotFound => 70,
        }
    }

    /// Human-readable message embedded in the error envelope. Generic
    /// (code 0) errors carry the specific reason in the message since
    /// the code itself doesn't distinguish them.
    pub fn message(&self) -> String {
        match self {
            ApiError::NotImplemented => "not implemented".to_string(),
            ApiError::UnknownEntryPoint => "unknown entry point".to_string(),
            ApiError::RequiredParameterMissing(name) => format!("required parameter '{name}' is missing"),
            ApiError::ClientMustUpgrade => "incompatible client version, please upgrade".to_string(),
            ApiError::ServerMustUpgrade => "incompatible server version, please upgrade".to_string(),
            ApiError::WrongUsernameOrPassword => "wrong username or password".to_string(),
            ApiError::TokenAuthNotSupportedForLdap => "token authentication not supported for LDAP users".to_string(),
            ApiError::AuthMechanismNotSupported => "provided authentication mechanism not supported".to_string(),
            ApiError::MultipleConflictingAuthMechanisms => {
                "multiple conflicting authentication mechanisms provided".to_string()
            }
            ApiError::InvalidApiKey => "invalid API key".to_string(),
            ApiError::UserNotAuthorized => "user is not authorized for the given operation".to_string(),
            ApiError::RequestedDataNotFound => "the requested data was not found".to_string(),
            ApiError::BadParameter(name) => format!("bad parameter: {name}"),
            ApiError::ParameterValueTooHigh(name) => format!("parameter '{name}' value is too high"),
            ApiError::InternalError(reason) => format!("internal error: {reason}"),
            ApiError::LoginThrottled => "too many failed login attempts, try again later".to_string(),
            ApiError::UserAlreadyExists => "user already exists".to_string(),
            ApiError::PasswordTooWeak => "password is too weak".to_string(),
            ApiError::PasswordMustMatchLoginName => "password must match login name".to_string(),
        }
    }
}

impl From<crate::db::Error> for ApiError {
    fn from(error: crate::db::Error) -> Self {
        match error {
            crate::db::Error::ObjectNotFound => ApiError::RequestedDataNotFound,
            crate::db::Error::InvalidName(reason) => ApiError::BadParameter(reason),
            crate::db::Error::LockTimeout => ApiError::InternalError("database busy, try again".to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_taxonomy() {
        assert_eq!(ApiError::NotImplemented.code(), 0);
        assert_eq!(ApiError::RequiredParameterMissing("id".to_string()).code(), 10);
        assert_eq!(ApiError::ClientMustUpgrade.code(), 20);
        assert_eq!(ApiError::ServerMustUpgrade.code(), 30);
        assert_eq!(ApiError::WrongUsernameOrPassword.code(), 40);
        assert_eq!(ApiError::TokenAuthNotSupportedForLdap.code(), 41);
        assert_eq!(ApiError::AuthMechanismNotSupported.code(), 42);
        assert_eq!(ApiError::MultipleConflictingAuthMechanisms.code(), 43);
        assert_eq!(ApiError::InvalidApiKey.code(), 44);
        assert_eq!(ApiError::UserNotAuthorized.code(), 50);
        assert_eq!(ApiError::RequestedDataNotFound.code(), 70);
    }

    #[test]
    fn object_not_found_maps_to_requested_data_not_found() {
        let api_error: ApiError = crate::db::Error::ObjectNotFound.into();
        assert_eq!(api_error.code(), 70);
    }
}
