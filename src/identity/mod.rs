//! Identity and session management for the portfolio front end.
//! Keep the public surface thin and split implementation across sub-modules.

mod accounts;
mod principal;
mod provider;
mod session;
mod store;

pub use accounts::{AccountDirectory, MIN_PASSWORD_LEN};
pub use principal::Principal;
pub use provider::{AuthEvent, IdentityProvider, ListenerId, ListenerSet, LocalIdentityProvider, SessionListener};
pub use session::{new_csrf_token, Session, SessionManager, SessionState, SessionToken};
pub use store::{SessionStore, Subscription};

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("recovery link is invalid or has expired")]
    InvalidRecoveryToken,
    #[error("no active session")]
    NoSession,
    #[error("identity provider unreachable: {0}")]
    Unavailable(String),
    #[error("identity provider error: {0}")]
    Internal(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        let msg = err.to_string();
        match err {
            IdentityError::InvalidCredentials => AppError::auth("invalid_credentials".into(), msg),
            IdentityError::NoSession => AppError::auth("no_session".into(), msg),
            IdentityError::EmailTaken => AppError::conflict("email_taken".into(), msg),
            IdentityError::InvalidEmail => AppError::user("invalid_email".into(), msg),
            IdentityError::WeakPassword(_) => AppError::user("weak_password".into(), msg),
            IdentityError::InvalidRecoveryToken => AppError::user("invalid_recovery_token".into(), msg),
            IdentityError::Unavailable(_) => AppError::io("identity_unavailable".into(), msg),
            IdentityError::Internal(_) => AppError::internal("identity_error".into(), msg),
        }
    }
}
