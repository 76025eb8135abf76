use std::collections::HashMap;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use tracing::info;

use super::principal::Principal;
use super::session::gen_token;
use super::IdentityError;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    principal: Principal,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct RecoveryGrant {
    email: String,
    expires_at: DateTime<Utc>,
}

fn hash_password(password: &str) -> Result<String, IdentityError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| IdentityError::Internal(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| IdentityError::Internal(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

fn check_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(IdentityError::WeakPassword(MIN_PASSWORD_LEN));
    }
    Ok(())
}

/// Registered users and outstanding password recovery grants.
pub struct AccountDirectory {
    accounts: RwLock<HashMap<String, Account>>,
    recovery: RwLock<HashMap<String, RecoveryGrant>>,
    recovery_ttl: Duration,
}

impl Default for AccountDirectory {
    fn default() -> Self {
        Self { accounts: RwLock::new(HashMap::new()), recovery: RwLock::new(HashMap::new()), recovery_ttl: Duration::hours(1) }
    }
}

impl AccountDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn sign_up(&self, email: &str, password: &str, display_name: Option<String>) -> Result<Principal, IdentityError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(IdentityError::InvalidEmail);
        }
        check_password(password)?;
        let password_hash = hash_password(password)?;
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&email) {
            return Err(IdentityError::EmailTaken);
        }
        let principal = Principal {
            user_id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            display_name: display_name.filter(|d| !d.trim().is_empty()),
            roles: vec!["student".into()],
        };
        accounts.insert(email, Account { principal: principal.clone(), password_hash });
        info!(target: "folio::session", user = %principal.user_id, "account.sign_up");
        Ok(principal)
    }

    pub fn verify(&self, email: &str, password: &str) -> Result<Principal, IdentityError> {
        let accounts = self.accounts.read();
        match accounts.get(&normalize_email(email)) {
            Some(acct) if verify_password(&acct.password_hash, password) => Ok(acct.principal.clone()),
            _ => Err(IdentityError::InvalidCredentials),
        }
    }

    pub fn find(&self, email: &str) -> Option<Principal> {
        self.accounts.read().get(&normalize_email(email)).map(|a| a.principal.clone())
    }

    /// Issue a single-use recovery token. Unknown emails yield `Ok(None)` so callers
    /// can answer identically either way.
    pub fn issue_recovery(&self, email: &str) -> Result<Option<String>, IdentityError> {
        let email = normalize_email(email);
        if !self.accounts.read().contains_key(&email) {
            return Ok(None);
        }
        let token = gen_token()?;
        let now = Utc::now();
        let mut grants = self.recovery.write();
        grants.retain(|_, g| g.expires_at > now);
        grants.insert(token.clone(), RecoveryGrant { email, expires_at: now + self.recovery_ttl });
        Ok(Some(token))
    }

    /// Consume a recovery token and set a new password for its account.
    pub fn redeem_recovery(&self, token: &str, new_password: &str) -> Result<Principal, IdentityError> {
        check_password(new_password)?;
        let grant = self.recovery.write().remove(token).ok_or(IdentityError::InvalidRecoveryToken)?;
        if grant.expires_at <= Utc::now() {
            return Err(IdentityError::InvalidRecoveryToken);
        }
        let password_hash = hash_password(new_password)?;
        let mut accounts = self.accounts.write();
        let acct = accounts.get_mut(&grant.email).ok_or(IdentityError::InvalidRecoveryToken)?;
        acct.password_hash = password_hash;
        info!(target: "folio::session", user = %acct.principal.user_id, "account.password_updated");
        Ok(acct.principal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_and_verify() {
        let dir = AccountDirectory::new();
        let p = dir.sign_up("Ana@Example.edu ", "secret1", Some("Ana".into())).unwrap();
        assert_eq!(p.email, "ana@example.edu");
        assert_eq!(dir.verify("ana@example.edu", "secret1").unwrap().user_id, p.user_id);
        assert!(matches!(dir.verify("ana@example.edu", "wrong!!"), Err(IdentityError::InvalidCredentials)));
        assert!(matches!(dir.verify("ghost@example.edu", "secret1"), Err(IdentityError::InvalidCredentials)));
    }

    #[test]
    fn rejects_duplicates_and_weak_passwords() {
        let dir = AccountDirectory::new();
        dir.sign_up("a@b.c", "secret1", None).unwrap();
        assert!(matches!(dir.sign_up("A@B.C", "secret2", None), Err(IdentityError::EmailTaken)));
        assert!(matches!(dir.sign_up("x@b.c", "123", None), Err(IdentityError::WeakPassword(_))));
        assert!(matches!(dir.sign_up("nobody", "secret1", None), Err(IdentityError::InvalidEmail)));
    }

    #[test]
    fn recovery_token_is_single_use() {
        let dir = AccountDirectory::new();
        dir.sign_up("a@b.c", "secret1", None).unwrap();
        assert!(dir.issue_recovery("missing@b.c").unwrap().is_none());
        let token = dir.issue_recovery("a@b.c").unwrap().unwrap();
        dir.redeem_recovery(&token, "newsecret").unwrap();
        assert!(dir.verify("a@b.c", "newsecret").is_ok());
        assert!(dir.verify("a@b.c", "secret1").is_err());
        assert!(matches!(dir.redeem_recovery(&token, "another1"), Err(IdentityError::InvalidRecoveryToken)));
    }
}
