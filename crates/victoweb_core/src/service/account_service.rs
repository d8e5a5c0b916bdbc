//! Account use-case service: signup, login and sessions.
//!
//! # Responsibility
//! - Validate signup input and store hashed credentials.
//! - Authenticate username/password pairs.
//! - Mint, resolve and end cookie sessions.
//!
//! # Invariants
//! - Authentication failures are indistinguishable to callers
//!   (`InvalidCredentials` for unknown user, bad password, inactive account).
//! - Passwords never reach logs.

use super::password::{hash_password, validate_password, verify_password, PasswordHashError};
use crate::model::account::{Account, AccountId, NewAccount};
use crate::model::validation::{max_chars, require, ValidationError};
use crate::model::EpochMillis;
use crate::repo::account_repo::AccountRepository;
use crate::repo::RepoError;
use log::{info, warn};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_FULL_NAME_LENGTH: usize = 255;
pub const MAX_PHONE_LENGTH: usize = 32;

/// Signup form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub username: String,
    pub full_name: String,
    pub phone: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug)]
pub enum AccountServiceError {
    Validation(ValidationError),
    UsernameTaken(String),
    InvalidCredentials,
    Hash(PasswordHashError),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for AccountServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UsernameTaken(username) => {
                write!(f, "A user with username `{username}` already exists.")
            }
            Self::InvalidCredentials => write!(
                f,
                "Please enter a correct username and password. Note that both fields may be case-sensitive."
            ),
            Self::Hash(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent account state: {details}"),
        }
    }
}

impl Error for AccountServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Hash(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AccountServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for AccountServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PasswordHashError> for AccountServiceError {
    fn from(value: PasswordHashError) -> Self {
        Self::Hash(value)
    }
}

/// Freshly minted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub session_key: String,
    pub expires_at: EpochMillis,
}

pub struct AccountService<R: AccountRepository> {
    repo: R,
}

impl<R: AccountRepository> AccountService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a regular (non-staff) account.
    pub fn signup(&self, request: &SignupRequest) -> Result<Account, AccountServiceError> {
        let username = request.username.trim();
        validate_username(username)?;

        let full_name = request.full_name.trim();
        require("full_name", full_name)?;
        max_chars("full_name", full_name, MAX_FULL_NAME_LENGTH)?;

        let phone = request.phone.trim();
        require("phone", phone)?;
        max_chars("phone", phone, MAX_PHONE_LENGTH)?;

        require("password1", &request.password1)?;
        require("password2", &request.password2)?;
        if request.password1 != request.password2 {
            return Err(ValidationError::new(
                "password2",
                "The two password fields didn't match.",
            )
            .into());
        }
        validate_password("password2", &request.password1, username)?;

        if self.repo.find_by_username(username)?.is_some() {
            return Err(AccountServiceError::UsernameTaken(username.to_string()));
        }

        let new_account = NewAccount {
            username: username.to_string(),
            password_hash: hash_password(&request.password1)?,
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            ..NewAccount::default()
        };
        let account_id = match self.repo.create_account(&new_account) {
            Ok(id) => id,
            Err(RepoError::Conflict(_)) => {
                return Err(AccountServiceError::UsernameTaken(username.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            "event=account_signup module=account status=ok account_id={}",
            account_id
        );
        self.get_account(account_id)?
            .ok_or(AccountServiceError::InconsistentState(
                "created account not found in read-back",
            ))
    }

    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Account, AccountServiceError> {
        let Some(credentials) = self.repo.find_credentials(username.trim())? else {
            warn!("event=account_login module=account status=rejected reason=unknown_user");
            return Err(AccountServiceError::InvalidCredentials);
        };
        if !verify_password(password, &credentials.password_hash) {
            warn!(
                "event=account_login module=account status=rejected reason=bad_password account_id={}",
                credentials.account.id
            );
            return Err(AccountServiceError::InvalidCredentials);
        }
        if !credentials.account.is_active {
            warn!(
                "event=account_login module=account status=rejected reason=inactive account_id={}",
                credentials.account.id
            );
            return Err(AccountServiceError::InvalidCredentials);
        }
        Ok(credentials.account)
    }

    /// Creates a session for `account` and records the login time.
    pub fn start_session(
        &self,
        account: &Account,
        now: EpochMillis,
        ttl_secs: u64,
    ) -> Result<SessionGrant, AccountServiceError> {
        let purged = self.repo.purge_expired_sessions(now)?;
        let session_key = Uuid::new_v4().simple().to_string();
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);
        self.repo.create_session(&session_key, account.id, expires_at)?;
        self.repo.record_login(account.id, now)?;
        info!(
            "event=session_start module=account status=ok account_id={} purged={}",
            account.id, purged
        );
        Ok(SessionGrant {
            session_key,
            expires_at,
        })
    }

    pub fn resolve_session(
        &self,
        session_key: &str,
        now: EpochMillis,
    ) -> Result<Option<Account>, AccountServiceError> {
        if session_key.is_empty() {
            return Ok(None);
        }
        let account = self.repo.session_account(session_key, now)?;
        Ok(account.filter(|account| account.is_active))
    }

    /// Returns whether a session existed.
    pub fn end_session(&self, session_key: &str) -> Result<bool, AccountServiceError> {
        let removed = self.repo.delete_session(session_key)?;
        info!(
            "event=session_end module=account status=ok removed={}",
            removed
        );
        Ok(removed)
    }

    pub fn purge_expired_sessions(&self, now: EpochMillis) -> Result<usize, AccountServiceError> {
        Ok(self.repo.purge_expired_sessions(now)?)
    }

    pub fn get_account(&self, id: AccountId) -> Result<Option<Account>, AccountServiceError> {
        Ok(self.repo.get_account(id)?)
    }
}

/// Letters, digits and `@.+-_`, 1 to 150 characters.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    require("username", username)?;
    max_chars("username", username, MAX_USERNAME_LENGTH)?;
    let valid = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(ValidationError::new(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}
