//! Account and session repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist accounts, password hashes and login sessions.
//! - Keep password hashes out of the plain `Account` read model.
//!
//! # Invariants
//! - Usernames are unique; duplicates surface as `RepoError::Conflict`.
//! - Expired sessions or sessions of inactive accounts never resolve.

use super::{bool_to_int, int_to_bool, RepoError, RepoResult};
use crate::model::account::{Account, AccountCredentials, AccountId, AdminRole, NewAccount};
use crate::model::EpochMillis;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ACCOUNT_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    full_name,
    phone,
    is_staff,
    is_superuser,
    is_active,
    admin_role,
    date_joined,
    last_login,
    password_hash
FROM accounts";

/// Repository interface for accounts and sessions.
pub trait AccountRepository {
    fn create_account(&self, account: &NewAccount) -> RepoResult<AccountId>;
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>>;
    fn find_credentials(&self, username: &str) -> RepoResult<Option<AccountCredentials>>;
    /// Writes email, names, flags and role; username and password are untouched.
    fn update_account(&self, account: &Account) -> RepoResult<()>;
    fn set_password_hash(&self, id: AccountId, password_hash: &str) -> RepoResult<()>;
    fn record_login(&self, id: AccountId, at: EpochMillis) -> RepoResult<()>;
    /// Staff accounts ordered by full name, then username.
    fn list_staff(&self) -> RepoResult<Vec<Account>>;
    fn create_session(
        &self,
        session_key: &str,
        account_id: AccountId,
        expires_at: EpochMillis,
    ) -> RepoResult<()>;
    fn session_account(&self, session_key: &str, now: EpochMillis) -> RepoResult<Option<Account>>;
    /// Returns whether a session row was removed.
    fn delete_session(&self, session_key: &str) -> RepoResult<bool>;
    fn purge_expired_sessions(&self, now: EpochMillis) -> RepoResult<usize>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn create_account(&self, account: &NewAccount) -> RepoResult<AccountId> {
        let result = self.conn.execute(
            "INSERT INTO accounts (
                username,
                password_hash,
                email,
                full_name,
                phone,
                is_staff,
                is_superuser,
                admin_role
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                account.username.as_str(),
                account.password_hash.as_str(),
                account.email.as_str(),
                account.full_name.as_str(),
                account.phone.as_str(),
                bool_to_int(account.is_staff),
                bool_to_int(account.is_superuser),
                account.admin_role.as_str(),
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(err) => match RepoError::from(err) {
                RepoError::Conflict(_) => Err(RepoError::Conflict(format!(
                    "username `{}` already exists",
                    account.username
                ))),
                other => Err(other),
            },
        }
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_account_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        Ok(self
            .find_credentials(username)?
            .map(|credentials| credentials.account))
    }

    fn find_credentials(&self, username: &str) -> RepoResult<Option<AccountCredentials>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE username = ?1;"))?;
        let mut rows = stmt.query([username])?;
        match rows.next()? {
            Some(row) => {
                let account = parse_account_row(row)?;
                let password_hash: String = row.get("password_hash")?;
                Ok(Some(AccountCredentials {
                    account,
                    password_hash,
                }))
            }
            None => Ok(None),
        }
    }

    fn update_account(&self, account: &Account) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET
                email = ?2,
                full_name = ?3,
                phone = ?4,
                is_staff = ?5,
                is_superuser = ?6,
                is_active = ?7,
                admin_role = ?8
             WHERE id = ?1;",
            params![
                account.id,
                account.email.as_str(),
                account.full_name.as_str(),
                account.phone.as_str(),
                bool_to_int(account.is_staff),
                bool_to_int(account.is_superuser),
                bool_to_int(account.is_active),
                account.admin_role.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("account", account.id));
        }
        Ok(())
    }

    fn set_password_hash(&self, id: AccountId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts SET password_hash = ?2 WHERE id = ?1;",
            params![id, password_hash],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("account", id));
        }
        Ok(())
    }

    fn record_login(&self, id: AccountId, at: EpochMillis) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts SET last_login = ?2 WHERE id = ?1;",
            params![id, at],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("account", id));
        }
        Ok(())
    }

    fn list_staff(&self) -> RepoResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACCOUNT_SELECT_SQL}
             WHERE is_staff = 1
             ORDER BY full_name ASC, username ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }
        Ok(accounts)
    }

    fn create_session(
        &self,
        session_key: &str,
        account_id: AccountId,
        expires_at: EpochMillis,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO sessions (session_key, account_id, expires_at) VALUES (?1, ?2, ?3);",
            params![session_key, account_id, expires_at],
        )?;
        Ok(())
    }

    fn session_account(&self, session_key: &str, now: EpochMillis) -> RepoResult<Option<Account>> {
        let account_id: Option<AccountId> = self
            .conn
            .query_row(
                "SELECT s.account_id
                 FROM sessions s
                 INNER JOIN accounts a ON a.id = s.account_id
                 WHERE s.session_key = ?1
                   AND s.expires_at > ?2
                   AND a.is_active = 1;",
                params![session_key, now],
                |row| row.get(0),
            )
            .optional()?;

        match account_id {
            Some(id) => self.get_account(id),
            None => Ok(None),
        }
    }

    fn delete_session(&self, session_key: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE session_key = ?1;", [session_key])?;
        Ok(changed > 0)
    }

    fn purge_expired_sessions(&self, now: EpochMillis) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1;", [now])?;
        Ok(removed)
    }
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let role_text: String = row.get("admin_role")?;
    let admin_role = AdminRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid admin role `{role_text}` in accounts.admin_role"
        ))
    })?;

    Ok(Account {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        phone: row.get("phone")?,
        is_staff: int_to_bool(row.get("is_staff")?, "accounts.is_staff")?,
        is_superuser: int_to_bool(row.get("is_superuser")?, "accounts.is_superuser")?,
        is_active: int_to_bool(row.get("is_active")?, "accounts.is_active")?,
        admin_role,
        date_joined: row.get("date_joined")?,
        last_login: row.get("last_login")?,
    })
}
