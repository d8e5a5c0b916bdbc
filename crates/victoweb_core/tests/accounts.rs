use victoweb_core::db::open_db_in_memory;
use victoweb_core::model::account::{AdminRole, NewAccount};
use victoweb_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use victoweb_core::service::account_service::{
    AccountService, AccountServiceError, SignupRequest,
};
use victoweb_core::service::password::hash_password;

fn signup_request(username: &str) -> SignupRequest {
    SignupRequest {
        username: username.to_string(),
        full_name: "  Dana Reyes ".to_string(),
        phone: " 555-0100 ".to_string(),
        password1: "tangerine-orbit-42".to_string(),
        password2: "tangerine-orbit-42".to_string(),
    }
}

#[test]
fn signup_creates_regular_account_with_trimmed_profile() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(SqliteAccountRepository::new(&conn));

    let account = service.signup(&signup_request("dana")).unwrap();
    assert_eq!(account.username, "dana");
    assert_eq!(account.full_name, "Dana Reyes");
    assert_eq!(account.phone, "555-0100");
    assert!(!account.is_staff);
    assert!(account.is_active);
    assert_eq!(account.admin_role, AdminRole::None);

    let authenticated = service.authenticate("dana", "tangerine-orbit-42").unwrap();
    assert_eq!(authenticated.id, account.id);
}

#[test]
fn signup_rejects_duplicates_and_bad_passwords() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(SqliteAccountRepository::new(&conn));
    service.signup(&signup_request("dana")).unwrap();

    assert!(matches!(
        service.signup(&signup_request("dana")),
        Err(AccountServiceError::UsernameTaken(_))
    ));

    let mut mismatch = signup_request("lee");
    mismatch.password2 = "something-else-99".to_string();
    match service.signup(&mismatch) {
        Err(AccountServiceError::Validation(err)) => assert_eq!(err.field, "password2"),
        other => panic!("unexpected result: {other:?}"),
    }

    let mut numeric = signup_request("kim");
    numeric.password1 = "20240501123".to_string();
    numeric.password2 = numeric.password1.clone();
    assert!(matches!(
        service.signup(&numeric),
        Err(AccountServiceError::Validation(_))
    ));

    let mut missing_phone = signup_request("sam");
    missing_phone.phone = "   ".to_string();
    match service.signup(&missing_phone) {
        Err(AccountServiceError::Validation(err)) => assert_eq!(err.field, "phone"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn authentication_failures_are_uniform() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAccountRepository::new(&conn);
    let service = AccountService::new(SqliteAccountRepository::new(&conn));
    let account = service.signup(&signup_request("dana")).unwrap();

    assert!(matches!(
        service.authenticate("nobody", "tangerine-orbit-42"),
        Err(AccountServiceError::InvalidCredentials)
    ));
    assert!(matches!(
        service.authenticate("dana", "wrong-password-1"),
        Err(AccountServiceError::InvalidCredentials)
    ));

    let mut inactive = account.clone();
    inactive.is_active = false;
    repo.update_account(&inactive).unwrap();
    assert!(matches!(
        service.authenticate("dana", "tangerine-orbit-42"),
        Err(AccountServiceError::InvalidCredentials)
    ));
}

#[test]
fn sessions_resolve_until_expiry_and_end_on_logout() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(SqliteAccountRepository::new(&conn));
    let account = service.signup(&signup_request("dana")).unwrap();

    let now = 1_741_000_000_000;
    let grant = service.start_session(&account, now, 60).unwrap();
    assert_eq!(grant.session_key.len(), 32);
    assert_eq!(grant.expires_at, now + 60_000);

    let resolved = service
        .resolve_session(&grant.session_key, now + 1_000)
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, account.id);
    assert_eq!(resolved.last_login, Some(now));

    assert!(service
        .resolve_session(&grant.session_key, now + 60_001)
        .unwrap()
        .is_none());
    assert_eq!(service.purge_expired_sessions(now + 60_001).unwrap(), 1);

    let second = service.start_session(&account, now, 60).unwrap();
    assert!(service.end_session(&second.session_key).unwrap());
    assert!(!service.end_session(&second.session_key).unwrap());
    assert!(service
        .resolve_session(&second.session_key, now)
        .unwrap()
        .is_none());
    assert!(service.resolve_session("", now).unwrap().is_none());
}

#[test]
fn starting_a_session_purges_expired_ones() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(SqliteAccountRepository::new(&conn));
    let dana = service.signup(&signup_request("dana")).unwrap();
    let omar = service.signup(&signup_request("omar")).unwrap();

    let now = 1_741_000_000_000;
    let stale = service.start_session(&dana, now, 60).unwrap();
    let live = service.start_session(&omar, now, 3_600).unwrap();

    service.start_session(&omar, now + 120_000, 60).unwrap();

    // Resolving at the old clock would still succeed if the row survived.
    assert!(service
        .resolve_session(&stale.session_key, now + 1_000)
        .unwrap()
        .is_none());
    assert!(service
        .resolve_session(&live.session_key, now + 120_000)
        .unwrap()
        .is_some());
    assert_eq!(service.purge_expired_sessions(now + 120_000).unwrap(), 0);
}

#[test]
fn staff_listing_orders_by_full_name_then_username() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAccountRepository::new(&conn);
    let hash = hash_password("tangerine-orbit-42").unwrap();
    for (username, full_name, is_staff) in [
        ("zed", "Alex Stone", true),
        ("amy", "Alex Stone", true),
        ("bob", "Bea Park", true),
        ("member", "Aaron Member", false),
    ] {
        repo.create_account(&NewAccount {
            username: username.to_string(),
            password_hash: hash.clone(),
            full_name: full_name.to_string(),
            is_staff,
            ..NewAccount::default()
        })
        .unwrap();
    }

    let usernames: Vec<String> = repo
        .list_staff()
        .unwrap()
        .into_iter()
        .map(|account| account.username)
        .collect();
    assert_eq!(usernames, vec!["amy", "zed", "bob"]);
}
