use victoweb_core::db::open_db_in_memory;
use victoweb_core::model::account::{AdminRole, NewAccount};
use victoweb_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use victoweb_core::service::account_service::AccountService;
use victoweb_core::service::admin_seed::{
    create_admin_batch, seed_named_admins, AdminBatchOptions, NamedAdminOptions, SeedError,
    PROVIDED_PASSWORD_LABEL,
};

#[test]
fn batch_creates_padded_staff_superusers_and_skips_existing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAccountRepository::new(&conn);
    repo.create_account(&NewAccount {
        username: "ops02".to_string(),
        password_hash: "unused".to_string(),
        ..NewAccount::default()
    })
    .unwrap();

    let report = create_admin_batch(
        &repo,
        &AdminBatchOptions {
            count: 3,
            prefix: " ops ".to_string(),
            domain: "example.org".to_string(),
            ..AdminBatchOptions::default()
        },
    )
    .unwrap();

    let created: Vec<&str> = report
        .created
        .iter()
        .map(|entry| entry.username.as_str())
        .collect();
    assert_eq!(created, vec!["ops01", "ops03"]);
    assert_eq!(report.skipped, vec!["ops02"]);
    assert!(report
        .created
        .iter()
        .all(|entry| entry.password_display.chars().count() == 14));

    let account = repo.find_by_username("ops03").unwrap().unwrap();
    assert!(account.is_staff);
    assert!(account.is_superuser);
    assert_eq!(account.email, "ops03@example.org");
    assert_eq!(account.full_name, "Admin 03");

    let service = AccountService::new(SqliteAccountRepository::new(&conn));
    let password = &report.created[0].password_display;
    assert!(service.authenticate("ops01", password).is_ok());
}

#[test]
fn batch_padding_grows_with_count_and_dry_run_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAccountRepository::new(&conn);

    let report = create_admin_batch(
        &repo,
        &AdminBatchOptions {
            count: 120,
            password: Some("shared-secret-77".to_string()),
            dry_run: true,
            ..AdminBatchOptions::default()
        },
    )
    .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.created.len(), 120);
    assert_eq!(report.created[0].username, "admin001");
    assert_eq!(report.created[119].username, "admin120");
    assert_eq!(report.created[0].password_display, PROVIDED_PASSWORD_LABEL);
    assert!(repo.find_by_username("admin001").unwrap().is_none());
}

#[test]
fn batch_rejects_invalid_options() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAccountRepository::new(&conn);

    for (options, expected) in [
        (
            AdminBatchOptions {
                count: 0,
                ..AdminBatchOptions::default()
            },
            "count",
        ),
        (
            AdminBatchOptions {
                prefix: "  ".to_string(),
                ..AdminBatchOptions::default()
            },
            "prefix",
        ),
        (
            AdminBatchOptions {
                domain: String::new(),
                ..AdminBatchOptions::default()
            },
            "domain",
        ),
    ] {
        match create_admin_batch(&repo, &options) {
            Err(SeedError::InvalidOption { option, .. }) => assert_eq!(option, expected),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

#[test]
fn named_admins_are_created_then_refreshed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAccountRepository::new(&conn);

    let first = seed_named_admins(&repo, &NamedAdminOptions::default()).unwrap();
    assert_eq!(first.created.len(), 12);
    assert_eq!(first.credentials.len(), 12);
    assert!(first
        .credentials
        .iter()
        .all(|entry| entry.password_display.chars().count() == 16));

    let president = repo.find_by_username("union_president").unwrap().unwrap();
    assert!(president.can_publish_tasks());
    let media = repo.find_by_username("media_admin_02").unwrap().unwrap();
    assert_eq!(media.admin_role, AdminRole::MediaAdmin);
    assert!(media.can_publish_media());
    let lead = repo.find_by_username("art_lead").unwrap().unwrap();
    assert_eq!(lead.full_name, "Art Committee Lead");
    assert_eq!(lead.email, "art_lead@vc29.local");

    let second = seed_named_admins(&repo, &NamedAdminOptions::default()).unwrap();
    assert!(second.created.is_empty());
    assert!(second.updated.is_empty());
    assert_eq!(second.skipped.len(), 12);

    let mut drifted = lead.clone();
    drifted.is_staff = false;
    drifted.full_name = "Someone".to_string();
    repo.update_account(&drifted).unwrap();

    let preview = seed_named_admins(
        &repo,
        &NamedAdminOptions {
            dry_run: true,
            ..NamedAdminOptions::default()
        },
    )
    .unwrap();
    assert_eq!(preview.updated, vec!["art_lead"]);
    assert!(!repo.find_by_username("art_lead").unwrap().unwrap().is_staff);

    let refreshed = seed_named_admins(
        &repo,
        &NamedAdminOptions {
            password: Some("rotated-secret-88".to_string()),
            ..NamedAdminOptions::default()
        },
    )
    .unwrap();
    assert_eq!(refreshed.updated.len(), 12);
    let lead = repo.find_by_username("art_lead").unwrap().unwrap();
    assert!(lead.is_staff);
    assert_eq!(lead.full_name, "Art Committee Lead");

    let service = AccountService::new(SqliteAccountRepository::new(&conn));
    assert!(service.authenticate("dev_admin", "rotated-secret-88").is_ok());
}
