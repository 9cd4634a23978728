//! End-to-end tests for the synchronization engine against a mock bank.

mod test_utils;

use banksync::bank::BankEnvironment;
use banksync::error::{ApiError, SyncError};
use banksync::models::{alert, imported_transaction, journal_link};
use chrono::NaiveDate;
use sea_orm::EntityTrait;
use test_utils::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IBAN_MAIN: &str = "AZ21NABZ00000000137010001944";
const IBAN_SECOND: &str = "AZ96AZEJ00000000001234567890";
const IBAN_UNMATCHED: &str = "AZ77PAHA00000000009999999999";

fn history_floor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

#[tokio::test]
async fn first_pass_links_two_of_three_accounts_and_imports_transactions() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();
    insert_journal(&db, "Second AZN", IBAN_SECOND, "AZN")
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[
            (IBAN_MAIN, "AZN", "Operating"),
            (IBAN_SECOND, "AZN", "Payroll"),
            (IBAN_UNMATCHED, "USD", "Reserve"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .and(query_param("accountNumber", IBAN_MAIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![
            statement_record("AZ1", "Jun 3, 2025", "150.00"),
            statement_record("AZ2", "2025-06-04", "-42.50"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .and(query_param("accountNumber", IBAN_SECOND))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![
            statement_record("AZ3", "Jun 5, 2025", "900.00"),
        ])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let outcome = executor.run_sync(connection.id).await.unwrap();

    assert_eq!(outcome.linked, 2);
    assert_eq!(outcome.pending, 1);
    assert_eq!(outcome.stats.imported, 3);
    assert_eq!(outcome.stats.duplicates, 0);

    let links = journal_link::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(links.len(), 2);

    let rows = imported_transaction::Entity::find()
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);

    let refreshed = executor
        .connections()
        .get(&connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.status, "connected");
    assert!(refreshed.discovered_at.is_some());
    assert_eq!(refreshed.last_error, None);
    assert_eq!(
        refreshed.last_success_at.unwrap().date_naive(),
        NaiveDate::from_ymd_opt(2025, 6, 5).unwrap()
    );
}

#[tokio::test]
async fn duplicate_reference_within_a_page_is_imported_once() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();

    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[(
            IBAN_MAIN, "AZN", "Operating",
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![
            statement_record("AZ123", "Jun 3, 2025", "10.00"),
            statement_record("AZ123", "Jun 3, 2025", "10.00"),
            statement_record("AZ200", "Jun 4, 2025", "20.00"),
        ])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let outcome = executor.run_sync(connection.id).await.unwrap();
    assert_eq!(outcome.stats.imported, 2);
    assert_eq!(outcome.stats.duplicates, 1);

    let rows = imported_transaction::Entity::find()
        .all(db.as_ref())
        .await
        .unwrap();
    let mut refs: Vec<String> = rows.into_iter().map(|row| row.trn_ref_no).collect();
    refs.sort();
    assert_eq!(refs, vec!["AZ123".to_string(), "AZ200".to_string()]);
}

#[tokio::test]
async fn overlapping_rerun_is_idempotent_and_reuses_the_token() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();

    // Exactly one login across both passes: the cached token is still
    // inside its 50-minute window for the second pass.
    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[(
            IBAN_MAIN, "AZN", "Operating",
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![
            statement_record("AZ1", "Jun 3, 2025", "150.00"),
            statement_record("AZ2", "Jun 4, 2025", "-42.50"),
        ])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let first = executor.run_sync(connection.id).await.unwrap();
    assert_eq!(first.stats.imported, 2);

    // The second pass covers an overlapping window and must change nothing.
    let second = executor.run_sync(connection.id).await.unwrap();
    assert_eq!(second.stats.imported, 0);
    assert_eq!(second.stats.duplicates, 2);

    let rows = imported_transaction::Entity::find()
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    // Watermark stayed monotonic.
    let refreshed = executor
        .connections()
        .get(&connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        refreshed.last_success_at.unwrap().date_naive(),
        NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()
    );
}

#[tokio::test]
async fn forbidden_is_retried_with_a_rotated_header_profile() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();

    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .mount(&server)
        .await;

    // First accounts request is rejected by the firewall, the retry passes.
    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(403).set_body_string("blocked"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[(
            IBAN_MAIN, "AZN", "Operating",
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let outcome = executor.run_sync(connection.id).await.unwrap();
    assert_eq!(outcome.linked, 1);

    // The retry went out under a different browser profile.
    let requests = server.received_requests().await.unwrap();
    let user_agents: Vec<String> = requests
        .iter()
        .filter(|req| req.url.path() == "/api/b2b/accounts")
        .map(|req| {
            req.headers
                .get("user-agent")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(user_agents.len(), 2);
    assert_ne!(user_agents[0], user_agents[1]);
}

#[tokio::test]
async fn login_rejection_ends_in_error_with_one_alert_and_untouched_watermark() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();

    // Password changed on the bank side: every login attempt is rejected.
    // Exactly one forced refresh is allowed, so two attempts total.
    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(2)
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let err = executor.run_sync(connection.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Api(ApiError::Auth(_))));

    let refreshed = executor
        .connections()
        .get(&connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.status, "error");
    assert!(
        refreshed
            .last_error
            .as_deref()
            .unwrap()
            .contains("authentication rejected")
    );
    assert_eq!(refreshed.last_success_at, None);

    let alerts = alert::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].connection_id, connection.id);
    assert_eq!(alerts[0].severity, "high");
    assert_eq!(alerts[0].audience, "admin");
    assert_eq!(alerts[0].acknowledged_at, None);
    assert_eq!(Some(alerts[0].message.as_str()), refreshed.last_error.as_deref());
}

#[tokio::test]
async fn server_errors_exhaust_retries_then_fail_the_pass() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .mount(&server)
        .await;

    // Bank-side fault persists through every retry.
    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(4) // initial attempt + 3 retries
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let err = executor.run_sync(connection.id).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Api(ApiError::Server { status: 503, .. })
    ));

    let refreshed = executor
        .connections()
        .get(&connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.status, "error");

    let alerts = alert::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn transactions_before_the_history_floor_are_never_persisted() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();

    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[(
            IBAN_MAIN, "AZN", "Operating",
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![
            statement_record("OLD1", "May 20, 2025", "5.00"),
            statement_record("NEW1", "Jun 2, 2025", "7.00"),
            statement_record("BAD1", "30th of Dec", "9.00"),
        ])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
        )
        .await
        .unwrap();

    let outcome = executor.run_sync(connection.id).await.unwrap();
    assert_eq!(outcome.stats.imported, 1);
    assert_eq!(outcome.stats.below_floor, 1);
    assert_eq!(outcome.stats.parse_failures, 1);

    let rows = imported_transaction::Entity::find()
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].trn_ref_no, "NEW1");
}

#[tokio::test]
async fn concurrent_triggers_yield_exactly_one_active_pass() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();

    // Slow login keeps the winning pass inside the gate long enough for the
    // losing trigger to be rejected.
    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(login_body("tok-1"))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[(
            IBAN_MAIN, "AZN", "Operating",
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![
            statement_record("AZ1", "Jun 3, 2025", "150.00"),
        ])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        executor.run_sync(connection.id),
        executor.run_sync(connection.id)
    );

    let outcomes = [first, second];
    let successes = outcomes.iter().filter(|result| result.is_ok()).count();
    let rejections = outcomes
        .iter()
        .filter(|result| matches!(result, Err(SyncError::AlreadyRunning(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(rejections, 1);

    let rows = imported_transaction::Entity::find()
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn reconnect_rediscovers_newly_visible_accounts() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;

    insert_journal(&db, "Main AZN", IBAN_MAIN, "AZN").await.unwrap();
    insert_journal(&db, "Second AZN", IBAN_SECOND, "AZN")
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/b2b/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("tok-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[(
            IBAN_MAIN, "AZN", "Operating",
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![])))
        .mount(&server)
        .await;

    let executor = build_executor(db.clone(), test_config(&server.uri()));
    let connection = executor
        .connections()
        .create(
            BankEnvironment::Sandbox,
            "finance@acme",
            "hunter2",
            Some(history_floor()),
        )
        .await
        .unwrap();

    let first = executor.run_sync(connection.id).await.unwrap();
    assert_eq!(first.linked, 1);

    // The bank later exposes a second account; a plain sync pass will not
    // rediscover, a reconnect will.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/b2b/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(accounts_body(&[
            (IBAN_MAIN, "AZN", "Operating"),
            (IBAN_SECOND, "AZN", "Payroll"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/b2b/v2/statement/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(statement_body(vec![])))
        .mount(&server)
        .await;

    let reconnected = executor.reconnect(connection.id).await.unwrap();
    assert_eq!(reconnected.linked, 2);

    let links = journal_link::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(links.len(), 2);
}
