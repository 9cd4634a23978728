//! Sync Orchestrator
//!
//! Drives one synchronization pass per connection: acquire the
//! per-connection gate, get a valid token, run discovery once per
//! connection lifetime, fetch and store new transactions per linked
//! journal, advance the watermark, and route failures to the notification
//! collaborator. Retry policy for transient failures lives here, not in
//! the transport layer.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::bank::{BankClient, BankEnvironment, HeaderProvider, TokenManager};
use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::discovery;
use crate::error::{ApiError, SyncError};
use crate::fetcher::{FetchStats, FetchWindow, TransactionFetcher};
use crate::ledger::LedgerStore;
use crate::models::connection::{self, ConnectionStatus};
use crate::notify::Notifier;
use crate::repositories::connection::ConnectionRepository;

/// Outcome of one successful synchronization pass.
#[derive(Debug, Default, Clone)]
pub struct SyncOutcome {
    pub stats: FetchStats,
    /// Journal links created by this pass (zero after the first pass)
    pub linked: usize,
    /// Remote accounts still awaiting a manual link
    pub pending: usize,
}

/// Per-connection mutual exclusion for sync passes.
///
/// Passes for different connections run independently; a second concurrent
/// trigger for the same connection is rejected, never interleaved.
#[derive(Debug, Default, Clone)]
pub struct SyncGate {
    running: Arc<StdMutex<HashSet<Uuid>>>,
}

impl SyncGate {
    fn try_acquire(&self, connection_id: Uuid) -> Result<SyncPermit, SyncError> {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if !running.insert(connection_id) {
            return Err(SyncError::AlreadyRunning(connection_id));
        }
        Ok(SyncPermit {
            gate: self.clone(),
            connection_id,
        })
    }
}

/// Releases the gate entry when the pass ends, however it ends.
struct SyncPermit {
    gate: SyncGate,
    connection_id: Uuid,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        let mut running = self.gate.running.lock().unwrap_or_else(|p| p.into_inner());
        running.remove(&self.connection_id);
    }
}

/// Per-connection API session: the transport client plus the token cache
/// that survives across passes.
struct Session {
    client: BankClient,
    tokens: TokenManager,
}

/// Sync executor running synchronization passes for connections.
pub struct SyncExecutor {
    config: Arc<AppConfig>,
    connections: ConnectionRepository,
    ledger: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
    gate: SyncGate,
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
}

impl SyncExecutor {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        crypto_key: CryptoKey,
        ledger: Arc<dyn LedgerStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            connections: ConnectionRepository::new(db, crypto_key),
            config,
            ledger,
            notifier,
            gate: SyncGate::default(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Access to the connection repository sharing this executor's pool.
    pub fn connections(&self) -> &ConnectionRepository {
        &self.connections
    }

    /// The single sync entry point, invoked by the scheduler and by manual
    /// triggers alike. Safe to call at any time; an overlapping trigger for
    /// the same connection is rejected by the gate.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn run_sync(&self, connection_id: Uuid) -> Result<SyncOutcome, SyncError> {
        self.run(connection_id, None, false).await
    }

    /// Targeted pass restricted to a single linked journal.
    #[instrument(skip(self), fields(connection_id = %connection_id, journal_id = %journal_id))]
    pub async fn run_sync_for_journal(
        &self,
        connection_id: Uuid,
        journal_id: Uuid,
    ) -> Result<SyncOutcome, SyncError> {
        self.run(connection_id, Some(journal_id), false).await
    }

    /// Manual reconnect: re-login, re-discover accounts, then sync.
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub async fn reconnect(&self, connection_id: Uuid) -> Result<SyncOutcome, SyncError> {
        self.run(connection_id, None, true).await
    }

    async fn run(
        &self,
        connection_id: Uuid,
        target_journal: Option<Uuid>,
        rediscover: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let _permit = self.gate.try_acquire(connection_id)?;
        let started = std::time::Instant::now();

        let connection = self
            .connections
            .get(&connection_id)
            .await
            .map_err(SyncError::Storage)?
            .ok_or(SyncError::ConnectionNotFound(connection_id))?;

        info!(
            username = %connection.username,
            environment = %connection.environment,
            status = %connection.status,
            "Starting sync pass"
        );
        counter!("bank_sync_passes_total").increment(1);

        let result = self
            .run_pass(&connection, target_journal, rediscover)
            .await;

        let elapsed = started.elapsed();
        histogram!("bank_sync_pass_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);

        match result {
            Ok(outcome) => {
                self.connections
                    .mark_connected(&connection_id)
                    .await
                    .map_err(SyncError::Storage)?;
                info!(
                    imported = outcome.stats.imported,
                    duplicates = outcome.stats.duplicates,
                    parse_failures = outcome.stats.parse_failures,
                    linked = outcome.linked,
                    pending = outcome.pending,
                    duration_ms = elapsed.as_millis() as u64,
                    "Sync pass succeeded"
                );
                Ok(outcome)
            }
            Err(err) => {
                counter!("bank_sync_failures_total").increment(1);
                let message = err.to_string();

                // The watermark stays untouched so the next attempt retries
                // the same window; trn_ref_no dedup absorbs the overlap.
                if let Err(update_err) = self.connections.mark_error(&connection_id, &message).await
                {
                    warn!(error = ?update_err, "Failed to record error status");
                }
                if let Err(notify_err) = self.notifier.sync_failed(&connection, &message).await {
                    warn!(error = ?notify_err, "Failed to emit sync failure alert");
                }

                Err(err)
            }
        }
    }

    async fn run_pass(
        &self,
        connection: &connection::Model,
        target_journal: Option<Uuid>,
        rediscover: bool,
    ) -> Result<SyncOutcome, SyncError> {
        if connection.lifecycle_status() == ConnectionStatus::Draft {
            self.connections
                .set_status(&connection.id, ConnectionStatus::Connecting)
                .await
                .map_err(SyncError::Storage)?;
        }

        let secret = self.connections.decrypt_secret(connection)?;
        let username = connection.username.clone();
        let session = self.session(connection).await?;

        let mut outcome = SyncOutcome::default();

        // Discovery runs once per connection lifetime, or again on an
        // explicit reconnect.
        if rediscover || connection.discovered_at.is_none() {
            let accounts = self
                .with_retry(&session, "discover-accounts", || {
                    let session = session.clone();
                    let username = username.clone();
                    let secret = secret.clone();
                    async move {
                        let token = session
                            .tokens
                            .get_valid_token(&session.client, &username, &secret)
                            .await?;
                        Ok(discovery::discover(&session.client, &token).await?)
                    }
                })
                .await?;

            let journals = self.ledger.journals().await.map_err(SyncError::Storage)?;
            let plan = discovery::plan_links(accounts, &journals);
            outcome.pending = plan.pending.len();

            for (account, journal_id) in &plan.matched {
                self.ledger
                    .record_link(&connection.id, &account.iban, journal_id, account.balance)
                    .await
                    .map_err(SyncError::Storage)?;
                outcome.linked += 1;
            }

            self.connections
                .set_discovered(&connection.id)
                .await
                .map_err(SyncError::Storage)?;
            info!(
                linked = outcome.linked,
                pending = outcome.pending,
                "Account discovery completed"
            );
        }

        let mut links = self
            .ledger
            .links_for(&connection.id)
            .await
            .map_err(SyncError::Storage)?;
        if let Some(journal_id) = target_journal {
            links.retain(|link| link.journal_id == journal_id);
        }
        if links.is_empty() {
            warn!("No linked journals to sync");
        }

        // The fetch window starts at the watermark and tolerates overlap;
        // dedup guarantees at-most-once import.
        let window = FetchWindow {
            from: connection
                .last_success_at
                .map(|ts| ts.date_naive())
                .unwrap_or(connection.sync_history_from),
            to: Utc::now().date_naive(),
        };

        for link in &links {
            let stats = self
                .with_retry(&session, "fetch-statement", || {
                    let session = session.clone();
                    let username = username.clone();
                    let secret = secret.clone();
                    let link = link.clone();
                    let ledger = self.ledger.clone();
                    let history_floor = connection.sync_history_from;
                    async move {
                        let token = session
                            .tokens
                            .get_valid_token(&session.client, &username, &secret)
                            .await?;
                        let fetcher = TransactionFetcher::new(&session.client, ledger.as_ref());
                        fetcher
                            .fetch_into_journal(&token, &link, window, history_floor)
                            .await
                    }
                })
                .await?;
            outcome.stats.absorb(stats);
        }

        // Advance only after every batch of the pass is durably stored.
        if let Some(latest) = outcome.stats.latest_date {
            self.connections
                .advance_watermark(&connection.id, latest)
                .await
                .map_err(SyncError::Storage)?;
        }

        Ok(outcome)
    }

    /// Look up or build the per-connection session. The token cache inside
    /// it survives across passes, so two fetches less than the token ttl
    /// apart share a single login.
    async fn session(&self, connection: &connection::Model) -> Result<Arc<Session>, SyncError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&connection.id) {
            return Ok(session.clone());
        }

        let environment = BankEnvironment::parse(&connection.environment)
            .ok_or_else(|| SyncError::UnknownEnvironment(connection.environment.clone()))?;
        let base = match environment {
            BankEnvironment::Production => &self.config.api_base_production,
            BankEnvironment::Sandbox => &self.config.api_base_sandbox,
        };
        let base_url =
            Url::parse(base).map_err(|_| SyncError::InvalidBaseUrl(base.clone()))?;

        let client = BankClient::new(
            base_url,
            Arc::new(HeaderProvider::new()),
            StdDuration::from_secs(self.config.http_timeout_seconds),
        )?;
        let session = Arc::new(Session {
            client,
            tokens: TokenManager::new(Duration::minutes(self.config.token_ttl_minutes)),
        });
        sessions.insert(connection.id, session.clone());
        Ok(session)
    }

    /// Retry policy around one bank operation. Transient failures
    /// (forbidden, server, network) get bounded exponential backoff, and a
    /// 403 additionally rotates the browser header profile before the
    /// retry. An authentication rejection gets exactly one forced token
    /// refresh; a second rejection fails the pass immediately.
    async fn with_retry<T, F, Fut>(
        &self,
        session: &Session,
        label: &str,
        mut op: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let policy = &self.config.retry;
        let mut auth_refreshed = false;
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(SyncError::Api(ApiError::Auth(message))) => {
                    if auth_refreshed {
                        // Retrying with the same bad credential risks lockout.
                        return Err(SyncError::Api(ApiError::Auth(message)));
                    }
                    auth_refreshed = true;
                    warn!(
                        operation = label,
                        "Authentication rejected, forcing one token refresh"
                    );
                    session.tokens.invalidate().await;
                }
                Err(SyncError::Api(err)) if err.is_transient() && attempt < policy.max_attempts => {
                    attempt += 1;
                    if matches!(err, ApiError::Forbidden(_)) {
                        session.client.rotate_headers();
                    }
                    let delay = policy.backoff_delay(attempt);
                    counter!("bank_sync_retries_total").increment(1);
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, backing off before retry"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
