//! Transaction fetching and deduplication.
//!
//! Pages through the statement window for one linked journal and screens
//! every record: date parsing via an ordered strategy list, the history
//! floor, then the two-level duplicate check (in-memory batch set plus a
//! ledger existence check). Skips are counted, never fatal; the storage
//! unique constraint remains as the final backstop.

use std::collections::HashSet;

use chrono::NaiveDate;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bank::client::{BankClient, StatementRecord};
use crate::error::SyncError;
use crate::ledger::{LedgerStore, NewTransaction};
use crate::models::journal_link;

/// Ordered date-parse strategies: "Dec 30, 2025" style first, ISO fallback.
const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%Y-%m-%d"];

/// A statement date no strategy could parse. Absorbed per-record.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unparseable statement date '{0}'")]
pub struct DateParseError(pub String);

/// Try every strategy in order until one succeeds.
pub fn parse_statement_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    Err(DateParseError(raw.to_string()))
}

/// Per-journal fetch outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Rows durably written to the ledger
    pub imported: usize,
    /// Records skipped because their reference was already known
    pub duplicates: usize,
    /// Records skipped because no date strategy matched
    pub parse_failures: usize,
    /// Records excluded by the history floor (policy, not an error)
    pub below_floor: usize,
    /// Latest booking date among durably stored rows
    pub latest_date: Option<NaiveDate>,
}

impl FetchStats {
    /// Fold another journal's outcome into this one.
    pub fn absorb(&mut self, other: FetchStats) {
        self.imported += other.imported;
        self.duplicates += other.duplicates;
        self.parse_failures += other.parse_failures;
        self.below_floor += other.below_floor;
        self.latest_date = self.latest_date.max(other.latest_date);
    }
}

/// Inclusive date window to request from the bank.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Fetches and deduplicates statement records for linked journals.
pub struct TransactionFetcher<'a> {
    client: &'a BankClient,
    ledger: &'a dyn LedgerStore,
}

impl<'a> TransactionFetcher<'a> {
    pub fn new(client: &'a BankClient, ledger: &'a dyn LedgerStore) -> Self {
        Self { client, ledger }
    }

    /// Page through the window for one linked journal, storing new
    /// transactions as each page is screened. Pages are requested until the
    /// API signals no more pages or a page comes back empty. The whole loop
    /// is restartable: re-running it over the same window changes nothing.
    pub async fn fetch_into_journal(
        &self,
        token: &str,
        link: &journal_link::Model,
        window: FetchWindow,
        history_floor: NaiveDate,
    ) -> Result<FetchStats, SyncError> {
        let mut stats = FetchStats::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page_no: u32 = 1;

        loop {
            let page = self
                .client
                .statement_page(token, &link.iban, window.from, window.to, page_no)
                .await?;

            if page.records.is_empty() {
                break;
            }

            let mut batch: Vec<NewTransaction> = Vec::new();
            for record in &page.records {
                if let Some(tx) = self
                    .screen_record(record, link, history_floor, &mut seen, &mut stats)
                    .await?
                {
                    batch.push(tx);
                }
            }

            if !batch.is_empty() {
                let inserted = self.ledger.insert_transactions(&batch).await?;
                // Anything the storage constraint rejected was imported by an
                // earlier pass.
                stats.duplicates += batch.len() - inserted;
                stats.imported += inserted;
                if inserted > 0 {
                    stats.latest_date = stats
                        .latest_date
                        .max(batch.iter().map(|tx| tx.booked_on).max());
                }
            }

            if !page.has_more {
                break;
            }
            page_no += 1;
        }

        counter!("bank_transactions_imported_total").increment(stats.imported as u64);
        counter!("bank_transactions_duplicate_total").increment(stats.duplicates as u64);
        counter!("bank_transactions_parse_failure_total").increment(stats.parse_failures as u64);

        debug!(
            iban = %link.iban,
            imported = stats.imported,
            duplicates = stats.duplicates,
            parse_failures = stats.parse_failures,
            below_floor = stats.below_floor,
            "Journal fetch completed"
        );

        Ok(stats)
    }

    async fn screen_record(
        &self,
        record: &StatementRecord,
        link: &journal_link::Model,
        history_floor: NaiveDate,
        seen: &mut HashSet<String>,
        stats: &mut FetchStats,
    ) -> Result<Option<NewTransaction>, SyncError> {
        let raw_date = record.trn_dt.as_deref().unwrap_or("");
        let booked_on = match parse_statement_date(raw_date) {
            Ok(date) => date,
            Err(err) => {
                stats.parse_failures += 1;
                warn!(
                    trn_ref_no = %record.trn_ref_no,
                    %err,
                    "Skipping statement line with unparseable date"
                );
                return Ok(None);
            }
        };

        if booked_on < history_floor {
            stats.below_floor += 1;
            return Ok(None);
        }

        if !seen.insert(record.trn_ref_no.clone()) {
            stats.duplicates += 1;
            return Ok(None);
        }

        if self.ledger.transaction_exists(&record.trn_ref_no).await? {
            stats.duplicates += 1;
            return Ok(None);
        }

        Ok(Some(NewTransaction {
            trn_ref_no: record.trn_ref_no.clone(),
            journal_id: link.journal_id,
            booked_on,
            amount: record.lcy_amount,
            currency: record.ccy.clone().unwrap_or_default(),
            description: record
                .purpose
                .clone()
                .unwrap_or_else(|| record.trn_ref_no.clone()),
            counterparty: record.contr_account.clone(),
        }))
    }
}
