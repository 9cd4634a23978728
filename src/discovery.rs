//! Account discovery and journal linking.
//!
//! Discovery fetches the remote account list for a connection and matches
//! each account to a local ledger journal by canonicalized account-number
//! identity. Unmatched accounts never fail discovery; they are surfaced as
//! pending links.

use std::collections::HashMap;

use metrics::counter;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bank::client::BankClient;
use crate::error::ApiError;
use crate::models::journal;

/// A remote bank account as seen during discovery. Transient: not persisted
/// beyond the linking step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    /// Canonical IBAN
    pub iban: String,
    pub currency: String,
    pub label: String,
    pub balance: Option<Decimal>,
}

/// Canonical form used for account matching: uppercased with all whitespace
/// stripped. Leading zeros are preserved; IBANs are fixed-format and
/// stripping zeros would change identity.
pub fn canonical_account_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Fetch the remote accounts visible to this connection's credentials.
pub async fn discover(client: &BankClient, token: &str) -> Result<Vec<RemoteAccount>, ApiError> {
    let records = client.list_accounts(token).await?;

    let mut accounts = Vec::with_capacity(records.len());
    for record in records {
        let Some(iban) = record
            .iban_ac_no
            .as_deref()
            .map(canonical_account_number)
            .filter(|iban| !iban.is_empty())
        else {
            warn!("Skipping remote account without an account number");
            continue;
        };

        let currency = record.ccy.unwrap_or_default();
        let description = record.ac_desc.unwrap_or_else(|| "Account".to_string());
        accounts.push(RemoteAccount {
            label: format!("{description} ({iban}) - {currency}"),
            iban,
            currency,
            balance: record.curr_amt,
        });
    }

    info!(count = accounts.len(), "Fetched remote accounts");
    Ok(accounts)
}

/// Result of matching remote accounts against local journals.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    /// Matched accounts with the journal they link to
    pub matched: Vec<(RemoteAccount, Uuid)>,
    /// Accounts with no local journal; reported, never fatal
    pub pending: Vec<RemoteAccount>,
}

/// Match remote accounts to journals by canonical account-number equality.
///
/// When several journals share a canonical account number the earliest by
/// `created_at` (then lowest id) wins; the ambiguity is logged.
pub fn plan_links(accounts: Vec<RemoteAccount>, journals: &[journal::Model]) -> LinkPlan {
    let mut candidates: HashMap<String, Vec<&journal::Model>> = HashMap::new();
    for journal in journals {
        candidates
            .entry(canonical_account_number(&journal.account_number))
            .or_default()
            .push(journal);
    }
    for bucket in candidates.values_mut() {
        bucket.sort_by_key(|journal| (journal.created_at, journal.id));
    }

    let mut matched = Vec::new();
    let mut pending = Vec::new();

    for account in accounts {
        match candidates.get(&account.iban) {
            Some(bucket) => {
                if bucket.len() > 1 {
                    warn!(
                        iban = %account.iban,
                        candidates = bucket.len(),
                        "Multiple journals share this account number, linking the earliest"
                    );
                }
                matched.push((account, bucket[0].id));
            }
            None => {
                debug!(
                    iban = %account.iban,
                    "No journal matches remote account, leaving pending"
                );
                pending.push(account);
            }
        }
    }

    counter!("bank_accounts_linked_total").increment(matched.len() as u64);
    counter!("bank_accounts_pending_total").increment(pending.len() as u64);

    LinkPlan { matched, pending }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn account(iban: &str) -> RemoteAccount {
        RemoteAccount {
            iban: canonical_account_number(iban),
            currency: "AZN".to_string(),
            label: format!("Test ({iban}) - AZN"),
            balance: None,
        }
    }

    fn journal(account_number: &str, created_year: i32) -> journal::Model {
        journal::Model {
            id: Uuid::new_v4(),
            name: format!("Journal {account_number}"),
            account_number: account_number.to_string(),
            currency: "AZN".to_string(),
            created_at: Utc
                .with_ymd_and_hms(created_year, 1, 1, 0, 0, 0)
                .unwrap()
                .into(),
            updated_at: Utc
                .with_ymd_and_hms(created_year, 1, 1, 0, 0, 0)
                .unwrap()
                .into(),
        }
    }

    #[test]
    fn canonicalization_uppercases_and_strips_whitespace() {
        assert_eq!(
            canonical_account_number(" az21 nabz 0000 0000 1370 1000 1944 "),
            "AZ21NABZ00000000137010001944"
        );
        // Leading zeros survive.
        assert_eq!(canonical_account_number("0012345"), "0012345");
    }

    #[test]
    fn two_of_three_accounts_match_and_one_stays_pending() {
        let journals = vec![
            journal("AZ21NABZ00000000137010001944", 2023),
            journal("AZ96AZEJ00000000001234567890", 2024),
        ];

        let plan = plan_links(
            vec![
                account("AZ21NABZ00000000137010001944"),
                account("az96azej 0000 0000 0012 3456 7890"),
                account("AZ77PAHA00000000009999999999"),
            ],
            &journals,
        );

        assert_eq!(plan.matched.len(), 2);
        assert_eq!(plan.pending.len(), 1);
        assert_eq!(plan.pending[0].iban, "AZ77PAHA00000000009999999999");
    }

    #[test]
    fn duplicate_account_numbers_link_to_the_earliest_journal() {
        let older = journal("AZ21NABZ00000000137010001944", 2020);
        let newer = journal("az21 nabz 0000 0000 1370 1000 1944", 2024);
        let expected = older.id;

        let plan = plan_links(
            vec![account("AZ21NABZ00000000137010001944")],
            &[newer, older],
        );

        assert_eq!(plan.matched.len(), 1);
        assert_eq!(plan.matched[0].1, expected);
    }
}
