//! Wire types for the bank's B2B API.
//!
//! Every payload is wrapped in a `responseData` envelope; application-level
//! failures can ride inside a 2xx as an `exception` object.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Standard response envelope around every payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub response_data: Option<T>,
    pub exception: Option<ApiException>,
}

/// Application-level error body documented by the bank.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiException {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl std::fmt::Display for ApiException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => write!(f, "{code}"),
            (None, Some(message)) => write!(f, "{message}"),
            (None, None) => write!(f, "unspecified API exception"),
        }
    }
}

/// Payload of `POST /login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub jwttoken: String,
    /// Server-declared token lifetime in seconds, when present
    pub expires_in: Option<i64>,
}

/// Payload of `GET /accounts`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsData {
    #[serde(default)]
    pub accounts_list: Vec<AccountRecord>,
}

/// One account as reported by the bank.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub iban_ac_no: Option<String>,
    pub ccy: Option<String>,
    pub ac_desc: Option<String>,
    pub curr_amt: Option<Decimal>,
}

/// Payload of `GET /v2/statement/account`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementData {
    pub operations: Operations,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operations {
    #[serde(default)]
    pub statement_list: Vec<StatementRecord>,
    /// Absent on the last page
    pub has_next_page: Option<bool>,
}

/// One statement line as reported by the bank.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    pub trn_ref_no: String,
    /// Date string; format varies between deployments ("Dec 30, 2025" or
    /// "2025-12-30")
    pub trn_dt: Option<String>,
    pub lcy_amount: Decimal,
    pub ccy: Option<String>,
    pub purpose: Option<String>,
    pub contr_account: Option<String>,
}
