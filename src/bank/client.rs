//! Transport adapter for the bank's B2B API.
//!
//! One client per connection, bound to a base endpoint and a header
//! provider. This layer only classifies outcomes ([`ApiError`]); retry
//! policy belongs to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::bank::headers::HeaderProvider;
use crate::bank::types::{AccountRecord, AccountsData, Envelope, LoginData, StatementData};
use crate::error::ApiError;

pub use crate::bank::types::StatementRecord;

/// Maximum characters of an upstream error body carried into error messages.
const BODY_SNIPPET_LEN: usize = 200;

/// Query/body date format expected by the statement endpoint.
const REQUEST_DATE_FORMAT: &str = "%d-%m-%Y";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub token: String,
    /// Server-declared lifetime in seconds, when the bank sends one
    pub expires_in: Option<i64>,
}

/// One page of statement records.
#[derive(Debug, Clone)]
pub struct StatementPage {
    pub records: Vec<StatementRecord>,
    pub has_more: bool,
}

/// HTTP client for one bank endpoint.
#[derive(Debug, Clone)]
pub struct BankClient {
    http: reqwest::Client,
    base_url: Url,
    headers: Arc<HeaderProvider>,
}

impl BankClient {
    /// Build a client against the given base endpoint.
    pub fn new(
        base_url: Url,
        headers: Arc<HeaderProvider>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            headers,
        })
    }

    /// Switch to the next browser profile (used after a 403).
    pub fn rotate_headers(&self) {
        let set = self.headers.rotate();
        debug!(user_agent = set.user_agent, "Rotated browser header profile");
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, username: &str, secret: &str) -> Result<TokenGrant, ApiError> {
        let url = self.endpoint(&["login"])?;
        let response = self
            .headers
            .decorate(self.http.post(url))
            .json(&serde_json::json!({ "username": username, "password": secret }))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let data: LoginData = Self::read_envelope(response).await?;
        Ok(TokenGrant {
            token: data.jwttoken,
            expires_in: data.expires_in,
        })
    }

    /// List the remote accounts visible to this credential pair.
    pub async fn list_accounts(&self, token: &str) -> Result<Vec<AccountRecord>, ApiError> {
        let url = self.endpoint(&["accounts"])?;
        let response = self
            .headers
            .decorate(self.http.get(url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let data: AccountsData = Self::read_envelope(response).await?;
        Ok(data.accounts_list)
    }

    /// Fetch one page of the account statement for a date window.
    pub async fn statement_page(
        &self,
        token: &str,
        account_number: &str,
        from: NaiveDate,
        to: NaiveDate,
        page_no: u32,
    ) -> Result<StatementPage, ApiError> {
        let mut url = self.endpoint(&["v2", "statement", "account"])?;
        url.query_pairs_mut()
            .append_pair("accountNumber", account_number)
            .append_pair("fromDate", &from.format(REQUEST_DATE_FORMAT).to_string())
            .append_pair("toDate", &to.format(REQUEST_DATE_FORMAT).to_string())
            .append_pair("pageNo", &page_no.to_string());

        let response = self
            .headers
            .decorate(self.http.get(url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let data: StatementData = Self::read_envelope(response).await?;
        Ok(StatementPage {
            has_more: data.operations.has_next_page.unwrap_or(false),
            records: data.operations.statement_list,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        // Url::join would replace the base path (/api/b2b), so extend the
        // path segments instead.
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("base url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Classify the response and unwrap the `responseData` envelope.
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Auth(Self::body_snippet(response).await));
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Forbidden(Self::body_snippet(response).await));
        }
        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: Self::body_snippet(response).await,
            });
        }

        let envelope: Envelope<T> = response.json().await.map_err(ApiError::from_reqwest)?;

        if let Some(exception) = envelope.exception {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: exception.to_string(),
            });
        }

        envelope
            .response_data
            .ok_or_else(|| ApiError::Decode("missing responseData in bank response".to_string()))
    }

    async fn body_snippet(response: reqwest::Response) -> String {
        let body = response.text().await.unwrap_or_default();
        if body.chars().count() > BODY_SNIPPET_LEN {
            let truncated: String = body.chars().take(BODY_SNIPPET_LEN).collect();
            format!("{truncated}...")
        } else if body.is_empty() {
            "no response body".to_string()
        } else {
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BankClient {
        let base = Url::parse(&format!("{}/api/b2b", server.uri())).unwrap();
        BankClient::new(
            base,
            Arc::new(HeaderProvider::new()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn login_sends_browser_headers_and_unwraps_the_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/b2b/login"))
            .and(header_exists("user-agent"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseData": { "jwttoken": "tok-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server).login("user", "pass").await.unwrap();
        assert_eq!(grant.token, "tok-1");
        assert_eq!(grant.expires_in, None);
    }

    #[tokio::test]
    async fn statuses_classify_into_the_error_taxonomy() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/b2b/accounts"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).list_accounts("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));

        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/api/b2b/accounts"))
            .respond_with(ResponseTemplate::new(403).set_body_string("blocked by WAF"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).list_accounts("tok").await.unwrap_err();
        match err {
            ApiError::Forbidden(message) => assert!(message.contains("blocked by WAF")),
            other => panic!("expected Forbidden, got {other:?}"),
        }

        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/api/b2b/accounts"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).list_accounts("tok").await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn api_exception_inside_a_2xx_is_a_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/b2b/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "exception": { "code": "ACC-3", "message": "account service offline" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).list_accounts("tok").await.unwrap_err();
        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 200);
                assert!(message.contains("account service offline"));
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn statement_request_carries_window_and_page_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/b2b/v2/statement/account"))
            .and(query_param("accountNumber", "AZ21NABZ00000000137010001944"))
            .and(query_param("fromDate", "01-01-2025"))
            .and(query_param("toDate", "31-01-2025"))
            .and(query_param("pageNo", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responseData": { "operations": { "statementList": [], "hasNextPage": false } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .statement_page(
                "tok",
                "AZ21NABZ00000000137010001944",
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                1,
            )
            .await
            .unwrap();

        assert!(page.records.is_empty());
        assert!(!page.has_more);
    }
}
