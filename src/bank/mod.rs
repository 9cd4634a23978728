//! Client for the bank's B2B API.
//!
//! The transport adapter ([`client::BankClient`]) classifies every response;
//! the token manager ([`token::TokenManager`]) owns the cached bearer token
//! for one connection; [`headers::HeaderProvider`] supplies the rotating
//! browser identification header sets.

pub mod client;
pub mod headers;
pub mod token;
pub mod types;

pub use client::{BankClient, StatementPage, TokenGrant};
pub use headers::HeaderProvider;
pub use token::TokenManager;

/// Bank environment a connection is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankEnvironment {
    Production,
    Sandbox,
}

impl BankEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankEnvironment::Production => "production",
            BankEnvironment::Sandbox => "sandbox",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "production" => Some(BankEnvironment::Production),
            "sandbox" => Some(BankEnvironment::Sandbox),
            _ => None,
        }
    }
}

impl std::fmt::Display for BankEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!(
            BankEnvironment::parse("production"),
            Some(BankEnvironment::Production)
        );
        assert_eq!(
            BankEnvironment::parse("sandbox"),
            Some(BankEnvironment::Sandbox)
        );
        assert_eq!(BankEnvironment::parse("live"), None);
    }
}
