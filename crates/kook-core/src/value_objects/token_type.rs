//! Credential type used in the `Authorization` header

use serde::{Deserialize, Serialize};

/// Kind of token the client authenticates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// OAuth2 token
    Bearer,
    /// Bot token
    #[default]
    Bot,
}

impl TokenType {
    /// Prefix placed before the token in the `Authorization` header
    #[must_use]
    pub const fn header_prefix(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Bot => "Bot",
        }
    }

    /// Build the full header value for a token
    #[must_use]
    pub fn authorization(self, token: &str) -> String {
        format!("{} {}", self.header_prefix(), token)
    }
}
