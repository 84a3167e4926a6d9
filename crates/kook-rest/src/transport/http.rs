//! `reqwest`-backed transport

use async_trait::async_trait;
use kook_common::{AuthConfig, RestConfig};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;

use super::{RestResponse, RestTransport};
use crate::error::RestError;
use crate::queue::RestRequest;

/// Transport that talks to the real API over HTTPS
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a client with the authorization header preset
    pub fn new(auth: &AuthConfig, rest: &RestConfig) -> Result<Self, RestError> {
        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(&auth.authorization())
            .map_err(|e| RestError::Transport(format!("invalid token header: {e}")))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = Client::builder()
            .user_agent(rest.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| RestError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: rest.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, RestError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.endpoint));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RestError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RestError::Transport(e.to_string()))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        tracing::trace!(
            method = %request.method,
            endpoint = %request.endpoint,
            status,
            "HTTP response"
        );

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let auth = AuthConfig {
            token: "t".into(),
            token_type: kook_core::TokenType::Bot,
        };
        let rest = RestConfig {
            base_url: "https://example.test/api/v3/".into(),
            ..RestConfig::default()
        };
        let transport = HttpTransport::new(&auth, &rest).unwrap();
        assert_eq!(transport.url("/guild/list"), "https://example.test/api/v3/guild/list");
        assert_eq!(transport.url("gateway/index"), "https://example.test/api/v3/gateway/index");
    }

    #[test]
    fn test_rejects_unprintable_token() {
        let auth = AuthConfig {
            token: "bad\ntoken".into(),
            token_type: kook_core::TokenType::Bot,
        };
        assert!(HttpTransport::new(&auth, &RestConfig::default()).is_err());
    }
}
