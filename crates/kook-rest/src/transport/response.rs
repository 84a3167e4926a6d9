//! Raw response as seen by the dispatcher

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::RestError;

/// Status, lowercased headers, and decoded JSON body of one response
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl RestResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Attach a header (name is lowercased)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Placeholder response for calls that only reserve bucket capacity
    pub(crate) fn permit() -> Self {
        Self::new(200, Value::Null)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Service-level error carried in the `{code, message}` envelope.
    ///
    /// The service reports some failures with a 2xx status and a non-zero
    /// `code`.
    pub fn api_error(&self) -> Option<(i64, String)> {
        let code = self.body.get("code")?.as_i64()?;
        if code == 0 {
            return None;
        }
        let message = self
            .body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some((code, message))
    }

    /// Convert a non-success response into the matching error
    pub fn error_for_status(self) -> Result<Self, RestError> {
        let api_error = self.api_error();
        if self.is_success() && api_error.is_none() {
            return Ok(self);
        }
        let (code, message) = match api_error {
            Some((code, message)) => (Some(code), message),
            None => (None, format!("unexpected status {}", self.status)),
        };
        Err(RestError::Http {
            status: self.status,
            code,
            message,
        })
    }

    /// Decode the `data` field of the envelope, or the whole body if absent
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, RestError> {
        let value = self.body.get("data").unwrap_or(&self.body);
        T::deserialize(value).map_err(|e| RestError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_case_insensitive() {
        let resp = RestResponse::new(200, Value::Null).with_header("X-Rate-Limit-Limit", "5");
        assert_eq!(resp.header("x-rate-limit-limit"), Some("5"));
        assert_eq!(resp.header("X-RATE-LIMIT-LIMIT"), Some("5"));
    }

    #[test]
    fn test_envelope_error_on_ok_status() {
        let resp = RestResponse::new(200, json!({"code": 40000, "message": "bad target"}));
        match resp.error_for_status() {
            Err(RestError::Http { status, code, message }) => {
                assert_eq!(status, 200);
                assert_eq!(code, Some(40000));
                assert_eq!(message, "bad target");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[test]
    fn test_data_extraction() {
        let resp = RestResponse::new(200, json!({"code": 0, "message": "", "data": {"url": "wss://x"}}));
        #[derive(serde::Deserialize)]
        struct Gateway {
            url: String,
        }
        let gateway: Gateway = resp.clone().error_for_status().unwrap().data().unwrap();
        assert_eq!(gateway.url, "wss://x");
    }

    #[test]
    fn test_plain_error_status() {
        let resp = RestResponse::new(404, Value::Null);
        assert!(matches!(
            resp.error_for_status(),
            Err(RestError::Http { status: 404, code: None, .. })
        ));
    }
}
