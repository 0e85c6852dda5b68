use serde::Deserialize;
use thiserror::Error;

/// Structured error returned by the HEPIC API for any response with
/// status >= 400. The server body is `{"statuscode", "error", "message"}`;
/// any field may be absent, in which case the caller substitutes values
/// derived from the HTTP status line.
#[derive(Debug, Clone, Error, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default, rename = "statuscode")]
    pub status_code: u16,
    #[serde(default, rename = "error")]
    pub error_text: String,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "HTTP {}: {}", self.status_code, self.error_text)
        } else {
            write!(
                f,
                "HTTP {}: {} — {}",
                self.status_code, self.error_text, self.message
            )
        }
    }
}

impl ApiError {
    /// True for 401/403 responses, which usually mean a bad or expired token.
    pub fn is_auth_failure(&self) -> bool {
        self.status_code == 401 || self.status_code == 403
    }
}
