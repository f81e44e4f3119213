//! Webhook request and response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /webhook/call-started`.
#[derive(Debug, Deserialize)]
pub struct CallStartedRequest {
    pub call_id: String,
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallStartedResponse {
    pub status: &'static str,
    pub call_id: String,
    pub caller_phone: String,
}

/// Body of `POST /webhook/call-ended`.
#[derive(Debug, Deserialize)]
pub struct CallEndedRequest {
    pub call_id: String,
}

#[derive(Debug, Serialize)]
pub struct CallEndedResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
