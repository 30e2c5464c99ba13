use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_codes;

/// Error body returned by the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiError>,
    #[serde(rename = "clerk_trace_id", default)]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub long_message: String,
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
}

impl ErrorResponse {
    #[must_use]
    pub fn first_with_code(&self, code: &str) -> Option<&ApiError> {
        self.errors.iter().find(|error| error.code == code)
    }

    #[must_use]
    pub fn requires_assertion(&self) -> Option<&ApiError> {
        self.first_with_code(error_codes::REQUIRES_ASSERTION)
    }
}

impl ApiError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            long_message: String::new(),
            meta: None,
        }
    }

    /// Sub-code nested under `meta.code`.
    #[must_use]
    pub fn meta_code(&self) -> Option<&str> {
        self.meta.as_ref()?.get("code")?.as_str()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(error) if self.errors.len() > 1 => {
                write!(f, "{error} (+{} more)", self.errors.len() - 1)
            }
            Some(error) => write!(f, "{error}"),
            None => f.write_str("no errors reported"),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}
