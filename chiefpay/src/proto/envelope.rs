//! The `{status, data | message}` wrapper around HTTP response bodies.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ErrorCode};

/// A response envelope.
///
/// `data` is kept as a raw [`serde_json::Value`] so that `null` payloads of
/// lookup operations can be told apart from shape errors before the caller
/// deserializes into its target type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope<T = serde_json::Value> {
    /// The operation succeeded.
    Success {
        /// Operation result; `null` when a lookup found nothing.
        #[serde(default)]
        data: T,
    },
    /// The operation failed.
    Error {
        /// What went wrong.
        message: ErrorMessage,
    },
}

/// The `message` of an error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    /// Structured form sent by the latest API.
    Structured {
        /// Machine-readable code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
        /// Human-readable message.
        message: String,
        /// Offending request fields.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<String>,
    },
    /// Bare message string sent by older APIs.
    Text(String),
}

impl From<ErrorMessage> for ApiError {
    fn from(message: ErrorMessage) -> Self {
        match message {
            ErrorMessage::Text(message) => Self::new(message),
            ErrorMessage::Structured {
                code,
                message,
                fields,
            } => Self {
                code,
                message,
                fields,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_success_with_null_data() {
        let env: Envelope = serde_json::from_value(json!({"status": "success", "data": null}))
            .unwrap();
        assert_eq!(env, Envelope::Success { data: Value::Null });
    }

    #[test]
    fn test_structured_error_message() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "error",
            "message": {"code": "NOT_FOUND", "message": "Invoice not found", "fields": ["id"]}
        }))
        .unwrap();
        let Envelope::Error { message } = env else {
            panic!("expected error envelope");
        };
        let err = ApiError::from(message);
        assert!(err.is_not_found());
        assert_eq!(err.message, "Invoice not found");
        assert_eq!(err.fields, vec!["id".to_owned()]);
    }

    #[test]
    fn test_text_error_message() {
        let env: Envelope =
            serde_json::from_value(json!({"status": "error", "message": "Invalid api key"}))
                .unwrap();
        let Envelope::Error { message } = env else {
            panic!("expected error envelope");
        };
        assert_eq!(ApiError::from(message), ApiError::new("Invalid api key"));
    }
}
