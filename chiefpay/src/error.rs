//! Error types for the ChiefPay merchant API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Machine-readable error code carried by structured error envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A request argument failed validation.
    InvalidArgument,
    /// The entity being created already exists.
    AlreadyExists,
    /// The requested entity does not exist.
    NotFound,
    /// The server failed internally.
    Internal,
    /// A value is outside its permitted range.
    OutOfRange,
    /// The API key is missing or invalid.
    Unauthenticated,
    /// The API key is not allowed to perform the operation.
    PermissionDenied,
    /// A code this SDK does not know about.
    Other(String),
}

impl ErrorCode {
    /// Returns the wire spelling of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Other(code) => code,
        }
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "ALREADY_EXISTS" => Self::AlreadyExists,
            "NOT_FOUND" => Self::NotFound,
            "INTERNAL" => Self::Internal,
            "OUT_OF_RANGE" => Self::OutOfRange,
            "UNAUTHENTICATED" => Self::Unauthenticated,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let Ok(code) = s.parse::<Self>();
        Ok(code)
    }
}

/// Application-level error returned in an `{"status": "error"}` envelope.
///
/// Older API versions only send a message string; the latest one adds a
/// [`ErrorCode`] and the names of the offending request fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(self))]
pub struct ApiError {
    /// Machine-readable code, when the server sent one.
    pub code: Option<ErrorCode>,
    /// Human-readable message.
    pub message: String,
    /// Names of the request fields that caused the error.
    pub fields: Vec<String>,
}

impl ApiError {
    /// Creates an error that only carries a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Creates a `NOT_FOUND` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::NotFound)
    }

    /// Sets the error code.
    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the offending field names.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Returns `true` if the server reported the entity as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == Some(ErrorCode::NotFound)
    }
}

fn describe(err: &ApiError) -> String {
    let mut out = match &err.code {
        Some(code) => format!("{code}: {}", err.message),
        None => err.message.clone(),
    };
    if !err.fields.is_empty() {
        out.push_str(" (fields: ");
        out.push_str(&err.fields.join(", "));
        out.push(')');
    }
    out
}

/// Errors raised while decoding a pushed frame or a rate table.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame body is not valid JSON or does not match the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A discriminated notification carried an unknown `type`.
    #[error("unknown notification type: {0}")]
    UnknownType(String),

    /// A notification without discriminator did not carry exactly one payload.
    #[error("notification must carry exactly one of `transaction` or `invoice`")]
    AmbiguousPayload,

    /// A fixed-point rate was not a non-negative integer.
    #[error("invalid fixed-point rate for {key}: {value}")]
    InvalidRate {
        /// `chain/token` key of the offending entry.
        key: String,
        /// The raw value as received.
        value: String,
    },

    /// A fixed-point rate table was not nested as chain → token → value.
    #[error("fixed-point rate table must be an object of objects")]
    RateShape,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_known_and_unknown() {
        assert_eq!("NOT_FOUND".parse::<ErrorCode>().unwrap(), ErrorCode::NotFound);
        assert_eq!(
            "TEAPOT".parse::<ErrorCode>().unwrap(),
            ErrorCode::Other("TEAPOT".to_owned())
        );
        let code: ErrorCode = serde_json::from_str("\"PERMISSION_DENIED\"").unwrap();
        assert_eq!(code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::new("no such invoice")
            .with_code(ErrorCode::NotFound)
            .with_fields(vec!["id".to_owned()]);
        assert_eq!(err.to_string(), "NOT_FOUND: no such invoice (fields: id)");
        assert!(err.is_not_found());

        let plain = ApiError::new("bad api key");
        assert_eq!(plain.to_string(), "bad api key");
        assert!(!plain.is_not_found());

        let boxed: Box<dyn std::error::Error> = Box::new(plain);
        assert!(boxed.source().is_none());
        assert_eq!(boxed.to_string(), "bad api key");
    }
}
