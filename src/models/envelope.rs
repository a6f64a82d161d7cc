use serde::Serialize;
use sonic_rs::{JsonValueTrait, Value};

use crate::error::{AppError, Result};

/// Body written when an envelope cannot be serialized.
const FALLBACK_BODY: &str =
    r#"{"status":"error","code":500,"message":"Internal server error","data":{}}"#;

/// The outcome carried in a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

/// The `{status, code, message, data}` response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub status: Status,
    pub code: u16,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    /// Creates a success envelope.
    pub fn success(code: u16, message: impl Into<String>, data: Value) -> Self {
        Self {
            status: Status::Success,
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates an error envelope with an empty data object.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            code,
            message: message.into(),
            data: sonic_rs::json!({}),
        }
    }

    /// Serializes the envelope. Never fails: a serialization fault yields a
    /// fixed internal-error body.
    pub fn encode(&self) -> String {
        sonic_rs::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Envelope serialization failed: {}", e);
            FALLBACK_BODY.to_string()
        })
    }
}

/// A successful handler result.
#[derive(Debug, Clone)]
pub struct Reply {
    pub code: u16,
    pub message: String,
    pub data: Value,
}

impl Reply {
    /// A `200` reply.
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data,
        }
    }

    /// A `201` reply.
    pub fn created(message: impl Into<String>, data: Value) -> Self {
        Self {
            code: 201,
            message: message.into(),
            data,
        }
    }

    pub fn into_envelope(self) -> Envelope {
        Envelope::success(self.code, self.message, self.data)
    }
}

/// A decoded `{api, data}` request envelope.
#[derive(Debug, Clone)]
pub struct Request {
    pub api: String,
    pub data: Value,
}

impl Request {
    /// Decodes a request envelope.
    ///
    /// Fails with `MalformedRequest` when the input is not a JSON object,
    /// when `api` is missing or not a string, or when `data` is missing or
    /// not an object.
    pub fn decode(raw: &str) -> Result<Self> {
        let request: Value = sonic_rs::from_str(raw)
            .map_err(|e| AppError::MalformedRequest(format!("Invalid JSON format: {}", e)))?;
        if !request.is_object() {
            return Err(AppError::MalformedRequest(
                "Request must be a JSON object".to_string(),
            ));
        }

        let (Some(api), Some(data)) = (request.get("api"), request.get("data")) else {
            return Err(AppError::MalformedRequest(
                "Missing required fields: api or data".to_string(),
            ));
        };

        let api = api
            .as_str()
            .ok_or_else(|| AppError::MalformedRequest("Field api must be a string".to_string()))?
            .to_string();

        if !data.is_object() {
            return Err(AppError::MalformedRequest(
                "Field data must be an object".to_string(),
            ));
        }

        Ok(Self {
            api,
            data: data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_well_formed_request() {
        let request =
            Request::decode(r#"{"api":"patient.auth.login","data":{"account":"a"}}"#).unwrap();
        assert_eq!(request.api, "patient.auth.login");
        assert_eq!(request.data.get("account").and_then(|v| v.as_str()), Some("a"));
    }

    #[test]
    fn rejects_missing_fields() {
        for raw in [r#"{"data":{}}"#, r#"{"api":"x"}"#, r#"{"api":"x","data":null}"#] {
            let err = Request::decode(raw).unwrap_err();
            assert!(matches!(err, AppError::MalformedRequest(_)), "{raw}");
        }
    }

    #[test]
    fn rejects_non_object_input() {
        for raw in ["", "not json", "[1,2]", r#"{"api":1,"data":{}}"#, r#"{"api":"x","data":[]}"#] {
            assert_eq!(Request::decode(raw).unwrap_err().code(), 400, "{raw}");
        }
    }

    #[test]
    fn rejects_top_level_arrays_and_scalars() {
        for raw in [
            r#"["patient.auth.login", {"account":"a"}]"#,
            r#"[{"api":"patient.auth.login","data":{}}]"#,
            r#""patient.auth.login""#,
            "42",
            "null",
        ] {
            let err = Request::decode(raw).unwrap_err();
            assert!(matches!(err, AppError::MalformedRequest(_)), "{raw}");
        }
    }

    #[test]
    fn error_envelopes_carry_an_empty_object() {
        let body = Envelope::error(404, "API not found: x").encode();
        let value: Value = sonic_rs::from_str(&body).unwrap();
        assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("error"));
        assert_eq!(value.get("code").and_then(|v| v.as_u64()), Some(404));
        assert!(value.get("data").map(|v| v.is_object()).unwrap_or(false));
    }
}
