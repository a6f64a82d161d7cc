use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use sonic_rs::Value;

use crate::error::{AppError, Result};

/// Decodes a request's `data` object into a typed payload.
///
/// Missing or mistyped fields are a 400.
pub fn parse<T: DeserializeOwned>(data: &Value) -> Result<T> {
    let raw = sonic_rs::to_string(data)
        .map_err(|e| AppError::Internal(format!("Payload re-encoding failed: {}", e)))?;
    sonic_rs::from_str(&raw)
        .map_err(|e| AppError::Validation(format!("Invalid request data: {}", e)))
}

/// Treats empty strings in optional fields as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The server's local calendar date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
