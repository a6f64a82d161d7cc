use sonic_rs::{JsonValueTrait, Value};

use crate::{
    error::{AppError, Result},
    models::session::{Role, Session},
    services::sessions::SessionStore,
};

/// Extracts the session token from a request payload.
///
/// # Arguments
///
/// * `data` - The `data` object of the request envelope.
///
/// # Returns
///
/// An `Option` containing the token if present and non-empty.
pub fn extract_token(data: &Value) -> Option<&str> {
    data.get("token")
        .and_then(|v| v.as_str())
        .filter(|token| !token.is_empty())
}

/// Requires a valid session, optionally of a given role.
///
/// # Arguments
///
/// * `sessions` - The session store.
/// * `data` - The request payload carrying `token`.
/// * `role` - The role the caller must have, if any.
///
/// # Returns
///
/// The token and its refreshed session. Missing, unknown and expired tokens
/// yield 401; a session of the wrong role yields 403.
pub fn require_session(
    sessions: &SessionStore,
    data: &Value,
    role: Option<Role>,
) -> Result<(String, Session)> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_token(data).ok_or_else(|| {
        tracing::warn!("❌ No token in request data");
        AppError::Authentication("Missing authentication token".to_string())
    })?;

    let session = sessions.validate(token)?;

    if let Some(required) = role {
        if session.role != required {
            tracing::warn!(
                "❌ User {} with role {} tried a {} API",
                session.user_id,
                session.role,
                required
            );
            return Err(AppError::Forbidden("Insufficient permissions".to_string()));
        }
    }

    tracing::debug!("✅ Authenticated user {} ({})", session.user_id, session.role);
    Ok((token.to_string(), session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use sonic_rs::json;

    #[test]
    fn missing_token_is_401() {
        let store = SessionStore::new(TimeDelta::hours(24));
        for data in [json!({}), json!({"token": ""}), json!({"token": 5})] {
            let err = require_session(&store, &data, None).unwrap_err();
            assert_eq!(err.code(), 401);
        }
    }

    #[test]
    fn wrong_role_is_403() {
        let store = SessionStore::new(TimeDelta::hours(24));
        let token = store.issue(42, Role::Patient, "p");
        let data = json!({ "token": token });

        let err = require_session(&store, &data, Some(Role::Doctor)).unwrap_err();
        assert_eq!(err.code(), 403);

        let (_, session) = require_session(&store, &data, Some(Role::Patient)).unwrap();
        assert_eq!(session.user_id, 42);
    }
}
