use crate::db::connection::Connector;
use crate::db::pool::ConnectionPool;
use crate::error::{AppError, Result};
use crate::models::doctor::Doctor;
use crate::models::session::Role;
use crate::models::user::User;
use crate::repositories::{doctor as doctor_repo, user as user_repo};
use argon2::{
    Argon2, ParamsBuilder,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroize;

/// Argon2id memory cost in MiB.
const MEMORY_COST_MIB: u32 = 19;
const TIME_COST: u32 = 2;
const LANES: u32 = 1;
const SALT_LEN: usize = 16;

/// The hasher every stored password is produced with.
fn hasher() -> Result<Argon2<'static>> {
    let params = ParamsBuilder::new()
        .m_cost(MEMORY_COST_MIB * 1024)
        .t_cost(TIME_COST)
        .p_cost(LANES)
        .build()
        .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// One-way hash of a login password, PHC encoded with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut secret = password.as_bytes().to_vec();

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| AppError::Internal(format!("Salt encoding: {}", e)))?;

    let hashed = hasher()?
        .hash_password(&secret, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Argon2 hash: {}", e)));

    secret.zeroize();
    hashed
}

/// Checks a password against a stored hash.
///
/// # Returns
///
/// `Ok(false)` on a mismatch. A stored hash that does not parse is an
/// internal error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let stored = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Stored hash unreadable: {}", e)))?;

    let mut secret = password.as_bytes().to_vec();
    let matches = hasher()?.verify_password(&secret, &stored).is_ok();
    secret.zeroize();
    Ok(matches)
}

/// Checks a patient's account (username or email) and password.
///
/// Unknown accounts, wrong passwords and doctor accounts all fail the same
/// way so the response does not reveal which accounts exist.
pub async fn authenticate_patient<C: Connector>(
    pool: &ConnectionPool<C>,
    account: &str,
    password: &str,
) -> Result<User> {
    tracing::debug!("🔐 Authenticating patient: {}", account);
    let rejected =
        || AppError::Authentication("Login failed: invalid account or password".to_string());

    let user = user_repo::find_by_account(pool, account)
        .await?
        .ok_or_else(rejected)?;

    if user.user_type != Role::Patient || !verify_password(password, &user.password_hash)? {
        return Err(rejected());
    }

    tracing::info!("✅ Patient authenticated: {}", user.user_id);
    Ok(user)
}

/// Checks a doctor's password, given the doctor ID from their employee
/// number.
pub async fn authenticate_doctor<C: Connector>(
    pool: &ConnectionPool<C>,
    doctor_id: i64,
    password: &str,
) -> Result<(Doctor, User)> {
    tracing::debug!("🔐 Authenticating doctor: {}", doctor_id);

    let doctor = doctor_repo::find_by_id(pool, doctor_id)
        .await?
        .ok_or_else(|| AppError::Authentication("Employee ID does not exist".to_string()))?;

    let rejected =
        || AppError::Authentication("Login failed: invalid employee ID or password".to_string());

    let user = user_repo::find_by_id(pool, doctor.user_id)
        .await?
        .ok_or_else(rejected)?;

    if user.user_type != Role::Doctor || !verify_password(password, &user.password_hash)? {
        return Err(rejected());
    }

    tracing::info!("✅ Doctor authenticated: {}", doctor.doctor_id);
    Ok((doctor, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("secret124", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn unparseable_hash_is_internal() {
        let err = verify_password("x", "not-a-hash").unwrap_err();
        assert_eq!(err.code(), 500);
    }
}
