use crate::models::session::Role;

/// Represents a login account. Doctors and patients each own one.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub user_id: i64,
    /// The login name. Patients register with their email as username.
    pub username: String,
    /// The user's Argon2 password hash.
    pub password_hash: String,
    /// Whether the account belongs to a doctor or a patient.
    pub user_type: Role,
    /// The user's email address.
    pub email: Option<String>,
    /// The user's phone number.
    pub phone_number: Option<String>,
    /// When the account was created, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
}
