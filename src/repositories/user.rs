use crate::{
    db::{
        connection::{Connection, Connector},
        pool::ConnectionPool,
        statement::{Record, Statement},
    },
    error::{AppError, Result},
    models::{session::Role, user::User},
};

const USER_COLUMNS: &str =
    "user_id, username, password, user_type, email, phone_number, created_at";

/// A helper function to map a `Record` to a `User`.
fn row_to_user(row: &Record) -> Result<User> {
    Ok(User {
        user_id: row.int("user_id")?,
        username: row.text("username")?,
        password_hash: row.text("password")?,
        user_type: Role::from_db_str(&row.text("user_type")?)?,
        email: row.opt_text("email")?,
        phone_number: row.opt_text("phone_number")?,
        created_at: row.text("created_at")?,
    })
}

/// Finds a user by their ID.
pub async fn find_by_id<C: Connector>(
    pool: &ConnectionPool<C>,
    user_id: i64,
) -> Result<Option<User>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM users WHERE user_id = $1",
        USER_COLUMNS
    ))
    .bind(user_id);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_user(&r))
        .transpose()
}

/// Finds a user by username or email address.
pub async fn find_by_account<C: Connector>(
    pool: &ConnectionPool<C>,
    account: &str,
) -> Result<Option<User>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM users WHERE username = $1 OR email = $1 ORDER BY user_id LIMIT 1",
        USER_COLUMNS
    ))
    .bind(account);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_user(&r))
        .transpose()
}

/// Whether a user with this username or email already exists.
pub async fn exists<C: Connector>(
    pool: &ConnectionPool<C>,
    username: &str,
    email: &str,
) -> Result<bool> {
    let statement = Statement::new(
        "SELECT COUNT(*) AS n FROM users WHERE username = $1 OR email = $2",
    )
    .bind(username)
    .bind(email);
    let row = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("n".to_string()))?;
    Ok(row.int("n")? > 0)
}

/// Inserts a user on a connection the caller holds, typically inside a
/// transaction. Returns the new user ID.
pub async fn insert<C: Connector>(
    conn: &mut Connection<C>,
    username: &str,
    password_hash: &str,
    user_type: Role,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<i64> {
    let statement = Statement::new(
        r#"
        INSERT INTO users (username, password, user_type, email, phone_number)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING user_id
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(user_type.as_db_str())
    .bind(email)
    .bind(phone_number);

    conn.query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("user_id".to_string()))?
        .int("user_id")
}

/// Updates a user's contact details. `None` keeps the stored value.
pub async fn update_contact<C: Connector>(
    pool: &ConnectionPool<C>,
    user_id: i64,
    email: Option<&str>,
    phone_number: Option<&str>,
) -> Result<()> {
    let statement = Statement::new(
        r#"
        UPDATE users
        SET
            email = COALESCE($2, email),
            phone_number = COALESCE($3, phone_number)
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(phone_number);

    let updated = pool.execute(&statement).await?;
    if updated == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Replaces a user's password hash.
pub async fn update_password<C: Connector>(
    pool: &ConnectionPool<C>,
    user_id: i64,
    password_hash: &str,
) -> Result<()> {
    let statement = Statement::new("UPDATE users SET password = $2 WHERE user_id = $1")
        .bind(user_id)
        .bind(password_hash);

    if pool.execute(&statement).await? == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}
