use crate::{
    db::{
        connection::{Connection, Connector},
        pool::ConnectionPool,
        statement::{Record, Statement},
    },
    error::{AppError, Result},
    models::{
        doctor::{Doctor, DoctorProfileChanges, NewDoctor},
        session::Role,
    },
    repositories::user as user_repo,
};

const DOCTOR_COLUMNS: &str =
    "doctor_id, user_id, name, department, title, working_hours, profile_picture";

/// A helper function to map a `Record` to a `Doctor`.
fn row_to_doctor(row: &Record) -> Result<Doctor> {
    Ok(Doctor {
        doctor_id: row.int("doctor_id")?,
        user_id: row.int("user_id")?,
        name: row.text("name")?,
        department: row.text("department")?,
        title: row.opt_text("title")?,
        working_hours: row.text("working_hours")?,
        profile_picture: row.opt_text("profile_picture")?,
    })
}

/// Finds a doctor by their ID.
pub async fn find_by_id<C: Connector>(
    pool: &ConnectionPool<C>,
    doctor_id: i64,
) -> Result<Option<Doctor>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM doctors WHERE doctor_id = $1",
        DOCTOR_COLUMNS
    ))
    .bind(doctor_id);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_doctor(&r))
        .transpose()
}

/// Finds the doctor record owned by a login account.
pub async fn find_by_user_id<C: Connector>(
    pool: &ConnectionPool<C>,
    user_id: i64,
) -> Result<Option<Doctor>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM doctors WHERE user_id = $1",
        DOCTOR_COLUMNS
    ))
    .bind(user_id);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_doctor(&r))
        .transpose()
}

/// Lists every doctor, by department then name.
pub async fn list_all<C: Connector>(pool: &ConnectionPool<C>) -> Result<Vec<Doctor>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM doctors ORDER BY department, name",
        DOCTOR_COLUMNS
    ));
    pool.query(&statement)
        .await?
        .iter()
        .map(row_to_doctor)
        .collect()
}

/// Applies profile changes and returns the updated doctor.
pub async fn update_profile<C: Connector>(
    pool: &ConnectionPool<C>,
    doctor_id: i64,
    changes: &DoctorProfileChanges,
) -> Result<Doctor> {
    let statement = Statement::new(format!(
        r#"
        UPDATE doctors
        SET
            title = COALESCE($2, title),
            working_hours = COALESCE($3, working_hours),
            profile_picture = COALESCE($4, profile_picture)
        WHERE doctor_id = $1
        RETURNING {}
        "#,
        DOCTOR_COLUMNS
    ))
    .bind(doctor_id)
    .bind(changes.title.as_deref())
    .bind(changes.working_hours.as_deref())
    .bind(changes.profile_picture.as_deref());

    let row = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;
    row_to_doctor(&row)
}

async fn insert_with_account<C: Connector>(
    conn: &mut Connection<C>,
    new_doctor: &NewDoctor,
) -> Result<Doctor> {
    conn.begin().await?;

    let user_id = user_repo::insert(
        conn,
        &new_doctor.username,
        &new_doctor.password_hash,
        Role::Doctor,
        None,
        None,
    )
    .await?;

    let statement = Statement::new(format!(
        r#"
        INSERT INTO doctors (user_id, name, department, title, working_hours)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        DOCTOR_COLUMNS
    ))
    .bind(user_id)
    .bind(new_doctor.name.as_str())
    .bind(new_doctor.department.as_str())
    .bind(new_doctor.title.as_deref())
    .bind(new_doctor.working_hours.as_str());

    let row = conn
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("doctor_id".to_string()))?;
    row_to_doctor(&row)
}

/// Creates a doctor together with its login account in one transaction.
pub async fn create_with_account<C: Connector>(
    pool: &ConnectionPool<C>,
    new_doctor: &NewDoctor,
) -> Result<Doctor> {
    let mut conn = pool.acquire().await?;
    let result = insert_with_account(&mut conn, new_doctor).await;
    let result = conn.finish(result).await;
    pool.release(conn).await;

    let doctor = result?;
    tracing::info!("✅ Doctor created with ID: {}", doctor.doctor_id);
    Ok(doctor)
}
