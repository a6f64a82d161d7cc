use crate::{
    db::{
        connection::{Connection, Connector},
        pool::ConnectionPool,
        statement::{Record, Statement},
    },
    error::{AppError, Result},
    models::{
        patient::{Gender, NewPatient, Patient, PatientProfileChanges},
        session::Role,
    },
    repositories::user as user_repo,
};

const PATIENT_COLUMNS: &str =
    "patient_id, user_id, name, gender, birth_date, id_number, phone_number";

/// A helper function to map a `Record` to a `Patient`.
fn row_to_patient(row: &Record) -> Result<Patient> {
    Ok(Patient {
        patient_id: row.int("patient_id")?,
        user_id: row.int("user_id")?,
        name: row.text("name")?,
        gender: Gender::from_db_str(&row.text("gender")?),
        birth_date: row.date("birth_date")?,
        id_number: row.text("id_number")?,
        phone_number: row.opt_text("phone_number")?,
    })
}

/// Finds a patient by their ID.
pub async fn find_by_id<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
) -> Result<Option<Patient>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM patients WHERE patient_id = $1",
        PATIENT_COLUMNS
    ))
    .bind(patient_id);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_patient(&r))
        .transpose()
}

/// Finds the patient record owned by a login account.
pub async fn find_by_user_id<C: Connector>(
    pool: &ConnectionPool<C>,
    user_id: i64,
) -> Result<Option<Patient>> {
    let statement = Statement::new(format!(
        "SELECT {} FROM patients WHERE user_id = $1",
        PATIENT_COLUMNS
    ))
    .bind(user_id);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_patient(&r))
        .transpose()
}

/// Whether a patient with this identity card number is on file.
pub async fn exists_by_id_number<C: Connector>(
    pool: &ConnectionPool<C>,
    id_number: &str,
) -> Result<bool> {
    let statement =
        Statement::new("SELECT COUNT(*) AS n FROM patients WHERE id_number = $1").bind(id_number);
    let row = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("n".to_string()))?;
    Ok(row.int("n")? > 0)
}

async fn insert_with_account<C: Connector>(
    conn: &mut Connection<C>,
    new_patient: &NewPatient,
) -> Result<Patient> {
    conn.begin().await?;

    let user_id = user_repo::insert(
        conn,
        &new_patient.email,
        &new_patient.password_hash,
        Role::Patient,
        Some(&new_patient.email),
        new_patient.phone_number.as_deref(),
    )
    .await?;

    let statement = Statement::new(format!(
        r#"
        INSERT INTO patients (user_id, name, gender, birth_date, id_number, phone_number)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        PATIENT_COLUMNS
    ))
    .bind(user_id)
    .bind(new_patient.name.as_str())
    .bind(new_patient.gender.as_str())
    .bind(new_patient.birth_date)
    .bind(new_patient.id_number.as_str())
    .bind(new_patient.phone_number.as_deref());

    let row = conn
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("patient_id".to_string()))?;
    row_to_patient(&row)
}

/// Creates a patient together with its login account in one transaction.
///
/// The patient's email doubles as the account username.
pub async fn create_with_account<C: Connector>(
    pool: &ConnectionPool<C>,
    new_patient: &NewPatient,
) -> Result<Patient> {
    let mut conn = pool.acquire().await?;
    let result = insert_with_account(&mut conn, new_patient).await;
    let result = conn.finish(result).await;
    pool.release(conn).await;

    let patient = result?;
    tracing::info!("✅ Patient registered with ID: {}", patient.patient_id);
    Ok(patient)
}

/// Applies profile changes and returns the updated patient.
pub async fn update_profile<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
    changes: &PatientProfileChanges,
) -> Result<Patient> {
    let statement = Statement::new(format!(
        r#"
        UPDATE patients
        SET
            name = COALESCE($2, name),
            birth_date = COALESCE($3, birth_date),
            phone_number = COALESCE($4, phone_number)
        WHERE patient_id = $1
        RETURNING {}
        "#,
        PATIENT_COLUMNS
    ))
    .bind(patient_id)
    .bind(changes.name.as_deref())
    .bind(changes.birth_date)
    .bind(changes.phone_number.as_deref());

    let row = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;
    row_to_patient(&row)
}
