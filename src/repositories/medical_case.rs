use crate::{
    db::{
        connection::Connector,
        pool::ConnectionPool,
        statement::{Record, Statement},
    },
    error::{AppError, Result},
    models::medical_case::{CaseHistoryEntry, MedicalCase},
};

const CASE_COLUMNS: &str =
    "case_id, patient_id, department, doctor_id, diagnosis, doctor_advice, diagnosis_date";

/// A helper function to map a `Record` to a `MedicalCase`.
fn row_to_case(row: &Record) -> Result<MedicalCase> {
    Ok(MedicalCase {
        case_id: row.int("case_id")?,
        patient_id: row.int("patient_id")?,
        department: row.text("department")?,
        doctor_id: row.int("doctor_id")?,
        diagnosis: row.text("diagnosis")?,
        doctor_advice: row.opt_text("doctor_advice")?,
        diagnosis_date: row.text("diagnosis_date")?,
    })
}

fn row_to_history_entry(row: &Record) -> Result<CaseHistoryEntry> {
    Ok(CaseHistoryEntry {
        case_id: row.int("case_id")?,
        diagnosis: row.text("diagnosis")?,
        doctor_advice: row.opt_text("doctor_advice")?,
        diagnosis_date: row.text("diagnosis_date")?,
        doctor_name: row.text("doctor_name")?,
        department: row.text("department")?,
    })
}

/// Records a new diagnosis and returns the case ID.
pub async fn create<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
    department: &str,
    doctor_id: i64,
    diagnosis: &str,
    doctor_advice: Option<&str>,
) -> Result<i64> {
    let statement = Statement::new(
        r#"
        INSERT INTO cases (patient_id, department, doctor_id, diagnosis, doctor_advice)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING case_id
        "#,
    )
    .bind(patient_id)
    .bind(department)
    .bind(doctor_id)
    .bind(diagnosis)
    .bind(doctor_advice);

    let case_id = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("case_id".to_string()))?
        .int("case_id")?;
    tracing::info!("✅ Case created with ID: {}", case_id);
    Ok(case_id)
}

/// The most recent case of a patient.
pub async fn latest_for_patient<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
) -> Result<Option<MedicalCase>> {
    let statement = Statement::new(format!(
        r#"
        SELECT {} FROM cases
        WHERE patient_id = $1
        ORDER BY diagnosis_date DESC, case_id DESC
        LIMIT 1
        "#,
        CASE_COLUMNS
    ))
    .bind(patient_id);
    pool.query_opt(&statement)
        .await?
        .map(|r| row_to_case(&r))
        .transpose()
}

/// A patient's cases with the diagnosing doctor's name, newest first.
pub async fn history_for_patient<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
) -> Result<Vec<CaseHistoryEntry>> {
    let statement = Statement::new(
        r#"
        SELECT c.case_id, c.diagnosis, c.doctor_advice, c.diagnosis_date,
               d.name AS doctor_name, c.department
        FROM cases c
        JOIN doctors d ON c.doctor_id = d.doctor_id
        WHERE c.patient_id = $1
        ORDER BY c.diagnosis_date DESC, c.case_id DESC
        "#,
    )
    .bind(patient_id);
    pool.query(&statement)
        .await?
        .iter()
        .map(row_to_history_entry)
        .collect()
}
