use std::collections::HashMap;

use crate::{
    db::{
        connection::Connector,
        pool::ConnectionPool,
        statement::{Record, Statement},
    },
    error::{AppError, Result},
    models::appointment::{AppointmentStatus, DoctorAppointment},
};

fn row_to_doctor_appointment(row: &Record) -> Result<DoctorAppointment> {
    Ok(DoctorAppointment {
        appointment_id: row.int("appointment_id")?,
        patient_id: row.int("patient_id")?,
        patient_name: row.text("patient_name")?,
        appointment_time: row.text("appointment_time")?,
        status: AppointmentStatus::from_db_str(&row.text("status")?)?,
    })
}

/// Books an appointment at the current time and returns its ID.
pub async fn create<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
    doctor_id: i64,
    department: &str,
) -> Result<i64> {
    let statement = Statement::new(
        r#"
        INSERT INTO appointments (patient_id, doctor_id, appointment_time, department, status)
        VALUES ($1, $2, LOCALTIMESTAMP(0), $3, $4)
        RETURNING appointment_id
        "#,
    )
    .bind(patient_id)
    .bind(doctor_id)
    .bind(department)
    .bind(AppointmentStatus::Booked.as_db_str());

    let appointment_id = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("appointment_id".to_string()))?
        .int("appointment_id")?;
    tracing::info!("✅ Appointment created with ID: {}", appointment_id);
    Ok(appointment_id)
}

/// Number of appointments per doctor. Doctors with none are absent.
pub async fn counts_by_doctor<C: Connector>(pool: &ConnectionPool<C>) -> Result<HashMap<i64, i64>> {
    let statement = Statement::new(
        "SELECT doctor_id, COUNT(*) AS n FROM appointments GROUP BY doctor_id",
    );
    pool.query(&statement)
        .await?
        .iter()
        .map(|row| -> Result<(i64, i64)> { Ok((row.int("doctor_id")?, row.int("n")?)) })
        .collect()
}

/// A doctor's appointments with patient names, newest first.
pub async fn list_for_doctor<C: Connector>(
    pool: &ConnectionPool<C>,
    doctor_id: i64,
) -> Result<Vec<DoctorAppointment>> {
    let statement = Statement::new(
        r#"
        SELECT a.appointment_id, a.patient_id, p.name AS patient_name,
               a.appointment_time, a.status
        FROM appointments a
        JOIN patients p ON a.patient_id = p.patient_id
        WHERE a.doctor_id = $1
        ORDER BY a.appointment_time DESC, a.appointment_id DESC
        "#,
    )
    .bind(doctor_id);
    pool.query(&statement)
        .await?
        .iter()
        .map(row_to_doctor_appointment)
        .collect()
}
