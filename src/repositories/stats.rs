use crate::{
    db::{connection::Connector, pool::ConnectionPool, statement::Statement},
    error::{AppError, Result},
};

/// Entity totals reported by `system.stats`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HospitalStats {
    pub total_users: i64,
    pub total_doctors: i64,
    pub total_patients: i64,
    pub total_cases: i64,
    pub total_appointments: i64,
    pub booked_appointments: i64,
    pub attended_appointments: i64,
    pub cancelled_appointments: i64,
    pub total_prescriptions: i64,
    pub total_medications: i64,
}

/// Counts every entity in a single round trip.
pub async fn hospital_stats<C: Connector>(pool: &ConnectionPool<C>) -> Result<HospitalStats> {
    let statement = Statement::new(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM doctors) AS total_doctors,
            (SELECT COUNT(*) FROM patients) AS total_patients,
            (SELECT COUNT(*) FROM cases) AS total_cases,
            (SELECT COUNT(*) FROM appointments) AS total_appointments,
            (SELECT COUNT(*) FROM appointments WHERE status = 'Booked') AS booked_appointments,
            (SELECT COUNT(*) FROM appointments WHERE status = 'Attended') AS attended_appointments,
            (SELECT COUNT(*) FROM appointments WHERE status = 'Cancelled')
                AS cancelled_appointments,
            (SELECT COUNT(*) FROM prescriptions) AS total_prescriptions,
            (SELECT COUNT(*) FROM medications) AS total_medications
        "#,
    );

    let row = pool
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("stats".to_string()))?;

    Ok(HospitalStats {
        total_users: row.int("total_users")?,
        total_doctors: row.int("total_doctors")?,
        total_patients: row.int("total_patients")?,
        total_cases: row.int("total_cases")?,
        total_appointments: row.int("total_appointments")?,
        booked_appointments: row.int("booked_appointments")?,
        attended_appointments: row.int("attended_appointments")?,
        cancelled_appointments: row.int("cancelled_appointments")?,
        total_prescriptions: row.int("total_prescriptions")?,
        total_medications: row.int("total_medications")?,
    })
}
