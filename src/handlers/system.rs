use sonic_rs::{Value, json};

use crate::{
    db::connection::Connector,
    error::Result,
    middleware_layer::auth::require_session,
    models::{envelope::Reply, session::Role},
    repositories::stats,
    state::AppState,
};

/// Handles `system.stats`: entity totals and live session count. Doctors
/// only.
pub async fn get_stats<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let totals = stats::hospital_stats(&state.pool).await?;
    let active_sessions = state.sessions.active_count();

    Ok(Reply::ok(
        "Statistics retrieved successfully",
        json!({
            "totalUsers": totals.total_users,
            "totalDoctors": totals.total_doctors,
            "totalPatients": totals.total_patients,
            "totalMedicalRecords": totals.total_cases,
            "totalAppointments": totals.total_appointments,
            "scheduledAppointments": totals.booked_appointments,
            "attendedAppointments": totals.attended_appointments,
            "cancelledAppointments": totals.cancelled_appointments,
            "totalPrescriptions": totals.total_prescriptions,
            "totalMedications": totals.total_medications,
            "activeSessions": active_sessions
        }),
    ))
}
