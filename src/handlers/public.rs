use serde::Deserialize;
use sonic_rs::{Value, json};

use crate::{
    db::connection::Connector,
    error::{AppError, Result},
    handlers::payload::{self, today},
    models::{
        doctor::{DAILY_PATIENT_LIMIT, REGISTRATION_FEE},
        envelope::Reply,
        ids::ExternalId,
    },
    repositories::{appointment as appointment_repo, doctor as doctor_repo},
    state::AppState,
};

/// The request payload for `public.doctor.get`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DoctorGetRequest {
    pub doctor_id: String,
}

/// Handles `public.schedule.list`: one bookable schedule per doctor for
/// today.
pub async fn list_schedules<C: Connector>(state: AppState<C>, _data: Value) -> Result<Reply> {
    let doctors = doctor_repo::list_all(&state.pool).await?;
    let booked = appointment_repo::counts_by_doctor(&state.pool).await?;
    let date = today().format("%Y-%m-%d").to_string();

    let schedules: Vec<Value> = doctors
        .iter()
        .map(|doctor| {
            let booked_count = booked.get(&doctor.doctor_id).copied().unwrap_or(0);
            let remaining_count = (DAILY_PATIENT_LIMIT - booked_count).max(0);
            json!({
                "scheduleId": ExternalId::Schedule.format(doctor.doctor_id),
                "doctorId": ExternalId::Doctor.format(doctor.doctor_id),
                "doctorName": doctor.name,
                "department": doctor.department,
                "date": date,
                "timePeriod": doctor.working_hours,
                "registrationFee": REGISTRATION_FEE,
                "patientLimit": DAILY_PATIENT_LIMIT,
                "bookedCount": booked_count,
                "remainingCount": remaining_count
            })
        })
        .collect();

    Ok(Reply::ok(
        "Schedules retrieved successfully",
        json!({ "schedules": schedules }),
    ))
}

/// Handles `public.doctor.get`.
pub async fn get_doctor<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let request: DoctorGetRequest = payload::parse(&data)?;
    let doctor_id = ExternalId::Doctor.parse(&request.doctor_id)?;

    let doctor = doctor_repo::find_by_id(&state.pool, doctor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    Ok(Reply::ok(
        "Doctor retrieved successfully",
        json!({
            "employeeId": ExternalId::Employee.format(doctor.doctor_id),
            "name": doctor.name,
            "department": doctor.department,
            "title": doctor.title.unwrap_or_default(),
            "photoUrl": doctor.profile_picture.unwrap_or_default(),
            "workingHours": doctor.working_hours,
            "registrationFee": REGISTRATION_FEE,
            "dailyPatientLimit": DAILY_PATIENT_LIMIT
        }),
    ))
}
