use serde::Deserialize;
use sonic_rs::{Value, json};

use crate::{
    db::connection::Connector,
    error::{AppError, Result},
    handlers::{
        patient::records_json,
        payload::{self, non_empty, today},
    },
    middleware_layer::auth::require_session,
    models::{
        doctor::{DAILY_PATIENT_LIMIT, Doctor, DoctorProfileChanges, REGISTRATION_FEE},
        envelope::Reply,
        ids::ExternalId,
        prescription::NewMedication,
        session::{Role, Session},
        user::User,
    },
    repositories::{
        appointment as appointment_repo, doctor as doctor_repo, medical_case as case_repo,
        patient as patient_repo, prescription as prescription_repo, user as user_repo,
    },
    services::auth as auth_service,
    state::AppState,
    validation::auth::*,
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Employee number, e.g. `DOC001`.
    pub employee_id: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub employee_id: String,
    pub old_password: String,
    pub new_password: String,
}

/// The request payload for `doctor.profile.update`. Absent or empty fields
/// are left unchanged.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[serde(alias = "bio")]
    pub title: Option<String>,
    pub working_hours: Option<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PatientRequest {
    pub patient_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecordCreateRequest {
    pub patient_id: String,
    pub diagnosis: String,
    pub doctor_advice: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct MedicineRequest {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionCreateRequest {
    pub patient_id: String,
    pub medicines: Vec<MedicineRequest>,
}

/// Loads the doctor record behind a doctor session.
async fn current_doctor<C: Connector>(state: &AppState<C>, session: &Session) -> Result<Doctor> {
    doctor_repo::find_by_user_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))
}

fn profile_json(doctor: &Doctor, user: Option<&User>) -> Value {
    json!({
        "doctorId": ExternalId::Doctor.format(doctor.doctor_id),
        "employeeId": ExternalId::Employee.format(doctor.doctor_id),
        "name": doctor.name,
        "department": doctor.department,
        "title": doctor.title.clone().unwrap_or_default(),
        "workingHours": doctor.working_hours,
        "photoUrl": doctor.profile_picture.clone().unwrap_or_default(),
        "email": user.and_then(|u| u.email.clone()).unwrap_or_default(),
        "phone": user.and_then(|u| u.phone_number.clone()).unwrap_or_default(),
        "registrationFee": REGISTRATION_FEE,
        "dailyPatientLimit": DAILY_PATIENT_LIMIT
    })
}

/// Handles `doctor.auth.login`.
pub async fn login<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let request: LoginRequest = payload::parse(&data)?;
    let doctor_id = ExternalId::Employee.parse(&request.employee_id)?;

    let (doctor, user) =
        auth_service::authenticate_doctor(&state.pool, doctor_id, &request.password).await?;
    let token = state
        .sessions
        .issue(user.user_id, Role::Doctor, doctor.name.as_str());

    Ok(Reply::ok(
        "Login successful",
        json!({
            "token": token,
            "doctorId": ExternalId::Doctor.format(doctor.doctor_id),
            "name": doctor.name,
            "department": doctor.department
        }),
    ))
}

/// Handles `doctor.auth.resetPassword`. Same contract as the patient
/// variant, keyed by employee number.
pub async fn reset_password<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let request: ResetPasswordRequest = payload::parse(&data)?;
    let doctor_id = ExternalId::Employee.parse(&request.employee_id)?;
    validate_password(&request.new_password)?;

    let (doctor, user) =
        auth_service::authenticate_doctor(&state.pool, doctor_id, &request.old_password).await?;
    let password_hash = auth_service::hash_password(&request.new_password)?;
    user_repo::update_password(&state.pool, user.user_id, &password_hash).await?;

    let ended = state.sessions.revoke_user(user.user_id);
    tracing::info!("🔐 Doctor {} password reset ({} sessions ended)", doctor.doctor_id, ended);
    Ok(Reply::ok("Password reset successful", json!({})))
}

/// Handles `doctor.auth.logout`.
pub async fn logout<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (token, session) = require_session(&state.sessions, &data, Some(Role::Doctor))?;
    state.sessions.revoke(&token);
    tracing::info!("👋 Doctor {} logged out", session.user_id);
    Ok(Reply::ok("Logout successful", json!({})))
}

/// Handles `doctor.profile.get`.
pub async fn get_profile<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let doctor = current_doctor(&state, &session).await?;
    let user = user_repo::find_by_id(&state.pool, session.user_id).await?;

    Ok(Reply::ok(
        "Profile retrieved successfully",
        profile_json(&doctor, user.as_ref()),
    ))
}

/// Handles `doctor.profile.update`.
pub async fn update_profile<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let request: ProfileUpdateRequest = payload::parse(&data)?;

    let changes = DoctorProfileChanges {
        title: non_empty(request.title),
        working_hours: non_empty(request.working_hours),
        profile_picture: non_empty(request.photo_url),
    };
    let email = non_empty(request.email);
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let phone = non_empty(request.phone);
    if let Some(phone) = &phone {
        validate_phone(phone)?;
    }

    let doctor = current_doctor(&state, &session).await?;
    let doctor = if changes.is_empty() {
        doctor
    } else {
        doctor_repo::update_profile(&state.pool, doctor.doctor_id, &changes).await?
    };
    if email.is_some() || phone.is_some() {
        user_repo::update_contact(
            &state.pool,
            session.user_id,
            email.as_deref(),
            phone.as_deref(),
        )
        .await?;
    }
    let user = user_repo::find_by_id(&state.pool, session.user_id).await?;

    tracing::info!("✅ Doctor {} profile updated", doctor.doctor_id);
    Ok(Reply::ok(
        "Profile updated successfully",
        profile_json(&doctor, user.as_ref()),
    ))
}

/// Handles `doctor.appointment.list`.
pub async fn list_appointments<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let doctor = current_doctor(&state, &session).await?;
    let appointments = appointment_repo::list_for_doctor(&state.pool, doctor.doctor_id).await?;

    let appointments: Vec<Value> = appointments
        .iter()
        .map(|a| {
            json!({
                "appointmentId": ExternalId::Appointment.format(a.appointment_id),
                "patientId": ExternalId::Patient.format(a.patient_id),
                "patientName": a.patient_name,
                "appointmentTime": a.appointment_time,
                "status": a.status.as_api_str()
            })
        })
        .collect();

    Ok(Reply::ok(
        "Appointments retrieved successfully",
        json!({ "appointments": appointments }),
    ))
}

/// Handles `doctor.patient.getMedicalRecords`.
pub async fn patient_medical_records<C: Connector>(
    state: AppState<C>,
    data: Value,
) -> Result<Reply> {
    require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let request: PatientRequest = payload::parse(&data)?;
    let patient_id = ExternalId::Patient.parse(&request.patient_id)?;

    let patient = patient_repo::find_by_id(&state.pool, patient_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;
    let history = case_repo::history_for_patient(&state.pool, patient_id).await?;

    Ok(Reply::ok(
        "Medical records retrieved successfully",
        json!({
            "patientId": ExternalId::Patient.format(patient.patient_id),
            "name": patient.name,
            "gender": patient.gender.as_str(),
            "age": patient.age_on(today()),
            "idNumber": patient.id_number,
            "records": records_json(&history)
        }),
    ))
}

/// Handles `doctor.medicalRecord.create`: records a diagnosis in the doctor's
/// own department.
pub async fn create_medical_record<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let request: MedicalRecordCreateRequest = payload::parse(&data)?;
    let patient_id = ExternalId::Patient.parse(&request.patient_id)?;
    validate_required("diagnosis", &request.diagnosis)?;
    let doctor_advice = non_empty(request.doctor_advice);

    let doctor = current_doctor(&state, &session).await?;
    if patient_repo::find_by_id(&state.pool, patient_id).await?.is_none() {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }

    let case_id = case_repo::create(
        &state.pool,
        patient_id,
        &doctor.department,
        doctor.doctor_id,
        request.diagnosis.trim(),
        doctor_advice.as_deref(),
    )
    .await?;

    Ok(Reply::created(
        "Medical record created successfully",
        json!({ "recordId": ExternalId::Record.format(case_id) }),
    ))
}

/// Handles `doctor.prescription.create`: prescribes against the patient's
/// latest case.
pub async fn create_prescription<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Doctor))?;
    let request: PrescriptionCreateRequest = payload::parse(&data)?;
    let patient_id = ExternalId::Patient.parse(&request.patient_id)?;

    if request.medicines.is_empty() {
        return Err(AppError::Validation(
            "At least one medicine is required".to_string(),
        ));
    }
    let mut medicines = Vec::with_capacity(request.medicines.len());
    for medicine in request.medicines {
        validate_required("medicine name", &medicine.name)?;
        if medicine.quantity <= 0 {
            return Err(AppError::Validation(
                "Medicine quantity must be positive".to_string(),
            ));
        }
        medicines.push(NewMedication {
            name: medicine.name.trim().to_string(),
            dosage: medicine.dosage,
            frequency: medicine.frequency,
            quantity: medicine.quantity,
        });
    }

    let doctor = current_doctor(&state, &session).await?;
    let case = case_repo::latest_for_patient(&state.pool, patient_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Patient has no medical record to prescribe against".to_string())
        })?;

    let prescription_id = prescription_repo::create_with_medications(
        &state.pool,
        case.case_id,
        doctor.doctor_id,
        &medicines,
    )
    .await?;

    Ok(Reply::created(
        "Prescription created successfully",
        json!({
            "prescriptionId": ExternalId::Prescription.format(prescription_id),
            "recordId": ExternalId::Record.format(case.case_id)
        }),
    ))
}
