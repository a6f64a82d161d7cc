use serde::Deserialize;
use sonic_rs::{Value, json};

use crate::{
    db::connection::Connector,
    error::{AppError, Result},
    handlers::payload::{self, non_empty, today},
    middleware_layer::auth::require_session,
    models::{
        envelope::Reply,
        ids::ExternalId,
        medical_case::CaseHistoryEntry,
        patient::{Gender, NewPatient, Patient, PatientProfileChanges},
        session::{Role, Session},
        user::User,
    },
    repositories::{
        appointment as appointment_repo, doctor as doctor_repo, medical_case as case_repo,
        patient as patient_repo, prescription as prescription_repo,
        prescription::PrescriptionDetail, user as user_repo,
    },
    services::auth as auth_service,
    state::AppState,
    validation::auth::*,
};

/// The request payload for patient registration.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub id_card_number: String,
    pub date_of_birth: String,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

/// The request payload for patient login.
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    /// Username or email.
    pub account: String,
    pub password: String,
}

/// The request payload for `patient.auth.resetPassword`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// Username or email.
    pub account: String,
    pub old_password: String,
    pub new_password: String,
}

/// The request payload for `patient.profile.update`. Absent or empty fields
/// are left unchanged.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentCreateRequest {
    pub schedule_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionGetRequest {
    pub prescription_id: String,
}

/// Loads the patient record behind a patient session.
async fn current_patient<C: Connector>(state: &AppState<C>, session: &Session) -> Result<Patient> {
    patient_repo::find_by_user_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient profile not found".to_string()))
}

fn profile_json(patient: &Patient, user: Option<&User>) -> Value {
    json!({
        "patientId": ExternalId::Patient.format(patient.patient_id),
        "name": patient.name,
        "dateOfBirth": patient.birth_date.format("%Y-%m-%d").to_string(),
        "idCardNumber": patient.id_number,
        "phone": patient.phone_number.clone().unwrap_or_default(),
        "email": user.and_then(|u| u.email.clone()).unwrap_or_default(),
        "gender": patient.gender.as_str(),
        "age": patient.age_on(today())
    })
}

/// Renders case history entries as medical records.
pub(crate) fn records_json(history: &[CaseHistoryEntry]) -> Vec<Value> {
    history
        .iter()
        .map(|entry| {
            json!({
                "recordId": ExternalId::Record.format(entry.case_id),
                "date": entry.diagnosis_date,
                "department": entry.department,
                "attendingDoctor": entry.doctor_name,
                "diagnosis": entry.diagnosis,
                "doctorAdvice": entry.advice()
            })
        })
        .collect()
}

fn prescription_json(detail: &PrescriptionDetail) -> Value {
    let medicines: Vec<Value> = detail
        .medications
        .iter()
        .map(|m| {
            json!({
                "name": m.name,
                "quantity": m.quantity,
                "usage": m.usage_instructions
            })
        })
        .collect();

    json!({
        "prescriptionId": ExternalId::Prescription.format(detail.prescription.prescription_id),
        "recordId": ExternalId::Record.format(detail.prescription.case_id),
        "date": detail.prescription.issued_date,
        "diagnosis": detail.diagnosis,
        "content": detail.prescription.content,
        "medicines": medicines
    })
}

/// Handles `patient.auth.register`: creates the login account and patient
/// record together.
pub async fn register<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let request: RegisterRequest = payload::parse(&data)?;

    validate_email(&request.email)?;
    validate_password(&request.password)?;
    validate_required("name", &request.name)?;
    validate_id_number(&request.id_card_number)?;
    let birth_date = parse_date("dateOfBirth", &request.date_of_birth)?;
    if birth_date > today() {
        return Err(AppError::Validation(
            "dateOfBirth must not be in the future".to_string(),
        ));
    }
    let gender = match non_empty(request.gender) {
        Some(gender) => Gender::parse(&gender)?,
        None => Gender::default(),
    };
    let phone_number = non_empty(request.phone);
    if let Some(phone) = &phone_number {
        validate_phone(phone)?;
    }

    if user_repo::exists(&state.pool, &request.email, &request.email).await? {
        return Err(AppError::Conflict("User already exists".to_string()));
    }
    if patient_repo::exists_by_id_number(&state.pool, &request.id_card_number).await? {
        return Err(AppError::Conflict(
            "Identity card number is already registered".to_string(),
        ));
    }

    let new_patient = NewPatient {
        password_hash: auth_service::hash_password(&request.password)?,
        email: request.email,
        name: request.name.trim().to_string(),
        gender,
        birth_date,
        id_number: request.id_card_number.to_uppercase(),
        phone_number,
    };
    let patient = patient_repo::create_with_account(&state.pool, &new_patient).await?;

    Ok(Reply::created(
        "Registration successful",
        json!({ "userId": ExternalId::Patient.format(patient.patient_id) }),
    ))
}

/// Handles `patient.auth.login`.
pub async fn login<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let request: LoginRequest = payload::parse(&data)?;

    let user =
        auth_service::authenticate_patient(&state.pool, &request.account, &request.password)
            .await?;
    let patient = patient_repo::find_by_user_id(&state.pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient profile not found".to_string()))?;

    let token = state
        .sessions
        .issue(user.user_id, Role::Patient, patient.name.as_str());

    Ok(Reply::ok(
        "Login successful",
        json!({
            "token": token,
            "userId": ExternalId::Patient.format(patient.patient_id),
            "name": patient.name
        }),
    ))
}

/// Handles `patient.auth.resetPassword`: replaces the password once the
/// current one checks out, then ends every session of the account.
pub async fn reset_password<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let request: ResetPasswordRequest = payload::parse(&data)?;
    validate_password(&request.new_password)?;

    let user =
        auth_service::authenticate_patient(&state.pool, &request.account, &request.old_password)
            .await?;
    let password_hash = auth_service::hash_password(&request.new_password)?;
    user_repo::update_password(&state.pool, user.user_id, &password_hash).await?;

    let ended = state.sessions.revoke_user(user.user_id);
    tracing::info!("🔐 Patient {} password reset ({} sessions ended)", user.user_id, ended);
    Ok(Reply::ok("Password reset successful", json!({})))
}

/// Handles `patient.auth.logout`.
pub async fn logout<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (token, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    state.sessions.revoke(&token);
    tracing::info!("👋 Patient {} logged out", session.user_id);
    Ok(Reply::ok("Logout successful", json!({})))
}

/// Handles `patient.profile.get`.
pub async fn get_profile<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    let patient = current_patient(&state, &session).await?;
    let user = user_repo::find_by_id(&state.pool, session.user_id).await?;

    Ok(Reply::ok(
        "Profile retrieved successfully",
        profile_json(&patient, user.as_ref()),
    ))
}

/// Handles `patient.profile.update`.
pub async fn update_profile<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    let request: ProfileUpdateRequest = payload::parse(&data)?;

    let changes = PatientProfileChanges {
        name: non_empty(request.name).map(|name| name.trim().to_string()),
        birth_date: non_empty(request.date_of_birth)
            .map(|date| parse_date("dateOfBirth", &date))
            .transpose()?,
        phone_number: non_empty(request.phone),
    };
    if let Some(phone) = &changes.phone_number {
        validate_phone(phone)?;
    }
    let email = non_empty(request.email);
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let patient = current_patient(&state, &session).await?;
    let patient = if changes.is_empty() {
        patient
    } else {
        patient_repo::update_profile(&state.pool, patient.patient_id, &changes).await?
    };
    if email.is_some() {
        user_repo::update_contact(&state.pool, session.user_id, email.as_deref(), None).await?;
    }
    let user = user_repo::find_by_id(&state.pool, session.user_id).await?;

    tracing::info!("✅ Patient {} profile updated", patient.patient_id);
    Ok(Reply::ok(
        "Profile updated successfully",
        profile_json(&patient, user.as_ref()),
    ))
}

/// Handles `patient.appointment.create`: books with the doctor behind a
/// schedule.
pub async fn create_appointment<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    let request: AppointmentCreateRequest = payload::parse(&data)?;
    let doctor_id = ExternalId::Schedule.parse(&request.schedule_id)?;

    let patient = current_patient(&state, &session).await?;
    let doctor = doctor_repo::find_by_id(&state.pool, doctor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    let appointment_id = appointment_repo::create(
        &state.pool,
        patient.patient_id,
        doctor.doctor_id,
        &doctor.department,
    )
    .await?;

    Ok(Reply::created(
        "Appointment booked successfully",
        json!({
            "appointmentId": ExternalId::Appointment.format(appointment_id),
            "status": "scheduled"
        }),
    ))
}

/// Handles `patient.medicalRecord.list`.
pub async fn list_medical_records<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    let patient = current_patient(&state, &session).await?;
    let history = case_repo::history_for_patient(&state.pool, patient.patient_id).await?;

    Ok(Reply::ok(
        "Medical records retrieved successfully",
        json!({ "records": records_json(&history) }),
    ))
}

/// Handles `patient.prescription.list`.
pub async fn list_prescriptions<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    let patient = current_patient(&state, &session).await?;
    let prescriptions =
        prescription_repo::list_for_patient(&state.pool, patient.patient_id).await?;

    let prescriptions: Vec<Value> = prescriptions.iter().map(prescription_json).collect();
    Ok(Reply::ok(
        "Prescriptions retrieved successfully",
        json!({ "prescriptions": prescriptions }),
    ))
}

/// Handles `patient.prescription.get`. Patients only see their own
/// prescriptions.
pub async fn get_prescription<C: Connector>(state: AppState<C>, data: Value) -> Result<Reply> {
    let (_, session) = require_session(&state.sessions, &data, Some(Role::Patient))?;
    let request: PrescriptionGetRequest = payload::parse(&data)?;
    let prescription_id = ExternalId::Prescription.parse(&request.prescription_id)?;

    let detail = prescription_repo::find_detail(&state.pool, prescription_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Prescription not found".to_string()))?;

    let patient = current_patient(&state, &session).await?;
    if detail.patient_id != patient.patient_id {
        return Err(AppError::Forbidden(
            "No access to this prescription".to_string(),
        ));
    }

    Ok(Reply::ok(
        "Prescription retrieved successfully",
        prescription_json(&detail),
    ))
}
