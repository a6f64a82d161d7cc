use crate::error::{AppError, Result};

/// The lifecycle state of an appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppointmentStatus {
    Booked,
    Attended,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "Booked",
            AppointmentStatus::Attended => "Attended",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_db_str(value: &str) -> Result<Self> {
        match value {
            "Booked" => Ok(AppointmentStatus::Booked),
            "Attended" => Ok(AppointmentStatus::Attended),
            "Cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppError::MissingData(format!("unknown appointment status {}", other))),
        }
    }

    /// The status name reported to clients.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "scheduled",
            AppointmentStatus::Attended => "attended",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

/// An appointment as seen from the doctor's list.
#[derive(Clone, Debug)]
pub struct DoctorAppointment {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub appointment_time: String,
    pub status: AppointmentStatus,
}
