/// Represents a diagnosis recorded by a doctor for a patient.
#[derive(Clone, Debug)]
pub struct MedicalCase {
    pub case_id: i64,
    pub patient_id: i64,
    pub department: String,
    pub doctor_id: i64,
    pub diagnosis: String,
    pub doctor_advice: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub diagnosis_date: String,
}

/// A case joined with the name of the diagnosing doctor.
#[derive(Clone, Debug)]
pub struct CaseHistoryEntry {
    pub case_id: i64,
    pub diagnosis: String,
    pub doctor_advice: Option<String>,
    pub diagnosis_date: String,
    pub doctor_name: String,
    pub department: String,
}

impl CaseHistoryEntry {
    /// The recorded advice, or the standard advice when none was given.
    pub fn advice(&self) -> &str {
        self.doctor_advice
            .as_deref()
            .filter(|advice| !advice.is_empty())
            .unwrap_or(DEFAULT_DOCTOR_ADVICE)
    }
}

/// Advice shown for records created without any.
pub const DEFAULT_DOCTOR_ADVICE: &str =
    "Take medication as prescribed and return for regular check-ups";
