/// Represents a prescription issued against a case.
#[derive(Clone, Debug)]
pub struct Prescription {
    pub prescription_id: i64,
    pub case_id: i64,
    pub doctor_id: i64,
    /// Human-readable summary of the medicines, one `name dosage frequency;`
    /// group per medicine.
    pub content: String,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub issued_date: String,
}

/// One medicine line on a prescription.
#[derive(Clone, Debug)]
pub struct Medication {
    pub medication_id: i64,
    pub prescription_id: i64,
    pub name: String,
    pub quantity: i64,
    pub usage_instructions: String,
}

/// A medicine line to be written with a new prescription.
#[derive(Clone, Debug)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub quantity: i64,
}

/// Builds the prescription summary stored alongside its medications.
pub fn summarize(medicines: &[NewMedication]) -> String {
    medicines
        .iter()
        .map(|m| format!("{} {} {}; ", m.name, m.dosage, m.frequency))
        .collect()
}
