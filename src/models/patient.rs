use chrono::{Datelike, NaiveDate};

use crate::error::{AppError, Result};

/// A patient's recorded gender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }

    /// Parses a client-supplied gender.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            _ => Err(AppError::Validation(
                "Gender must be Male or Female".to_string(),
            )),
        }
    }

    /// Reads the stored column value. Anything but `Female` reads as `Male`.
    pub fn from_db_str(value: &str) -> Self {
        if value == "Female" {
            Gender::Female
        } else {
            Gender::Male
        }
    }
}

/// Represents a patient record.
#[derive(Clone, Debug)]
pub struct Patient {
    /// The unique identifier for the patient.
    pub patient_id: i64,
    /// The login account of the patient.
    pub user_id: i64,
    pub name: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    /// The 18-character national identity card number.
    pub id_number: String,
    pub phone_number: Option<String>,
}

impl Patient {
    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        let mut age = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            age -= 1;
        }
        age.max(0)
    }
}

/// Everything needed to create a patient and its login account.
#[derive(Clone, Debug)]
pub struct NewPatient {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    pub id_number: String,
    pub phone_number: Option<String>,
}

/// Fields a patient may change on their own profile. `None` leaves a field
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct PatientProfileChanges {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone_number: Option<String>,
}

impl PatientProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.birth_date.is_none() && self.phone_number.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(birth_date: NaiveDate) -> Patient {
        Patient {
            patient_id: 1,
            user_id: 1,
            name: "Li Wei".to_string(),
            gender: Gender::Male,
            birth_date,
            id_number: "110101199003071234".to_string(),
            phone_number: None,
        }
    }

    #[test]
    fn age_counts_completed_years() {
        let p = patient(NaiveDate::from_ymd_opt(1990, 3, 7).unwrap());
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()), 33);
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()), 34);
    }

    #[test]
    fn gender_parsing() {
        assert_eq!(Gender::parse("Female").unwrap(), Gender::Female);
        assert!(Gender::parse("female").is_err());
        assert_eq!(Gender::from_db_str("unknown"), Gender::Male);
    }
}
