//! External identifiers. Row ids are exposed to clients with a type prefix,
//! e.g. patient 12 is `pat_12` and its doctor's employee number is `DOC3`.

use crate::error::{AppError, Result};

/// The kinds of prefixed identifiers the API accepts and returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternalId {
    Patient,
    Doctor,
    Employee,
    Schedule,
    Appointment,
    Record,
    Prescription,
}

impl ExternalId {
    pub fn prefix(&self) -> &'static str {
        match self {
            ExternalId::Patient => "pat_",
            ExternalId::Doctor => "doc_",
            ExternalId::Employee => "DOC",
            ExternalId::Schedule => "sched_",
            ExternalId::Appointment => "appt_",
            ExternalId::Record => "rec_",
            ExternalId::Prescription => "presc_",
        }
    }

    fn field(&self) -> &'static str {
        match self {
            ExternalId::Patient => "patientId",
            ExternalId::Doctor => "doctorId",
            ExternalId::Employee => "employeeId",
            ExternalId::Schedule => "scheduleId",
            ExternalId::Appointment => "appointmentId",
            ExternalId::Record => "recordId",
            ExternalId::Prescription => "prescriptionId",
        }
    }

    pub fn format(&self, id: i64) -> String {
        format!("{}{}", self.prefix(), id)
    }

    /// Strips the prefix and parses the row id.
    ///
    /// Fails with `Validation` unless the input is the prefix followed by a
    /// positive decimal number.
    pub fn parse(&self, external: &str) -> Result<i64> {
        let invalid = || AppError::Validation(format!("Invalid {} format", self.field()));

        let digits = external.strip_prefix(self.prefix()).ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        match digits.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_prefix() {
        assert_eq!(ExternalId::Patient.format(12), "pat_12");
        assert_eq!(ExternalId::Employee.format(3), "DOC3");
        assert_eq!(ExternalId::Prescription.format(7), "presc_7");
    }

    #[test]
    fn parses_well_formed_ids() {
        assert_eq!(ExternalId::Schedule.parse("sched_45").unwrap(), 45);
        assert_eq!(ExternalId::Employee.parse("DOC3").unwrap(), 3);
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "pat_",
            "doc_12",
            "pat_-1",
            "pat_0",
            "pat_1x",
            "pat_ 1",
            "pat_99999999999999999999",
        ] {
            let err = ExternalId::Patient.parse(bad).unwrap_err();
            assert_eq!(err.code(), 400, "{bad}");
        }
    }
}
