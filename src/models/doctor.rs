/// Represents a doctor's staff record.
#[derive(Clone, Debug)]
pub struct Doctor {
    /// The unique identifier for the doctor.
    pub doctor_id: i64,
    /// The login account of the doctor.
    pub user_id: i64,
    pub name: String,
    pub department: String,
    /// Professional title, e.g. "Chief Physician".
    pub title: Option<String>,
    /// Free-form consulting hours, shown as the schedule time period.
    pub working_hours: String,
    pub profile_picture: Option<String>,
}

/// Registration fee shown in schedules and doctor profiles.
pub const REGISTRATION_FEE: f64 = 50.0;

/// Number of appointments a doctor accepts.
pub const DAILY_PATIENT_LIMIT: i64 = 30;

/// Fields a doctor may change on their own profile. `None` leaves a field
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct DoctorProfileChanges {
    pub title: Option<String>,
    pub working_hours: Option<String>,
    pub profile_picture: Option<String>,
}

impl DoctorProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.working_hours.is_none() && self.profile_picture.is_none()
    }
}

/// A doctor to be created together with a login account.
#[derive(Clone, Debug)]
pub struct NewDoctor {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub department: String,
    pub title: Option<String>,
    pub working_hours: String,
}
