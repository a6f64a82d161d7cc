use crate::{
    db::connection::Connector,
    error::Result,
    handlers::{doctor, patient, public, system},
    services::dispatcher::Dispatcher,
    state::AppState,
};

/// Builds the application's route table.
///
/// # Returns
///
/// The frozen dispatcher, or `DuplicateRoute` if two handlers share a name.
pub fn route_table<C: Connector>() -> Result<Dispatcher<AppState<C>>> {
    Ok(Dispatcher::builder()
        // Public
        .register("public.schedule.list", public::list_schedules::<C>)?
        .register("public.doctor.get", public::get_doctor::<C>)?
        // Patient
        .register("patient.auth.register", patient::register::<C>)?
        .register("patient.auth.login", patient::login::<C>)?
        .register("patient.auth.logout", patient::logout::<C>)?
        .register("patient.auth.resetPassword", patient::reset_password::<C>)?
        .register("patient.profile.get", patient::get_profile::<C>)?
        .register("patient.profile.update", patient::update_profile::<C>)?
        .register("patient.appointment.create", patient::create_appointment::<C>)?
        .register("patient.medicalRecord.list", patient::list_medical_records::<C>)?
        .register("patient.prescription.list", patient::list_prescriptions::<C>)?
        .register("patient.prescription.get", patient::get_prescription::<C>)?
        // Doctor
        .register("doctor.auth.login", doctor::login::<C>)?
        .register("doctor.auth.logout", doctor::logout::<C>)?
        .register("doctor.auth.resetPassword", doctor::reset_password::<C>)?
        .register("doctor.profile.get", doctor::get_profile::<C>)?
        .register("doctor.profile.update", doctor::update_profile::<C>)?
        .register("doctor.appointment.list", doctor::list_appointments::<C>)?
        .register("doctor.patient.getMedicalRecords", doctor::patient_medical_records::<C>)?
        .register("doctor.medicalRecord.create", doctor::create_medical_record::<C>)?
        .register("doctor.prescription.create", doctor::create_prescription::<C>)?
        // System
        .register("system.stats", system::get_stats::<C>)?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::postgres::PgConnector;

    #[test]
    fn every_api_is_registered_once() {
        let dispatcher = route_table::<PgConnector>().unwrap();
        assert_eq!(dispatcher.len(), 22);
        assert!(dispatcher.contains("patient.auth.login"));
        assert!(dispatcher.contains("patient.auth.resetPassword"));
        assert!(dispatcher.contains("doctor.auth.resetPassword"));
        assert!(dispatcher.contains("doctor.prescription.create"));
        assert!(dispatcher.contains("system.stats"));
        assert!(!dispatcher.contains("patient.chat.send"));
    }
}
