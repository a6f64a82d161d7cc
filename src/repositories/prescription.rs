use std::collections::HashMap;

use crate::{
    db::{
        connection::{Connection, Connector},
        pool::ConnectionPool,
        statement::{Record, Statement},
    },
    error::{AppError, Result},
    models::prescription::{Medication, NewMedication, Prescription, summarize},
};

/// A prescription with its case diagnosis and medicine lines.
#[derive(Clone, Debug)]
pub struct PrescriptionDetail {
    pub prescription: Prescription,
    pub patient_id: i64,
    pub diagnosis: String,
    pub medications: Vec<Medication>,
}

/// A helper function to map a `Record` to a `Prescription`.
fn row_to_prescription(row: &Record) -> Result<Prescription> {
    Ok(Prescription {
        prescription_id: row.int("prescription_id")?,
        case_id: row.int("case_id")?,
        doctor_id: row.int("doctor_id")?,
        content: row.text("prescription_content")?,
        issued_date: row.text("issued_date")?,
    })
}

fn row_to_medication(row: &Record) -> Result<Medication> {
    Ok(Medication {
        medication_id: row.int("medication_id")?,
        prescription_id: row.int("prescription_id")?,
        name: row.text("medication_name")?,
        quantity: row.int("quantity")?,
        usage_instructions: row.text("usage_instructions")?,
    })
}

async fn insert_with_medications<C: Connector>(
    conn: &mut Connection<C>,
    case_id: i64,
    doctor_id: i64,
    medicines: &[NewMedication],
) -> Result<i64> {
    conn.begin().await?;

    let statement = Statement::new(
        r#"
        INSERT INTO prescriptions (case_id, doctor_id, prescription_content)
        VALUES ($1, $2, $3)
        RETURNING prescription_id
        "#,
    )
    .bind(case_id)
    .bind(doctor_id)
    .bind(summarize(medicines));

    let prescription_id = conn
        .query_opt(&statement)
        .await?
        .ok_or_else(|| AppError::MissingData("prescription_id".to_string()))?
        .int("prescription_id")?;

    for medicine in medicines {
        let statement = Statement::new(
            r#"
            INSERT INTO medications (prescription_id, medication_name, quantity, usage_instructions)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(prescription_id)
        .bind(medicine.name.as_str())
        .bind(medicine.quantity)
        .bind(medicine.frequency.as_str());
        conn.execute(&statement).await?;
    }

    Ok(prescription_id)
}

/// Issues a prescription and its medicine lines in one transaction.
pub async fn create_with_medications<C: Connector>(
    pool: &ConnectionPool<C>,
    case_id: i64,
    doctor_id: i64,
    medicines: &[NewMedication],
) -> Result<i64> {
    let mut conn = pool.acquire().await?;
    let result = insert_with_medications(&mut conn, case_id, doctor_id, medicines).await;
    let result = conn.finish(result).await;
    pool.release(conn).await;

    let prescription_id = result?;
    tracing::info!(
        "✅ Prescription created with ID: {} ({} medicines)",
        prescription_id,
        medicines.len()
    );
    Ok(prescription_id)
}

/// Medicine lines of one prescription.
pub async fn medications_for<C: Connector>(
    pool: &ConnectionPool<C>,
    prescription_id: i64,
) -> Result<Vec<Medication>> {
    let statement = Statement::new(
        r#"
        SELECT medication_id, prescription_id, medication_name, quantity, usage_instructions
        FROM medications
        WHERE prescription_id = $1
        ORDER BY medication_id
        "#,
    )
    .bind(prescription_id);
    pool.query(&statement)
        .await?
        .iter()
        .map(row_to_medication)
        .collect()
}

/// Finds a prescription together with the patient and diagnosis of its case.
pub async fn find_detail<C: Connector>(
    pool: &ConnectionPool<C>,
    prescription_id: i64,
) -> Result<Option<PrescriptionDetail>> {
    let statement = Statement::new(
        r#"
        SELECT p.prescription_id, p.case_id, p.doctor_id, p.prescription_content,
               p.issued_date, c.patient_id, c.diagnosis
        FROM prescriptions p
        JOIN cases c ON p.case_id = c.case_id
        WHERE p.prescription_id = $1
        "#,
    )
    .bind(prescription_id);

    let Some(row) = pool.query_opt(&statement).await? else {
        return Ok(None);
    };

    let medications = medications_for(pool, prescription_id).await?;
    Ok(Some(PrescriptionDetail {
        prescription: row_to_prescription(&row)?,
        patient_id: row.int("patient_id")?,
        diagnosis: row.text("diagnosis")?,
        medications,
    }))
}

/// Every prescription issued to a patient, newest first.
pub async fn list_for_patient<C: Connector>(
    pool: &ConnectionPool<C>,
    patient_id: i64,
) -> Result<Vec<PrescriptionDetail>> {
    let statement = Statement::new(
        r#"
        SELECT p.prescription_id, p.case_id, p.doctor_id, p.prescription_content,
               p.issued_date, c.patient_id, c.diagnosis
        FROM prescriptions p
        JOIN cases c ON p.case_id = c.case_id
        WHERE c.patient_id = $1
        ORDER BY p.issued_date DESC, p.prescription_id DESC
        "#,
    )
    .bind(patient_id);
    let rows = pool.query(&statement).await?;

    let statement = Statement::new(
        r#"
        SELECT m.medication_id, m.prescription_id, m.medication_name, m.quantity,
               m.usage_instructions
        FROM medications m
        JOIN prescriptions p ON m.prescription_id = p.prescription_id
        JOIN cases c ON p.case_id = c.case_id
        WHERE c.patient_id = $1
        ORDER BY m.medication_id
        "#,
    )
    .bind(patient_id);

    let mut medications: HashMap<i64, Vec<Medication>> = HashMap::new();
    for row in pool.query(&statement).await? {
        let medication = row_to_medication(&row)?;
        medications
            .entry(medication.prescription_id)
            .or_default()
            .push(medication);
    }

    rows.iter()
        .map(|row| {
            let prescription = row_to_prescription(row)?;
            Ok(PrescriptionDetail {
                medications: medications
                    .remove(&prescription.prescription_id)
                    .unwrap_or_default(),
                patient_id: row.int("patient_id")?,
                diagnosis: row.text("diagnosis")?,
                prescription,
            })
        })
        .collect()
}
