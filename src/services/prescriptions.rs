use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::db::{medicines, patients, prescriptions, staff, treatment_history};
use crate::models::prescriptions::{
    CreatePrescriptionRequest, PrescriptionStatus, PrescriptionWithItems,
};
use crate::services::stock;

fn not_pending(status: PrescriptionStatus) -> AppError {
    AppError::bad_request(
        ErrorCode::PrescriptionNotPending,
        format!(
            "Prescription is {} and can no longer change",
            status.as_str().to_lowercase()
        ),
    )
}

#[tracing::instrument(name = "Create prescription", skip(pool, request))]
pub async fn create(
    pool: &PgPool,
    clinic_id: Uuid,
    doctor_id: Uuid,
    request: &CreatePrescriptionRequest,
) -> Result<PrescriptionWithItems, AppError> {
    if request.items.is_empty() {
        return Err(AppError::bad_request(
            ErrorCode::ValidationError,
            "A prescription needs at least one item",
        ));
    }

    let mut tx = pool.begin().await?;
    patients::get_patient_by_id(&mut *tx, clinic_id, request.patient_id).await?;
    staff::get_doctor(&mut *tx, clinic_id, doctor_id).await?;
    if let Some(history_id) = request.treatment_history_id {
        let history = treatment_history::get_history_by_id(&mut *tx, clinic_id, history_id).await?;
        if history.patient_id != request.patient_id {
            return Err(AppError::bad_request(
                ErrorCode::ValidationError,
                "The treatment record belongs to a different patient",
            ));
        }
    }

    let prescription = prescriptions::insert_prescription(
        &mut *tx,
        clinic_id,
        request.patient_id,
        doctor_id,
        request.treatment_history_id,
        request.notes.as_deref(),
    )
    .await?;

    let mut items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        medicines::get_medicine_by_id(&mut *tx, clinic_id, item.medicine_id).await?;
        items.push(prescriptions::insert_item(&mut *tx, prescription.id, item).await?);
    }

    tx.commit().await?;
    Ok(PrescriptionWithItems {
        prescription,
        items,
    })
}

pub async fn get_with_items(
    pool: &PgPool,
    clinic_id: Uuid,
    prescription_id: Uuid,
) -> Result<PrescriptionWithItems, AppError> {
    let prescription =
        prescriptions::get_prescription_by_id(pool, clinic_id, prescription_id).await?;
    let items = prescriptions::get_items(pool, prescription.id).await?;
    Ok(PrescriptionWithItems {
        prescription,
        items,
    })
}

/// Deduct every item FIFO from stock and mark the prescription dispensed,
/// all in one transaction. Any shortage rolls the whole dispense back.
#[tracing::instrument(name = "Dispense prescription", skip(pool))]
pub async fn dispense(
    pool: &PgPool,
    clinic_id: Uuid,
    prescription_id: Uuid,
    dispensed_by: Uuid,
) -> Result<PrescriptionWithItems, AppError> {
    let mut tx = pool.begin().await?;
    let prescription =
        prescriptions::lock_prescription(&mut *tx, clinic_id, prescription_id).await?;
    if prescription.status != PrescriptionStatus::Pending {
        return Err(not_pending(prescription.status));
    }

    let today = Utc::now().date_naive();
    let items = prescriptions::get_items(&mut *tx, prescription.id).await?;
    for item in &items {
        let batches = medicines::lock_medicine_batches(&mut *tx, clinic_id, item.medicine_id).await?;
        let plan = stock::plan_fifo_deduction(&batches, item.quantity, today)?;
        for deduction in plan {
            medicines::deduct_from_batch(&mut *tx, deduction.batch_id, deduction.quantity).await?;
        }
    }

    let prescription = prescriptions::close_pending(
        &mut *tx,
        prescription.id,
        PrescriptionStatus::Dispensed,
        Some(dispensed_by),
    )
    .await?
    .ok_or_else(|| not_pending(prescription.status))?;

    tx.commit().await?;
    tracing::info!(prescription_id = %prescription.id, items = items.len(), "prescription dispensed");

    Ok(PrescriptionWithItems {
        prescription,
        items,
    })
}

#[tracing::instrument(name = "Cancel prescription", skip(pool))]
pub async fn cancel(
    pool: &PgPool,
    clinic_id: Uuid,
    prescription_id: Uuid,
) -> Result<PrescriptionWithItems, AppError> {
    let current = prescriptions::get_prescription_by_id(pool, clinic_id, prescription_id).await?;
    let prescription =
        prescriptions::close_pending(pool, current.id, PrescriptionStatus::Cancelled, None)
            .await?
            .ok_or_else(|| not_pending(current.status))?;
    let items = prescriptions::get_items(pool, prescription.id).await?;

    Ok(PrescriptionWithItems {
        prescription,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{self, Tenant};
    use crate::models::prescriptions::PrescriptionItemRequest;
    use chrono::{Duration, NaiveDate};
    use claim::{assert_err, assert_ok};

    async fn prescribe(
        pool: &PgPool,
        tenant: &Tenant,
        treatment_history_id: Option<Uuid>,
        medicine_id: Uuid,
        quantity: i32,
    ) -> Result<PrescriptionWithItems, AppError> {
        let request = CreatePrescriptionRequest {
            patient_id: tenant.patient_id,
            treatment_history_id,
            notes: None,
            items: vec![PrescriptionItemRequest {
                medicine_id,
                quantity,
                dosage: "1 capsule".to_string(),
                frequency: Some("3 times daily".to_string()),
                duration_days: Some(5),
                instructions: None,
            }],
        };
        create(pool, tenant.clinic_id, tenant.doctor_id, &request).await
    }

    async fn batch(pool: &PgPool, tenant: &Tenant, medicine: Uuid, qty: i32, days: i64) -> Uuid {
        let expiry: NaiveDate = Utc::now().date_naive() + Duration::days(days);
        fixtures::insert_batch(pool, tenant.clinic_id, medicine, qty, expiry).await
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn dispense_draws_from_the_earliest_expiring_batch_first(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let medicine = fixtures::insert_medicine(&pool, tenant.clinic_id).await;
        let late = batch(&pool, &tenant, medicine, 50, 300).await;
        let soon = batch(&pool, &tenant, medicine, 10, 30).await;
        let expired = batch(&pool, &tenant, medicine, 99, -1).await;

        let created = assert_ok!(prescribe(&pool, &tenant, None, medicine, 15).await);
        let id = created.prescription.id;
        let dispensed = assert_ok!(dispense(&pool, tenant.clinic_id, id, tenant.owner_id).await);
        assert_eq!(dispensed.prescription.status, PrescriptionStatus::Dispensed);
        assert_eq!(dispensed.prescription.dispensed_by, Some(tenant.owner_id));

        assert_eq!(fixtures::batch_quantity(&pool, soon).await, 0);
        assert_eq!(fixtures::batch_quantity(&pool, late).await, 45);
        assert_eq!(fixtures::batch_quantity(&pool, expired).await, 99);

        let error = assert_err!(dispense(&pool, tenant.clinic_id, id, tenant.owner_id).await);
        assert_eq!(error.code, ErrorCode::PrescriptionNotPending);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn shortage_leaves_stock_and_prescription_untouched(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let medicine = fixtures::insert_medicine(&pool, tenant.clinic_id).await;
        let only = batch(&pool, &tenant, medicine, 5, 90).await;

        let created = assert_ok!(prescribe(&pool, &tenant, None, medicine, 6).await);
        let id = created.prescription.id;
        let error = assert_err!(dispense(&pool, tenant.clinic_id, id, tenant.owner_id).await);
        assert_eq!(error.code, ErrorCode::InsufficientStock);

        assert_eq!(fixtures::batch_quantity(&pool, only).await, 5);
        let current = assert_ok!(get_with_items(&pool, tenant.clinic_id, id).await);
        assert_eq!(current.prescription.status, PrescriptionStatus::Pending);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn treatment_record_must_belong_to_the_clinic_and_patient(pool: PgPool) {
        let ours = fixtures::seed_tenant(&pool).await;
        let theirs = fixtures::seed_tenant(&pool).await;
        let medicine = fixtures::insert_medicine(&pool, ours.clinic_id).await;

        let foreign = fixtures::insert_history(&pool, &theirs, theirs.patient_id).await;
        let error = assert_err!(prescribe(&pool, &ours, Some(foreign), medicine, 1).await);
        assert_eq!(error.code, ErrorCode::TreatmentHistoryNotFound);

        let sibling = fixtures::insert_patient(&pool, ours.clinic_id).await;
        let siblings_visit = fixtures::insert_history(&pool, &ours, sibling).await;
        let error = assert_err!(prescribe(&pool, &ours, Some(siblings_visit), medicine, 1).await);
        assert_eq!(error.code, ErrorCode::ValidationError);

        let own_visit = fixtures::insert_history(&pool, &ours, ours.patient_id).await;
        let created = assert_ok!(prescribe(&pool, &ours, Some(own_visit), medicine, 1).await);
        assert_eq!(created.prescription.treatment_history_id, Some(own_visit));
    }
}
