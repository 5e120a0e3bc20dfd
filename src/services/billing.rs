use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::core::{generate_document_number, AppError, ErrorCode};
use crate::db::{appointments, bills, patients};
use crate::models::bills::{
    Bill, BillDetails, BillItemRequest, BillStatus, CreateBillRequest, PaymentResult, Receipt,
    RecordPaymentRequest, Transaction,
};

// Fresh random numbers tried before giving up on a bill or receipt insert.
const NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BillTotals {
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub total: BigDecimal,
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

pub fn line_total(quantity: i32, unit_price: &BigDecimal) -> BigDecimal {
    (BigDecimal::from(quantity) * unit_price).round(2)
}

/// Subtotal of all lines, minus the discount, floored at zero.
pub fn compute_totals(
    items: &[BillItemRequest],
    discount: Option<&BigDecimal>,
) -> Result<BillTotals, AppError> {
    if items.is_empty() {
        return Err(AppError::bad_request(
            ErrorCode::ValidationError,
            "A bill needs at least one item",
        ));
    }
    if items.iter().any(|item| item.unit_price < zero()) {
        return Err(AppError::bad_request(
            ErrorCode::InvalidAmount,
            "Unit price cannot be negative",
        ));
    }

    let discount = discount.cloned().unwrap_or_else(zero).round(2);
    if discount < zero() {
        return Err(AppError::bad_request(
            ErrorCode::InvalidDiscount,
            "Discount cannot be negative",
        ));
    }

    let subtotal = items
        .iter()
        .map(|item| line_total(item.quantity, &item.unit_price))
        .fold(zero(), |acc, line| acc + line);

    let total = if discount >= subtotal {
        zero()
    } else {
        &subtotal - &discount
    };

    Ok(BillTotals {
        subtotal,
        discount,
        total,
    })
}

/// Status implied by cumulative payments against the bill total.
pub fn payment_status(total: &BigDecimal, amount_paid: &BigDecimal) -> BillStatus {
    if *amount_paid >= *total {
        BillStatus::Paid
    } else if *amount_paid > zero() {
        BillStatus::Partial
    } else {
        BillStatus::Unpaid
    }
}

pub fn balance(bill: &Bill) -> BigDecimal {
    let outstanding = &bill.total_amount - &bill.amount_paid;
    if outstanding < zero() {
        zero()
    } else {
        outstanding
    }
}

/// Round `amount` to cents and check it against the bill; returns the amount to record.
pub fn validate_payment(bill: &Bill, amount: &BigDecimal) -> Result<BigDecimal, AppError> {
    let amount = amount.round(2);
    if amount <= zero() {
        return Err(AppError::bad_request(
            ErrorCode::InvalidAmount,
            "Payment amount must be greater than zero",
        ));
    }
    if matches!(bill.status, BillStatus::Cancelled | BillStatus::Paid) {
        return Err(AppError::bad_request(
            ErrorCode::BillNotPayable,
            format!("Bill is already {}", bill.status.as_str().to_lowercase()),
        ));
    }
    let outstanding = balance(bill);
    if amount > outstanding {
        return Err(AppError::bad_request(
            ErrorCode::Overpayment,
            format!("Payment exceeds the outstanding balance of {}", outstanding),
        ));
    }
    Ok(amount)
}

fn document_numbers(prefix: &'static str) -> impl Iterator<Item = String> {
    let today = Utc::now().date_naive();
    std::iter::repeat_with(move || generate_document_number(prefix, today)).take(NUMBER_ATTEMPTS)
}

/// Insert the bill under the first number from `numbers` that is still free.
async fn insert_numbered_bill(
    conn: &mut PgConnection,
    numbers: impl IntoIterator<Item = String>,
    clinic_id: Uuid,
    created_by: Uuid,
    request: &CreateBillRequest,
    totals: &BillTotals,
) -> Result<Bill, AppError> {
    let status = payment_status(&totals.total, &zero());
    for number in numbers {
        let inserted = bills::insert_bill(
            &mut *conn,
            clinic_id,
            request.patient_id,
            request.appointment_id,
            &number,
            totals,
            status,
            request.notes.as_deref(),
            created_by,
        )
        .await?;
        match inserted {
            Some(bill) => return Ok(bill),
            None => tracing::warn!(bill_number = %number, "bill number taken, retrying"),
        }
    }
    Err(AppError::internal_error("could not allocate a unique bill number"))
}

/// Issue the receipt under the first number from `numbers` that is still free.
async fn issue_receipt(
    conn: &mut PgConnection,
    numbers: impl IntoIterator<Item = String>,
    transaction: &Transaction,
) -> Result<Receipt, AppError> {
    for number in numbers {
        match bills::insert_receipt(&mut *conn, transaction, &number).await? {
            Some(receipt) => return Ok(receipt),
            None => tracing::warn!(receipt_number = %number, "receipt number taken, retrying"),
        }
    }
    Err(AppError::internal_error("could not allocate a unique receipt number"))
}

#[tracing::instrument(name = "Create bill", skip(pool, request))]
pub async fn create_bill(
    pool: &PgPool,
    clinic_id: Uuid,
    created_by: Uuid,
    request: &CreateBillRequest,
) -> Result<BillDetails, AppError> {
    let totals = compute_totals(&request.items, request.discount.as_ref())?;

    let mut tx = pool.begin().await?;
    patients::get_patient_by_id(&mut *tx, clinic_id, request.patient_id).await?;
    if let Some(appointment_id) = request.appointment_id {
        let appointment =
            appointments::get_appointment_by_id(&mut *tx, clinic_id, appointment_id).await?;
        if appointment.patient_id != request.patient_id {
            return Err(AppError::bad_request(
                ErrorCode::ValidationError,
                "The appointment belongs to a different patient",
            ));
        }
    }

    let bill = insert_numbered_bill(
        &mut tx,
        document_numbers("B"),
        clinic_id,
        created_by,
        request,
        &totals,
    )
    .await?;

    let mut items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        items.push(bills::insert_bill_item(&mut *tx, bill.id, item).await?);
    }

    tx.commit().await?;
    tracing::info!(bill_number = %bill.bill_number, total = %bill.total_amount, "bill created");

    Ok(BillDetails {
        balance: balance(&bill),
        bill,
        items,
        payments: Vec::new(),
    })
}

pub async fn get_details(
    pool: &PgPool,
    clinic_id: Uuid,
    bill_id: Uuid,
) -> Result<BillDetails, AppError> {
    let bill = bills::get_bill_by_id(pool, clinic_id, bill_id).await?;
    let items = bills::get_bill_items(pool, bill.id).await?;
    let payments = bills::get_bill_transactions(pool, bill.id).await?;

    Ok(BillDetails {
        balance: balance(&bill),
        bill,
        items,
        payments,
    })
}

/// Record a payment, update the bill's paid amount and status, and issue a receipt
/// in a single transaction.
#[tracing::instrument(name = "Record payment", skip(pool, request))]
pub async fn record_payment(
    pool: &PgPool,
    clinic_id: Uuid,
    bill_id: Uuid,
    received_by: Uuid,
    request: &RecordPaymentRequest,
) -> Result<PaymentResult, AppError> {
    let mut tx = pool.begin().await?;
    let bill = bills::lock_bill(&mut *tx, clinic_id, bill_id).await?;
    let amount = validate_payment(&bill, &request.amount)?;

    let transaction = bills::insert_transaction(
        &mut *tx,
        &bill,
        &amount,
        request.payment_method,
        request.reference.as_deref(),
        received_by,
    )
    .await?;

    let amount_paid = &bill.amount_paid + &amount;
    let status = payment_status(&bill.total_amount, &amount_paid);
    let bill = bills::update_payment_state(&mut *tx, bill.id, &amount_paid, status).await?;

    let receipt = issue_receipt(&mut tx, document_numbers("R"), &transaction).await?;

    tx.commit().await?;
    tracing::info!(
        bill_number = %bill.bill_number,
        receipt_number = %receipt.receipt_number,
        status = bill.status.as_str(),
        "payment recorded"
    );

    Ok(PaymentResult {
        bill,
        transaction,
        receipt,
    })
}

#[tracing::instrument(name = "Cancel bill", skip(pool))]
pub async fn cancel_bill(pool: &PgPool, clinic_id: Uuid, bill_id: Uuid) -> Result<Bill, AppError> {
    let bill = bills::get_bill_by_id(pool, clinic_id, bill_id).await?;
    if bill.status == BillStatus::Cancelled {
        return Err(AppError::bad_request(
            ErrorCode::BillNotPayable,
            "Bill is already cancelled",
        ));
    }

    bills::cancel_unpaid(pool, clinic_id, bill.id)
        .await?
        .ok_or_else(|| {
            AppError::bad_request(
                ErrorCode::BillHasPayments,
                "A bill with recorded payments cannot be cancelled",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::appointments::CreateAppointmentRequest;
    use crate::models::bills::PaymentMethod;
    use crate::services::appointments as booking;
    use chrono::{Duration, Utc};
    use claim::{assert_err, assert_ok};
    use quickcheck_macros::quickcheck;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn item(quantity: i32, unit_price: &str) -> BillItemRequest {
        BillItemRequest {
            description: "Consultation".into(),
            quantity,
            unit_price: dec(unit_price),
        }
    }

    fn bill(total: &str, paid: &str, status: BillStatus) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            patient_id: Uuid::nil(),
            appointment_id: None,
            bill_number: "B-20240101-AAAA".into(),
            subtotal: dec(total),
            discount: dec("0"),
            total_amount: dec(total),
            amount_paid: dec(paid),
            status,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn totals_sum_lines_and_subtract_discount() {
        let totals =
            compute_totals(&[item(2, "15.50"), item(1, "20")], Some(&dec("5"))).unwrap();
        assert_eq!(totals.subtotal, dec("51"));
        assert_eq!(totals.total, dec("46"));
    }

    #[test]
    fn discount_larger_than_subtotal_floors_at_zero() {
        let totals = compute_totals(&[item(1, "10")], Some(&dec("25"))).unwrap();
        assert_eq!(totals.total, dec("0"));
    }

    #[test]
    fn negative_discount_is_rejected() {
        let error = assert_err!(compute_totals(&[item(1, "10")], Some(&dec("-1"))));
        assert_eq!(error.code, ErrorCode::InvalidDiscount);
    }

    #[test]
    fn empty_bill_is_rejected() {
        assert_err!(compute_totals(&[], None));
    }

    #[test]
    fn status_follows_cumulative_payments() {
        assert_eq!(payment_status(&dec("100"), &dec("0")), BillStatus::Unpaid);
        assert_eq!(payment_status(&dec("100"), &dec("40")), BillStatus::Partial);
        assert_eq!(payment_status(&dec("100"), &dec("100")), BillStatus::Paid);
        assert_eq!(payment_status(&dec("0"), &dec("0")), BillStatus::Paid);
    }

    #[test]
    fn payment_rules() {
        let open = bill("100", "40", BillStatus::Partial);
        assert_ok!(validate_payment(&open, &dec("60")));
        assert_eq!(
            assert_err!(validate_payment(&open, &dec("60.01"))).code,
            ErrorCode::Overpayment
        );
        assert_eq!(
            assert_err!(validate_payment(&open, &dec("0"))).code,
            ErrorCode::InvalidAmount
        );

        let paid = bill("100", "100", BillStatus::Paid);
        assert_eq!(
            assert_err!(validate_payment(&paid, &dec("1"))).code,
            ErrorCode::BillNotPayable
        );

        let cancelled = bill("100", "0", BillStatus::Cancelled);
        assert_eq!(
            assert_err!(validate_payment(&cancelled, &dec("10"))).code,
            ErrorCode::BillNotPayable
        );
    }

    #[test]
    fn sub_cent_payment_is_rejected_after_rounding() {
        let open = bill("100", "0", BillStatus::Unpaid);
        assert_eq!(
            assert_err!(validate_payment(&open, &dec("0.004"))).code,
            ErrorCode::InvalidAmount
        );
        assert_eq!(assert_ok!(validate_payment(&open, &dec("0.005"))), dec("0.01"));
        assert_eq!(assert_ok!(validate_payment(&open, &dec("12.345"))), dec("12.35"));
    }

    #[test]
    fn rounding_can_push_a_payment_over_the_balance() {
        let open = bill("10", "0", BillStatus::Unpaid);
        assert_eq!(
            assert_err!(validate_payment(&open, &dec("10.005"))).code,
            ErrorCode::Overpayment
        );
        assert_eq!(assert_ok!(validate_payment(&open, &dec("10.004"))), dec("10.00"));
    }

    #[quickcheck]
    fn total_is_never_negative(prices: Vec<u16>, discount: u32) -> bool {
        if prices.is_empty() {
            return true;
        }
        let items: Vec<_> = prices
            .iter()
            .map(|price| BillItemRequest {
                description: "Line".into(),
                quantity: 1,
                unit_price: BigDecimal::from(*price as i32),
            })
            .collect();
        let totals = compute_totals(&items, Some(&BigDecimal::from(discount))).unwrap();
        totals.total >= BigDecimal::from(0) && totals.total <= totals.subtotal
    }

    fn bill_request(patient_id: Uuid, appointment_id: Option<Uuid>) -> CreateBillRequest {
        CreateBillRequest {
            patient_id,
            appointment_id,
            items: vec![item(1, "60"), item(2, "20")],
            discount: Some(dec("10")),
            notes: None,
        }
    }

    fn payment(amount: &str) -> RecordPaymentRequest {
        RecordPaymentRequest {
            amount: dec(amount),
            payment_method: PaymentMethod::Cash,
            reference: None,
        }
    }

    async fn open_bill(pool: &PgPool, tenant: &fixtures::Tenant) -> BillDetails {
        let request = bill_request(tenant.patient_id, None);
        create_bill(pool, tenant.clinic_id, tenant.owner_id, &request)
            .await
            .expect("Failed to create bill")
    }

    async fn pay(
        pool: &PgPool,
        tenant: &fixtures::Tenant,
        bill_id: Uuid,
        amount: &str,
    ) -> Result<PaymentResult, AppError> {
        record_payment(pool, tenant.clinic_id, bill_id, tenant.owner_id, &payment(amount)).await
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn payments_move_the_bill_to_paid_and_issue_receipts(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let created = open_bill(&pool, &tenant).await;
        assert_eq!(created.bill.total_amount, dec("90"));
        assert_eq!(created.bill.status, BillStatus::Unpaid);
        assert!(created.bill.bill_number.starts_with("B-"));

        let first = assert_ok!(pay(&pool, &tenant, created.bill.id, "40").await);
        assert_eq!(first.bill.status, BillStatus::Partial);
        assert_eq!(first.receipt.amount, dec("40"));
        assert_eq!(first.receipt.transaction_id, first.transaction.id);

        let error = assert_err!(pay(&pool, &tenant, created.bill.id, "50.01").await);
        assert_eq!(error.code, ErrorCode::Overpayment);

        let second = assert_ok!(pay(&pool, &tenant, created.bill.id, "50").await);
        assert_eq!(second.bill.status, BillStatus::Paid);
        assert_eq!(second.bill.amount_paid, dec("90"));
        assert_ne!(second.receipt.receipt_number, first.receipt.receipt_number);

        let details = assert_ok!(get_details(&pool, tenant.clinic_id, created.bill.id).await);
        assert_eq!(details.payments.len(), 2);
        assert_eq!(details.balance, dec("0"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn sub_cent_payment_is_a_client_error(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let created = open_bill(&pool, &tenant).await;

        let error = assert_err!(pay(&pool, &tenant, created.bill.id, "0.004").await);
        assert_eq!(error.code, ErrorCode::InvalidAmount);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bill_cannot_link_another_clinics_appointment(pool: PgPool) {
        let ours = fixtures::seed_tenant(&pool).await;
        let theirs = fixtures::seed_tenant(&pool).await;
        let foreign = assert_ok!(
            booking::book(
                &pool,
                &theirs.owner_context(),
                &CreateAppointmentRequest {
                    patient_id: theirs.patient_id,
                    doctor_id: theirs.doctor_id,
                    start_time: Utc::now() + Duration::days(1),
                    duration_minutes: 30,
                    reason: None,
                    notes: None,
                },
            )
            .await
        );

        let error = assert_err!(
            create_bill(
                &pool,
                ours.clinic_id,
                ours.owner_id,
                &bill_request(ours.patient_id, Some(foreign.id)),
            )
            .await
        );
        assert_eq!(error.code, ErrorCode::AppointmentNotFound);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn taken_bill_number_is_retried_with_a_fresh_one(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let request = bill_request(tenant.patient_id, None);
        let totals = compute_totals(&request.items, request.discount.as_ref()).unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let taken = assert_ok!(
            insert_numbered_bill(
                &mut conn,
                ["B-20240101-TAKEN1".to_string()],
                tenant.clinic_id,
                tenant.owner_id,
                &request,
                &totals,
            )
            .await
        );

        let retried = assert_ok!(
            insert_numbered_bill(
                &mut conn,
                [taken.bill_number.clone(), "B-20240101-FRESH1".to_string()],
                tenant.clinic_id,
                tenant.owner_id,
                &request,
                &totals,
            )
            .await
        );
        assert_eq!(retried.bill_number, "B-20240101-FRESH1");

        let error = assert_err!(
            insert_numbered_bill(
                &mut conn,
                [taken.bill_number.clone(), retried.bill_number.clone()],
                tenant.clinic_id,
                tenant.owner_id,
                &request,
                &totals,
            )
            .await
        );
        assert_eq!(error.code, ErrorCode::InternalError);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn taken_receipt_number_is_retried_with_a_fresh_one(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let created = open_bill(&pool, &tenant).await;
        let paid = assert_ok!(pay(&pool, &tenant, created.bill.id, "10").await);

        let mut conn = pool.acquire().await.unwrap();
        let receipt = assert_ok!(
            issue_receipt(
                &mut conn,
                [paid.receipt.receipt_number.clone(), "R-20240101-FRESH1".to_string()],
                &paid.transaction,
            )
            .await
        );
        assert_eq!(receipt.receipt_number, "R-20240101-FRESH1");
    }
}
