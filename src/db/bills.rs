use bigdecimal::BigDecimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::bills::{
    Bill, BillItem, BillItemRequest, BillQuery, BillStatus, PaymentMethod, Receipt, Transaction,
};
use crate::models::pagination::PaginationQuery;
use crate::services::billing::{line_total, BillTotals};

const BILL_COLUMNS: &str = "id, clinic_id, patient_id, appointment_id, bill_number, subtotal, \
     discount, total_amount, amount_paid, status, notes, created_by, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, clinic_id, bill_id, amount, payment_method, reference, received_by, paid_at";

const RECEIPT_COLUMNS: &str =
    "id, clinic_id, bill_id, transaction_id, receipt_number, amount, issued_at";

fn bill_not_found() -> AppError {
    AppError::not_found(ErrorCode::BillNotFound, "Bill not found")
}

/// Insert a bill under `bill_number`; `None` when that number is already taken.
#[allow(clippy::too_many_arguments)]
pub async fn insert_bill(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
    appointment_id: Option<Uuid>,
    bill_number: &str,
    totals: &BillTotals,
    status: BillStatus,
    notes: Option<&str>,
    created_by: Uuid,
) -> Result<Option<Bill>, AppError> {
    let query = format!(
        "INSERT INTO bills (id, clinic_id, patient_id, appointment_id, bill_number, subtotal,
                            discount, total_amount, amount_paid, status, notes, created_by,
                            created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, NOW(), NOW())
         ON CONFLICT (bill_number) DO NOTHING
         RETURNING {}",
        BILL_COLUMNS
    );

    let bill = sqlx::query_as::<_, Bill>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(patient_id)
        .bind(appointment_id)
        .bind(bill_number)
        .bind(&totals.subtotal)
        .bind(&totals.discount)
        .bind(&totals.total)
        .bind(status.as_str())
        .bind(notes)
        .bind(created_by)
        .fetch_optional(executor)
        .await?;

    Ok(bill)
}

pub async fn insert_bill_item(
    executor: impl PgExecutor<'_>,
    bill_id: Uuid,
    item: &BillItemRequest,
) -> Result<BillItem, AppError> {
    let item = sqlx::query_as::<_, BillItem>(
        r#"
        INSERT INTO bill_items (id, bill_id, description, quantity, unit_price, line_total)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, bill_id, description, quantity, unit_price, line_total
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(bill_id)
    .bind(item.description.trim())
    .bind(item.quantity)
    .bind(&item.unit_price)
    .bind(line_total(item.quantity, &item.unit_price))
    .fetch_one(executor)
    .await?;

    Ok(item)
}

pub async fn get_bill_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    bill_id: Uuid,
) -> Result<Bill, AppError> {
    let query = format!(
        "SELECT {} FROM bills WHERE id = $1 AND clinic_id = $2",
        BILL_COLUMNS
    );

    sqlx::query_as::<_, Bill>(&query)
        .bind(bill_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(bill_not_found)
}

pub async fn lock_bill(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    bill_id: Uuid,
) -> Result<Bill, AppError> {
    let query = format!(
        "SELECT {} FROM bills WHERE id = $1 AND clinic_id = $2 FOR UPDATE",
        BILL_COLUMNS
    );

    sqlx::query_as::<_, Bill>(&query)
        .bind(bill_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(bill_not_found)
}

pub async fn list_bills(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    filter: &BillQuery,
    pagination: &PaginationQuery,
) -> Result<Vec<Bill>, AppError> {
    let query = format!(
        "SELECT {} FROM bills
         WHERE clinic_id = $1
           AND ($2::VARCHAR IS NULL OR status = $2)
           AND ($3::UUID IS NULL OR patient_id = $3)
         ORDER BY created_at DESC
         LIMIT $4 OFFSET $5",
        BILL_COLUMNS
    );

    let bills = sqlx::query_as::<_, Bill>(&query)
        .bind(clinic_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.patient_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(bills)
}

pub async fn count_bills(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    filter: &BillQuery,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bills
         WHERE clinic_id = $1
           AND ($2::VARCHAR IS NULL OR status = $2)
           AND ($3::UUID IS NULL OR patient_id = $3)",
    )
    .bind(clinic_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.patient_id)
    .fetch_one(executor)
    .await?;

    Ok(total)
}

pub async fn get_bill_items(
    executor: impl PgExecutor<'_>,
    bill_id: Uuid,
) -> Result<Vec<BillItem>, AppError> {
    let items = sqlx::query_as::<_, BillItem>(
        r#"
        SELECT id, bill_id, description, quantity, unit_price, line_total
        FROM bill_items
        WHERE bill_id = $1
        ORDER BY id
        "#,
    )
    .bind(bill_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

pub async fn update_payment_state(
    executor: impl PgExecutor<'_>,
    bill_id: Uuid,
    amount_paid: &BigDecimal,
    status: BillStatus,
) -> Result<Bill, AppError> {
    let query = format!(
        "UPDATE bills SET amount_paid = $2, status = $3, updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        BILL_COLUMNS
    );

    sqlx::query_as::<_, Bill>(&query)
        .bind(bill_id)
        .bind(amount_paid)
        .bind(status.as_str())
        .fetch_optional(executor)
        .await?
        .ok_or_else(bill_not_found)
}

pub async fn insert_transaction(
    executor: impl PgExecutor<'_>,
    bill: &Bill,
    amount: &BigDecimal,
    payment_method: PaymentMethod,
    reference: Option<&str>,
    received_by: Uuid,
) -> Result<Transaction, AppError> {
    let query = format!(
        "INSERT INTO transactions (id, clinic_id, bill_id, amount, payment_method, reference,
                                   received_by, paid_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
         RETURNING {}",
        TRANSACTION_COLUMNS
    );

    let transaction = sqlx::query_as::<_, Transaction>(&query)
        .bind(Uuid::new_v4())
        .bind(bill.clinic_id)
        .bind(bill.id)
        .bind(amount)
        .bind(payment_method.as_str())
        .bind(reference)
        .bind(received_by)
        .fetch_one(executor)
        .await?;

    Ok(transaction)
}

pub async fn get_bill_transactions(
    executor: impl PgExecutor<'_>,
    bill_id: Uuid,
) -> Result<Vec<Transaction>, AppError> {
    let query = format!(
        "SELECT {} FROM transactions WHERE bill_id = $1 ORDER BY paid_at ASC",
        TRANSACTION_COLUMNS
    );

    let transactions = sqlx::query_as::<_, Transaction>(&query)
        .bind(bill_id)
        .fetch_all(executor)
        .await?;

    Ok(transactions)
}

pub async fn list_transactions(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    pagination: &PaginationQuery,
) -> Result<Vec<Transaction>, AppError> {
    let query = format!(
        "SELECT {} FROM transactions WHERE clinic_id = $1 ORDER BY paid_at DESC LIMIT $2 OFFSET $3",
        TRANSACTION_COLUMNS
    );

    let transactions = sqlx::query_as::<_, Transaction>(&query)
        .bind(clinic_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(transactions)
}

pub async fn count_transactions(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE clinic_id = $1")
        .bind(clinic_id)
        .fetch_one(executor)
        .await?;

    Ok(total)
}

/// Issue a receipt under `receipt_number`; `None` when that number is already taken.
pub async fn insert_receipt(
    executor: impl PgExecutor<'_>,
    transaction: &Transaction,
    receipt_number: &str,
) -> Result<Option<Receipt>, AppError> {
    let query = format!(
        "INSERT INTO receipts (id, clinic_id, bill_id, transaction_id, receipt_number, amount, issued_at)
         VALUES ($1, $2, $3, $4, $5, $6, NOW())
         ON CONFLICT (receipt_number) DO NOTHING
         RETURNING {}",
        RECEIPT_COLUMNS
    );

    let receipt = sqlx::query_as::<_, Receipt>(&query)
        .bind(Uuid::new_v4())
        .bind(transaction.clinic_id)
        .bind(transaction.bill_id)
        .bind(transaction.id)
        .bind(receipt_number)
        .bind(&transaction.amount)
        .fetch_optional(executor)
        .await?;

    Ok(receipt)
}

pub async fn get_receipt_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    receipt_id: Uuid,
) -> Result<Receipt, AppError> {
    let query = format!(
        "SELECT {} FROM receipts WHERE id = $1 AND clinic_id = $2",
        RECEIPT_COLUMNS
    );

    sqlx::query_as::<_, Receipt>(&query)
        .bind(receipt_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::ReceiptNotFound, "Receipt not found"))
}

pub async fn get_bill_receipts(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    bill_id: Uuid,
) -> Result<Vec<Receipt>, AppError> {
    let query = format!(
        "SELECT {} FROM receipts WHERE clinic_id = $1 AND bill_id = $2 ORDER BY issued_at ASC",
        RECEIPT_COLUMNS
    );

    let receipts = sqlx::query_as::<_, Receipt>(&query)
        .bind(clinic_id)
        .bind(bill_id)
        .fetch_all(executor)
        .await?;

    Ok(receipts)
}

/// Cancel a bill that has received no payments. `None` when it cannot be cancelled.
pub async fn cancel_unpaid(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    bill_id: Uuid,
) -> Result<Option<Bill>, AppError> {
    let query = format!(
        "UPDATE bills SET status = 'Cancelled', updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND amount_paid = 0 AND status <> 'Cancelled'
         RETURNING {}",
        BILL_COLUMNS
    );

    let bill = sqlx::query_as::<_, Bill>(&query)
        .bind(bill_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?;

    Ok(bill)
}
