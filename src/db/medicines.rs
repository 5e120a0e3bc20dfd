use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{like_pattern, AppError, ErrorCode};
use crate::models::medicines::{
    CreateMedicineRequest, InventoryBatch, Medicine, ReceiveStockRequest, StockLevel,
    UpdateMedicineRequest,
};
use crate::models::pagination::PaginationQuery;

const MEDICINE_COLUMNS: &str = "id, clinic_id, name, generic_name, unit, unit_price, \
     reorder_level, is_deleted, created_at, updated_at, deleted_at";

const BATCH_COLUMNS: &str = "id, clinic_id, medicine_id, batch_number, quantity, cost_price, \
     received_date, expiry_date, created_at, updated_at";

// Available stock counts only batches that have not expired by $2
const STOCK_LEVEL_SELECT: &str = "SELECT m.id AS medicine_id, m.name, m.unit, m.reorder_level,
            COALESCE(SUM(b.quantity) FILTER (WHERE b.expiry_date >= $2), 0)::BIGINT
                AS available_quantity
     FROM medicines m
     LEFT JOIN inventory_batches b ON b.medicine_id = m.id
     WHERE m.clinic_id = $1 AND m.is_deleted = FALSE";

fn medicine_not_found() -> AppError {
    AppError::not_found(ErrorCode::MedicineNotFound, "Medicine not found")
}

pub async fn insert_medicine(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    request: &CreateMedicineRequest,
) -> Result<Medicine, AppError> {
    let query = format!(
        "INSERT INTO medicines (id, clinic_id, name, generic_name, unit, unit_price, reorder_level,
                                is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NOW(), NOW())
         RETURNING {}",
        MEDICINE_COLUMNS
    );

    let medicine = sqlx::query_as::<_, Medicine>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(request.name.trim())
        .bind(&request.generic_name)
        .bind(request.unit.trim())
        .bind(&request.unit_price)
        .bind(request.reorder_level.unwrap_or(0))
        .fetch_one(executor)
        .await?;

    Ok(medicine)
}

pub async fn get_medicine_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    medicine_id: Uuid,
) -> Result<Medicine, AppError> {
    let query = format!(
        "SELECT {} FROM medicines WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
        MEDICINE_COLUMNS
    );

    sqlx::query_as::<_, Medicine>(&query)
        .bind(medicine_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(medicine_not_found)
}

pub async fn search_medicines(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    pagination: &PaginationQuery,
) -> Result<Vec<Medicine>, AppError> {
    let query = format!(
        "SELECT {} FROM medicines
         WHERE clinic_id = $1 AND is_deleted = FALSE
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR generic_name ILIKE $2)
         ORDER BY name ASC
         LIMIT $3 OFFSET $4",
        MEDICINE_COLUMNS
    );

    let medicines = sqlx::query_as::<_, Medicine>(&query)
        .bind(clinic_id)
        .bind(pagination.search.as_deref().map(like_pattern))
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(medicines)
}

pub async fn count_medicines(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    search: Option<&str>,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM medicines
         WHERE clinic_id = $1 AND is_deleted = FALSE
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR generic_name ILIKE $2)",
    )
    .bind(clinic_id)
    .bind(search.map(like_pattern))
    .fetch_one(executor)
    .await?;

    Ok(total)
}

pub async fn update_medicine(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    medicine_id: Uuid,
    request: &UpdateMedicineRequest,
) -> Result<Medicine, AppError> {
    let query = format!(
        "UPDATE medicines
         SET name = COALESCE($3, name),
             generic_name = COALESCE($4, generic_name),
             unit = COALESCE($5, unit),
             unit_price = COALESCE($6, unit_price),
             reorder_level = COALESCE($7, reorder_level),
             updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE
         RETURNING {}",
        MEDICINE_COLUMNS
    );

    sqlx::query_as::<_, Medicine>(&query)
        .bind(medicine_id)
        .bind(clinic_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.generic_name)
        .bind(request.unit.as_deref().map(str::trim))
        .bind(&request.unit_price)
        .bind(request.reorder_level)
        .fetch_optional(executor)
        .await?
        .ok_or_else(medicine_not_found)
}

pub async fn soft_delete_medicine(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    medicine_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE medicines SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
    )
    .bind(medicine_id)
    .bind(clinic_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(medicine_not_found());
    }
    Ok(())
}

pub async fn insert_batch(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    received_date: NaiveDate,
    request: &ReceiveStockRequest,
) -> Result<InventoryBatch, AppError> {
    let query = format!(
        "INSERT INTO inventory_batches (id, clinic_id, medicine_id, batch_number, quantity,
                                        cost_price, received_date, expiry_date, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
         RETURNING {}",
        BATCH_COLUMNS
    );

    let batch = sqlx::query_as::<_, InventoryBatch>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(request.medicine_id)
        .bind(request.batch_number.trim())
        .bind(request.quantity)
        .bind(&request.cost_price)
        .bind(received_date)
        .bind(request.expiry_date)
        .fetch_one(executor)
        .await?;

    Ok(batch)
}

pub async fn get_medicine_batches(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    medicine_id: Uuid,
) -> Result<Vec<InventoryBatch>, AppError> {
    let query = format!(
        "SELECT {} FROM inventory_batches
         WHERE clinic_id = $1 AND medicine_id = $2
         ORDER BY expiry_date ASC, received_date ASC",
        BATCH_COLUMNS
    );

    let batches = sqlx::query_as::<_, InventoryBatch>(&query)
        .bind(clinic_id)
        .bind(medicine_id)
        .fetch_all(executor)
        .await?;

    Ok(batches)
}

/// Same as [`get_medicine_batches`] but row-locks the batches for a deduction.
pub async fn lock_medicine_batches(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    medicine_id: Uuid,
) -> Result<Vec<InventoryBatch>, AppError> {
    let query = format!(
        "SELECT {} FROM inventory_batches
         WHERE clinic_id = $1 AND medicine_id = $2 AND quantity > 0
         ORDER BY expiry_date ASC, received_date ASC
         FOR UPDATE",
        BATCH_COLUMNS
    );

    let batches = sqlx::query_as::<_, InventoryBatch>(&query)
        .bind(clinic_id)
        .bind(medicine_id)
        .fetch_all(executor)
        .await?;

    Ok(batches)
}

pub async fn deduct_from_batch(
    executor: impl PgExecutor<'_>,
    batch_id: Uuid,
    quantity: i32,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE inventory_batches SET quantity = quantity - $2, updated_at = NOW()
         WHERE id = $1 AND quantity >= $2",
    )
    .bind(batch_id)
    .bind(quantity)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request(
            ErrorCode::InsufficientStock,
            "Batch no longer holds the requested quantity",
        ));
    }
    Ok(())
}

pub async fn get_stock_level(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    medicine_id: Uuid,
    today: NaiveDate,
) -> Result<StockLevel, AppError> {
    let query = format!(
        "{} AND m.id = $3 GROUP BY m.id, m.name, m.unit, m.reorder_level",
        STOCK_LEVEL_SELECT
    );

    sqlx::query_as::<_, StockLevel>(&query)
        .bind(clinic_id)
        .bind(today)
        .bind(medicine_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(medicine_not_found)
}

/// Medicines whose non-expired stock is at or below their reorder level.
pub async fn get_low_stock(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<StockLevel>, AppError> {
    let query = format!(
        "{} GROUP BY m.id, m.name, m.unit, m.reorder_level
         HAVING COALESCE(SUM(b.quantity) FILTER (WHERE b.expiry_date >= $2), 0) <= m.reorder_level
         ORDER BY m.name ASC",
        STOCK_LEVEL_SELECT
    );

    let levels = sqlx::query_as::<_, StockLevel>(&query)
        .bind(clinic_id)
        .bind(today)
        .fetch_all(executor)
        .await?;

    Ok(levels)
}

pub async fn get_expiring_batches(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    today: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<InventoryBatch>, AppError> {
    let query = format!(
        "SELECT {} FROM inventory_batches
         WHERE clinic_id = $1 AND quantity > 0 AND expiry_date >= $2 AND expiry_date <= $3
         ORDER BY expiry_date ASC",
        BATCH_COLUMNS
    );

    let batches = sqlx::query_as::<_, InventoryBatch>(&query)
        .bind(clinic_id)
        .bind(today)
        .bind(until)
        .fetch_all(executor)
        .await?;

    Ok(batches)
}
