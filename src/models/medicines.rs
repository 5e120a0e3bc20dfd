use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Medicine {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub unit: String,
    pub unit_price: BigDecimal,
    pub reorder_level: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMedicineRequest {
    #[validate(length(min = 1, max = 150, message = "Medicine name is required"))]
    pub name: String,
    #[validate(length(max = 150))]
    pub generic_name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub unit: String,
    pub unit_price: BigDecimal,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMedicineRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[validate(length(max = 150))]
    pub generic_name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub unit: Option<String>,
    pub unit_price: Option<BigDecimal>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct InventoryBatch {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub medicine_id: Uuid,
    pub batch_number: String,
    pub quantity: i32,
    pub cost_price: BigDecimal,
    pub received_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveStockRequest {
    pub medicine_id: Uuid,
    #[validate(length(min = 1, max = 60))]
    pub batch_number: String,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub cost_price: BigDecimal,
    pub received_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
}

/// Manual stock-out, e.g. damaged or returned units.
#[derive(Debug, Deserialize, Validate)]
pub struct DeductStockRequest {
    pub medicine_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct StockLevel {
    pub medicine_id: Uuid,
    pub name: String,
    pub unit: String,
    pub reorder_level: i32,
    pub available_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub within_days: Option<i64>,
}

/// One slice of a FIFO deduction.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct BatchDeduction {
    pub batch_id: Uuid,
    pub quantity: i32,
}
