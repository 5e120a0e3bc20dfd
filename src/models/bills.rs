use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::string_enum;

string_enum!(BillStatus {
    Unpaid,
    Partial,
    Paid,
    Cancelled,
});

string_enum!(PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Insurance,
});

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub bill_number: String,
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub status: BillStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct BillItem {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub line_total: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub bill_id: Uuid,
    pub amount: BigDecimal,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub received_by: Option<Uuid>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub bill_id: Uuid,
    pub transaction_id: Uuid,
    pub receipt_number: String,
    pub amount: BigDecimal,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BillDetails {
    #[serde(flatten)]
    pub bill: Bill,
    pub items: Vec<BillItem>,
    pub payments: Vec<Transaction>,
    pub balance: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct PaymentResult {
    pub bill: Bill,
    pub transaction: Transaction,
    pub receipt: Receipt,
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct BillItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    #[validate]
    pub items: Vec<BillItemRequest>,
    pub discount: Option<BigDecimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: BigDecimal,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillQuery {
    pub status: Option<BillStatus>,
    pub patient_id: Option<Uuid>,
}
