use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext, ErrorCode};
use crate::db::{clinics, medicines};
use crate::models::common::DeletedResponse;
use crate::models::medicines::{
    CreateMedicineRequest, DeductStockRequest, ExpiringQuery, ReceiveStockRequest,
    UpdateMedicineRequest,
};
use crate::models::pagination::{PaginationMeta, PaginationQuery};
use crate::models::staff::StaffRole;
use crate::services::stock;

const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;

fn ensure_price(price: &bigdecimal::BigDecimal) -> Result<(), AppError> {
    if *price < bigdecimal::BigDecimal::from(0) {
        return Err(AppError::bad_request(
            ErrorCode::InvalidAmount,
            "Price cannot be negative",
        ));
    }
    Ok(())
}

#[tracing::instrument(name = "Create Medicine", skip(pool, ctx, request))]
#[post("")]
pub async fn create_medicine(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateMedicineRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::PHARMACY)?;
    request.validate()?;
    ensure_price(&request.unit_price)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    let medicine = medicines::insert_medicine(pool.get_ref(), clinic.id, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        medicine,
        "Medicine created successfully",
    )))
}

#[tracing::instrument(name = "Get Medicines", skip(pool, ctx, pagination))]
#[get("")]
pub async fn get_medicines(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let list = medicines::search_medicines(pool.get_ref(), clinic.id, &pagination).await?;
    let total =
        medicines::count_medicines(pool.get_ref(), clinic.id, pagination.search.as_deref()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        list,
        "Medicines retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Medicine", skip(pool, ctx))]
#[get("/{medicine_id}")]
pub async fn get_medicine(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let medicine =
        medicines::get_medicine_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        medicine,
        "Medicine retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Medicine", skip(pool, ctx, request))]
#[put("/{medicine_id}")]
pub async fn update_medicine(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<UpdateMedicineRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::PHARMACY)?;
    request.validate()?;
    if let Some(price) = &request.unit_price {
        ensure_price(price)?;
    }
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let medicine =
        medicines::update_medicine(pool.get_ref(), clinic.id, path.into_inner(), &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        medicine,
        "Medicine updated successfully",
    )))
}

#[tracing::instrument(name = "Delete Medicine", skip(pool, ctx))]
#[delete("/{medicine_id}")]
pub async fn delete_medicine(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::PHARMACY)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let medicine_id = path.into_inner();
    medicines::soft_delete_medicine(pool.get_ref(), clinic.id, medicine_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        DeletedResponse {
            id: medicine_id,
            deleted: true,
        },
        "Medicine deleted successfully",
    )))
}

#[tracing::instrument(name = "Get Medicine Batches", skip(pool, ctx))]
#[get("/{medicine_id}/batches")]
pub async fn get_medicine_batches(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let medicine =
        medicines::get_medicine_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;
    let batches = medicines::get_medicine_batches(pool.get_ref(), clinic.id, medicine.id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        batches,
        "Batches retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Medicine Stock", skip(pool, ctx))]
#[get("/{medicine_id}/stock")]
pub async fn get_medicine_stock(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let level = medicines::get_stock_level(
        pool.get_ref(),
        clinic.id,
        path.into_inner(),
        Utc::now().date_naive(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        level,
        "Stock level retrieved successfully",
    )))
}

// Inventory

#[tracing::instrument(name = "Receive Stock", skip(pool, ctx, request))]
#[post("/batches")]
pub async fn receive_stock(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<ReceiveStockRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::PHARMACY)?;
    request.validate()?;
    ensure_price(&request.cost_price)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    medicines::get_medicine_by_id(pool.get_ref(), clinic.id, request.medicine_id).await?;

    let received_date = request
        .received_date
        .unwrap_or_else(|| Utc::now().date_naive());
    if request.expiry_date < received_date {
        return Err(AppError::bad_request(
            ErrorCode::ValidationError,
            "Expiry date cannot be before the received date",
        ));
    }

    let batch = medicines::insert_batch(pool.get_ref(), clinic.id, received_date, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        batch,
        "Stock received successfully",
    )))
}

#[tracing::instrument(name = "Deduct Stock", skip(pool, ctx, request))]
#[post("/deduct")]
pub async fn deduct_stock(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<DeductStockRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::PHARMACY)?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    let mut tx = pool.begin().await?;
    let batches = medicines::lock_medicine_batches(&mut *tx, clinic.id, request.medicine_id).await?;
    let plan = stock::plan_fifo_deduction(&batches, request.quantity, Utc::now().date_naive())?;
    for deduction in &plan {
        medicines::deduct_from_batch(&mut *tx, deduction.batch_id, deduction.quantity).await?;
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        plan,
        "Stock deducted successfully",
    )))
}

#[tracing::instrument(name = "Get Low Stock", skip(pool, ctx))]
#[get("/low-stock")]
pub async fn get_low_stock(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let levels =
        medicines::get_low_stock(pool.get_ref(), clinic.id, Utc::now().date_naive()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        levels,
        "Low stock report generated",
    )))
}

#[tracing::instrument(name = "Get Expiring Batches", skip(pool, ctx))]
#[get("/expiring")]
pub async fn get_expiring_batches(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    query: web::Query<ExpiringQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let within_days = query
        .within_days
        .unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS)
        .clamp(0, 3650);
    let today = Utc::now().date_naive();

    let batches = medicines::get_expiring_batches(
        pool.get_ref(),
        clinic.id,
        today,
        today + Duration::days(within_days),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        batches,
        "Expiring batches retrieved successfully",
    )))
}
