use actix_web::{get, post, web, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::{bills, clinics};
use crate::models::bills::{BillQuery, CreateBillRequest, RecordPaymentRequest};
use crate::models::pagination::{PaginationMeta, PaginationQuery};
use crate::models::staff::StaffRole;
use crate::services::billing;

const BILLING_ROLES: [StaffRole; 3] = [StaffRole::Owner, StaffRole::Admin, StaffRole::Receptionist];

#[tracing::instrument(name = "Create Bill", skip(pool, ctx, request))]
#[post("")]
pub async fn create_bill(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateBillRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&BILLING_ROLES)?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    let bill = billing::create_bill(&pool, clinic.id, ctx.user_id, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        bill,
        "Bill created successfully",
    )))
}

#[tracing::instrument(name = "Get Bills", skip(pool, ctx, pagination))]
#[get("")]
pub async fn get_bills(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    filter: web::Query<BillQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let list = bills::list_bills(pool.get_ref(), clinic.id, &filter, &pagination).await?;
    let total = bills::count_bills(pool.get_ref(), clinic.id, &filter).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        list,
        "Bills retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Bill", skip(pool, ctx))]
#[get("/{bill_id}")]
pub async fn get_bill(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let bill = billing::get_details(&pool, clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        bill,
        "Bill retrieved successfully",
    )))
}

#[tracing::instrument(name = "Record Payment", skip(pool, ctx, request))]
#[post("/{bill_id}/payments")]
pub async fn record_payment(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&BILLING_ROLES)?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    let result =
        billing::record_payment(&pool, clinic.id, path.into_inner(), ctx.user_id, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        result,
        "Payment recorded successfully",
    )))
}

#[tracing::instrument(name = "Cancel Bill", skip(pool, ctx))]
#[post("/{bill_id}/cancel")]
pub async fn cancel_bill(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let bill = billing::cancel_bill(&pool, clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(bill, "Bill cancelled")))
}

#[tracing::instrument(name = "Get Bill Receipts", skip(pool, ctx))]
#[get("/{bill_id}/receipts")]
pub async fn get_bill_receipts(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let bill = bills::get_bill_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;
    let receipts = bills::get_bill_receipts(pool.get_ref(), clinic.id, bill.id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        receipts,
        "Receipts retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Transactions", skip(pool, ctx, pagination))]
#[get("")]
pub async fn get_transactions(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&BILLING_ROLES)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let list = bills::list_transactions(pool.get_ref(), clinic.id, &pagination).await?;
    let total = bills::count_transactions(pool.get_ref(), clinic.id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        list,
        "Transactions retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Receipt", skip(pool, ctx))]
#[get("/{receipt_id}")]
pub async fn get_receipt(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let receipt = bills::get_receipt_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        receipt,
        "Receipt retrieved successfully",
    )))
}
