use actix_web::{get, post, web, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::clinics;
use crate::models::prescriptions::CreatePrescriptionRequest;
use crate::models::staff::StaffRole;
use crate::services::prescriptions;

#[tracing::instrument(name = "Create Prescription", skip(pool, ctx, request))]
#[post("")]
pub async fn create_prescription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreatePrescriptionRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner, StaffRole::Doctor])?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    let prescription = prescriptions::create(&pool, clinic.id, ctx.user_id, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        prescription,
        "Prescription created successfully",
    )))
}

#[tracing::instrument(name = "Get Prescription", skip(pool, ctx))]
#[get("/{prescription_id}")]
pub async fn get_prescription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let prescription = prescriptions::get_with_items(&pool, clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        prescription,
        "Prescription retrieved successfully",
    )))
}

#[tracing::instrument(name = "Dispense Prescription", skip(pool, ctx))]
#[post("/{prescription_id}/dispense")]
pub async fn dispense_prescription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::PHARMACY)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let prescription =
        prescriptions::dispense(&pool, clinic.id, path.into_inner(), ctx.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        prescription,
        "Prescription dispensed successfully",
    )))
}

#[tracing::instrument(name = "Cancel Prescription", skip(pool, ctx))]
#[post("/{prescription_id}/cancel")]
pub async fn cancel_prescription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner, StaffRole::Admin, StaffRole::Doctor])?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let prescription = prescriptions::cancel(&pool, clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        prescription,
        "Prescription cancelled",
    )))
}
