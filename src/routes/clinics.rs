use actix_web::{delete, get, post, put, web, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::clinics;
use crate::models::clinics::{Clinic, CreateClinicRequest, UpdateClinicRequest};
use crate::models::common::DeletedResponse;
use crate::models::staff::StaffRole;
use crate::models::subscriptions::ResourceType;
use crate::services::usage_limits;

async fn owned_clinic(pool: &PgPool, ctx: &ClinicContext, clinic_id: Uuid) -> Result<Clinic, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let clinic = clinics::get_clinic_by_id(pool, clinic_id).await?;
    if clinic.owner_id != ctx.user_id {
        return Err(AppError::forbidden_error("You do not own this clinic"));
    }
    Ok(clinic)
}

#[tracing::instrument(name = "Create Clinic", skip(pool, ctx, request))]
#[post("")]
pub async fn create_clinic(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateClinicRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    request.validate()?;

    let mut tx = pool.begin().await?;
    usage_limits::consume(&mut tx, ctx.user_id, ResourceType::Clinics, 1).await?;
    let clinic = clinics::create_clinic(&mut *tx, ctx.user_id, &request).await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        clinic,
        "Clinic created successfully",
    )))
}

#[tracing::instrument(name = "Get My Clinics", skip(pool, ctx))]
#[get("")]
pub async fn get_my_clinics(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let clinics = clinics::get_owned_clinics(pool.get_ref(), ctx.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        clinics,
        "Clinics retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Current Clinic", skip(pool, ctx))]
#[get("/current")]
pub async fn get_current_clinic(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        clinic,
        "Clinic retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Clinic", skip(pool, ctx))]
#[get("/{clinic_id}")]
pub async fn get_clinic(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = owned_clinic(&pool, &ctx, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        clinic,
        "Clinic retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Clinic", skip(pool, ctx, request))]
#[put("/{clinic_id}")]
pub async fn update_clinic(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<UpdateClinicRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let clinic = owned_clinic(&pool, &ctx, path.into_inner()).await?;
    let clinic = clinics::update_clinic(pool.get_ref(), clinic.id, &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        clinic,
        "Clinic updated successfully",
    )))
}

#[tracing::instrument(name = "Delete Clinic", skip(pool, ctx))]
#[delete("/{clinic_id}")]
pub async fn delete_clinic(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = owned_clinic(&pool, &ctx, path.into_inner()).await?;

    let mut tx = pool.begin().await?;
    clinics::soft_delete_clinic(&mut *tx, clinic.id).await?;
    usage_limits::release(&mut tx, ctx.user_id, ResourceType::Clinics, 1).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        DeletedResponse {
            id: clinic.id,
            deleted: true,
        },
        "Clinic deleted successfully",
    )))
}
