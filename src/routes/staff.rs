use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext, ErrorCode};
use crate::db::{clinics, staff};
use crate::models::common::DeletedResponse;
use crate::models::pagination::{PaginationMeta, PaginationQuery};
use crate::models::staff::{CreateStaffRequest, StaffQuery, StaffRole, UpdateStaffRequest};
use crate::models::subscriptions::ResourceType;
use crate::services::usage_limits;

#[tracing::instrument(name = "Create Staff", skip(pool, ctx, request))]
#[post("")]
pub async fn create_staff(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateStaffRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    request.validate()?;
    if request.role == StaffRole::Owner {
        return Err(AppError::forbidden_error("Owners cannot be created as staff"));
    }

    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    if staff::email_exists(pool.get_ref(), &request.email).await? {
        return Err(AppError::bad_request(
            ErrorCode::EmailAlreadyExists,
            "A staff member with this email already exists",
        ));
    }

    let mut tx = pool.begin().await?;
    usage_limits::consume(&mut tx, clinic.owner_id, ResourceType::Staff, 1).await?;
    let member = staff::insert_staff(&mut *tx, clinic.id, ctx.user_id, &request).await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        member,
        "Staff member created successfully",
    )))
}

#[tracing::instrument(name = "Get Staff", skip(pool, ctx, pagination))]
#[get("")]
pub async fn get_staff(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    query: web::Query<StaffQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let members = staff::search_staff(pool.get_ref(), clinic.id, query.role, &pagination).await?;
    let total = staff::count_staff(
        pool.get_ref(),
        clinic.id,
        query.role,
        pagination.search.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        members,
        "Staff retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Staff Member", skip(pool, ctx))]
#[get("/{staff_id}")]
pub async fn get_staff_member(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let member = staff::get_staff_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        member,
        "Staff member retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Staff", skip(pool, ctx, request))]
#[put("/{staff_id}")]
pub async fn update_staff(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<UpdateStaffRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    request.validate()?;
    if request.role == Some(StaffRole::Owner) {
        return Err(AppError::forbidden_error("Staff cannot be promoted to owner"));
    }

    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let member =
        staff::update_staff(pool.get_ref(), clinic.id, path.into_inner(), &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        member,
        "Staff member updated successfully",
    )))
}

#[tracing::instrument(name = "Deactivate Staff", skip(pool, ctx))]
#[patch("/{staff_id}/deactivate")]
pub async fn deactivate_staff(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let member = staff::set_active(pool.get_ref(), clinic.id, path.into_inner(), false).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        member,
        "Staff member deactivated",
    )))
}

#[tracing::instrument(name = "Delete Staff", skip(pool, ctx))]
#[delete("/{staff_id}")]
pub async fn delete_staff(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    let staff_id = path.into_inner();
    if staff_id == ctx.user_id {
        return Err(AppError::forbidden_error("You cannot delete yourself"));
    }
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    let mut tx = pool.begin().await?;
    staff::soft_delete_staff(&mut *tx, clinic.id, staff_id).await?;
    usage_limits::release(&mut tx, clinic.owner_id, ResourceType::Staff, 1).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        DeletedResponse {
            id: staff_id,
            deleted: true,
        },
        "Staff member deleted successfully",
    )))
}
