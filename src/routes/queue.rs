use actix_web::{get, patch, post, web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::config::QueueConfig;
use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::clinics;
use crate::models::queue::{CallNextRequest, CheckInRequest, QueueQuery, QueueStatus};
use crate::models::staff::StaffRole;
use crate::services::queue;

#[tracing::instrument(name = "Queue Check In", skip(pool, ctx, config))]
#[post("/check-in")]
pub async fn check_in(
    pool: web::Data<PgPool>,
    config: web::Data<QueueConfig>,
    ctx: ClinicContext,
    request: web::Json<CheckInRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::FRONT_DESK)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let position = queue::check_in(&pool, clinic.id, &request, config.minutes_per_patient).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        position,
        "Patient checked in",
    )))
}

#[tracing::instrument(name = "Get Queue", skip(pool, ctx, config))]
#[get("")]
pub async fn get_queue(
    pool: web::Data<PgPool>,
    config: web::Data<QueueConfig>,
    ctx: ClinicContext,
    query: web::Query<QueueQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let entries = queue::day_queue(
        &pool,
        clinic.id,
        date,
        query.doctor_id,
        config.minutes_per_patient,
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        entries,
        "Queue retrieved successfully",
    )))
}

#[tracing::instrument(name = "Call Next Patient", skip(pool, ctx))]
#[post("/call-next")]
pub async fn call_next(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: Option<web::Json<CallNextRequest>>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::CLINICAL)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    // Doctors call their own patients unless another doctor is named.
    let doctor_id = request
        .and_then(|body| body.doctor_id)
        .or_else(|| (ctx.role == StaffRole::Doctor).then_some(ctx.user_id));
    let entry = queue::call_next(&pool, clinic.id, doctor_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(entry, "Next patient called")))
}

#[tracing::instrument(name = "Get Queue Position", skip(pool, ctx, config))]
#[get("/{entry_id}")]
pub async fn get_position(
    pool: web::Data<PgPool>,
    config: web::Data<QueueConfig>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let position =
        queue::position(&pool, clinic.id, path.into_inner(), config.minutes_per_patient).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        position,
        "Queue position retrieved successfully",
    )))
}

async fn move_entry(
    pool: &PgPool,
    ctx: &ClinicContext,
    entry_id: Uuid,
    status: QueueStatus,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(pool, ctx).await?;
    let entry = queue::transition(pool, clinic.id, entry_id, status).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        entry,
        format!("Queue entry marked {}", status.as_str()),
    )))
}

#[tracing::instrument(name = "Complete Queue Entry", skip(pool, ctx))]
#[patch("/{entry_id}/complete")]
pub async fn complete_entry(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::CLINICAL)?;
    move_entry(&pool, &ctx, path.into_inner(), QueueStatus::Completed).await
}

#[tracing::instrument(name = "Skip Queue Entry", skip(pool, ctx))]
#[patch("/{entry_id}/skip")]
pub async fn skip_entry(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    move_entry(&pool, &ctx, path.into_inner(), QueueStatus::Skipped).await
}

#[tracing::instrument(name = "Cancel Queue Entry", skip(pool, ctx))]
#[patch("/{entry_id}/cancel")]
pub async fn cancel_entry(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    move_entry(&pool, &ctx, path.into_inner(), QueueStatus::Cancelled).await
}
