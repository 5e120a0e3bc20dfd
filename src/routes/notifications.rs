use actix_web::{get, patch, post, web, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::{clinics, notifications, staff};
use crate::models::common::CountResponse;
use crate::models::notifications::{
    CreateNotificationRequest, NewNotification, NotificationKind, NotificationQuery,
};
use crate::models::pagination::{PaginationMeta, PaginationQuery};
use crate::models::staff::StaffRole;

#[tracing::instrument(name = "Create Notification", skip(pool, ctx, request))]
#[post("")]
pub async fn create_notification(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateNotificationRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    // Recipients must belong to the same clinic.
    if request.recipient_id != clinic.owner_id {
        staff::get_staff_by_id(pool.get_ref(), clinic.id, request.recipient_id).await?;
    }

    let request = request.into_inner();
    let notification = notifications::insert_notification(
        pool.get_ref(),
        &NewNotification {
            clinic_id: Some(clinic.id),
            recipient_id: request.recipient_id,
            title: request.title,
            message: request.message,
            kind: request.kind.unwrap_or(NotificationKind::General),
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        notification,
        "Notification created successfully",
    )))
}

#[tracing::instrument(name = "Get My Notifications", skip(pool, ctx, pagination))]
#[get("")]
pub async fn get_notifications(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    filter: web::Query<NotificationQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let list = notifications::get_user_notifications(
        pool.get_ref(),
        ctx.user_id,
        filter.unread_only,
        &pagination,
    )
    .await?;
    let total =
        notifications::count_user_notifications(pool.get_ref(), ctx.user_id, filter.unread_only)
            .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        list,
        "Notifications retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Unread Notification Count", skip(pool, ctx))]
#[get("/unread-count")]
pub async fn get_unread_count(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    let count = notifications::count_user_notifications(pool.get_ref(), ctx.user_id, true).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        CountResponse { count },
        "Unread count retrieved successfully",
    )))
}

#[tracing::instrument(name = "Mark All Notifications Read", skip(pool, ctx))]
#[patch("/read-all")]
pub async fn mark_all_read(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    let updated = notifications::mark_all_read(pool.get_ref(), ctx.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        CountResponse {
            count: updated as i64,
        },
        "All notifications marked as read",
    )))
}

#[tracing::instrument(name = "Mark Notification Read", skip(pool, ctx))]
#[patch("/{notification_id}/read")]
pub async fn mark_read(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notification =
        notifications::mark_read(pool.get_ref(), ctx.user_id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        notification,
        "Notification marked as read",
    )))
}
