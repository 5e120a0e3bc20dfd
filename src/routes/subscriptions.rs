use actix_web::{get, patch, post, web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{AppError, AppSuccessResponse, ClinicContext, RedisHelper};
use crate::db::{clinics, subscriptions};
use crate::models::staff::StaffRole;
use crate::models::subscriptions::{
    AutoRenewRequest, SubscribeRequest, UpgradeRequest, UsageCheckQuery, UsageCheckResponse,
};
use crate::services::{subscriptions as billing_plans, usage_limits};

/// Subscriptions belong to the clinic owner; staff act on their owner's quota.
async fn subscriber_id(pool: &PgPool, ctx: &ClinicContext) -> Result<Uuid, AppError> {
    if ctx.is_owner() && ctx.clinic_id.is_none() {
        return Ok(ctx.user_id);
    }
    let clinic = clinics::ensure_clinic_access(pool, ctx).await?;
    Ok(clinic.owner_id)
}

#[tracing::instrument(name = "Get Subscription Packages", skip(pool, cache))]
#[get("/packages")]
pub async fn get_packages(
    pool: web::Data<PgPool>,
    cache: web::Data<RedisHelper>,
) -> Result<HttpResponse, AppError> {
    let packages = billing_plans::list_packages(&pool, &cache).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        packages,
        "Subscription packages retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Subscription Package", skip(pool))]
#[get("/packages/{package_id}")]
pub async fn get_package(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let package = billing_plans::get_package(&pool, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        package,
        "Subscription package retrieved successfully",
    )))
}

#[tracing::instrument(name = "Subscribe", skip(pool, ctx))]
#[post("")]
pub async fn subscribe(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<SubscribeRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let subscription = billing_plans::subscribe(&pool, ctx.user_id, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        subscription,
        "Subscription created successfully",
    )))
}

#[tracing::instrument(name = "Upgrade Subscription", skip(pool, ctx))]
#[post("/upgrade")]
pub async fn upgrade_subscription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<UpgradeRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let subscription = billing_plans::upgrade(&pool, ctx.user_id, request.package_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        subscription,
        "Subscription upgraded successfully",
    )))
}

#[tracing::instrument(name = "Cancel Subscription", skip(pool, ctx))]
#[post("/cancel")]
pub async fn cancel_subscription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let subscription = billing_plans::cancel(&pool, ctx.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        subscription,
        "Subscription cancelled",
    )))
}

#[tracing::instrument(name = "Renew Subscription", skip(pool, ctx))]
#[post("/renew")]
pub async fn renew_subscription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let subscription = billing_plans::renew(&pool, ctx.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        subscription,
        "Subscription renewed successfully",
    )))
}

#[tracing::instrument(name = "Toggle Auto Renew", skip(pool, ctx))]
#[patch("/auto-renew")]
pub async fn set_auto_renew(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<AutoRenewRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let subscription =
        billing_plans::set_auto_renew(&pool, ctx.user_id, request.auto_renew).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        subscription,
        "Auto-renew updated",
    )))
}

#[tracing::instrument(name = "Get Current Subscription", skip(pool, ctx))]
#[get("/current")]
pub async fn get_current_subscription(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    let owner_id = subscriber_id(&pool, &ctx).await?;
    let details = billing_plans::current_details(&pool, owner_id).await?;

    let message = if details.is_some() {
        "Current subscription retrieved successfully"
    } else {
        "No active subscription"
    };
    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(details, message)))
}

#[tracing::instrument(name = "Get Subscription History", skip(pool, ctx))]
#[get("/history")]
pub async fn get_subscription_history(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&[StaffRole::Owner])?;
    let history = subscriptions::get_user_subscriptions(pool.get_ref(), ctx.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        history,
        "Subscription history retrieved successfully",
    )))
}

#[tracing::instrument(name = "Check Usage Limit", skip(pool, ctx))]
#[get("/usage-check")]
pub async fn check_usage(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    query: web::Query<UsageCheckQuery>,
) -> Result<HttpResponse, AppError> {
    let owner_id = subscriber_id(&pool, &ctx).await?;
    let allowed = usage_limits::check_usage_limit(
        &pool,
        owner_id,
        query.resource_type,
        query.requested.unwrap_or(1).max(1),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        UsageCheckResponse {
            resource_type: query.resource_type,
            allowed,
        },
        "Usage limit checked",
    )))
}

#[tracing::instrument(name = "Process Expired Subscriptions", skip(pool, ctx))]
#[post("/process-expired")]
pub async fn process_expired(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    let summary = billing_plans::process_expired(&pool, Utc::now().date_naive()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        summary,
        "Expired subscriptions processed",
    )))
}
