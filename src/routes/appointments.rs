use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::config::AppointmentConfig;
use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::{appointments, clinics, staff};
use crate::models::appointments::{
    AppointmentQuery, AvailableSlotsQuery, ChangeAppointmentStatusRequest,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::models::common::DeletedResponse;
use crate::models::pagination::{PaginationMeta, PaginationQuery};
use crate::models::staff::StaffRole;
use crate::services::{appointments as booking, scheduling};

#[tracing::instrument(name = "Create Appointment", skip(pool, ctx, request))]
#[post("")]
pub async fn create_appointment(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateAppointmentRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let appointment = booking::book(&pool, &ctx, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        appointment,
        "Appointment booked successfully",
    )))
}

#[tracing::instrument(name = "Get Appointments", skip(pool, ctx, pagination))]
#[get("")]
pub async fn get_appointments(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    filter: web::Query<AppointmentQuery>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let list =
        appointments::list_appointments(pool.get_ref(), clinic.id, &filter, &pagination).await?;
    let total = appointments::count_appointments(pool.get_ref(), clinic.id, &filter).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        list,
        "Appointments retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Available Slots", skip(pool, ctx, config))]
#[get("/available-slots")]
pub async fn get_available_slots(
    pool: web::Data<PgPool>,
    config: web::Data<AppointmentConfig>,
    ctx: ClinicContext,
    query: web::Query<AvailableSlotsQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let doctor = staff::get_doctor(pool.get_ref(), clinic.id, query.doctor_id).await?;

    let day_start = Utc.from_utc_datetime(&query.date.and_time(chrono::NaiveTime::default()));
    let booked = appointments::get_doctor_appointments_between(
        pool.get_ref(),
        doctor.id,
        day_start - Duration::days(1),
        day_start + Duration::days(1),
    )
    .await?;

    let slots = scheduling::available_slots(
        query.date,
        config.day_start_hour,
        config.day_end_hour,
        query.slot_minutes.unwrap_or(config.slot_minutes),
        &booked,
    )?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        slots,
        "Available slots retrieved successfully",
    )))
}

#[tracing::instrument(name = "Get Appointment", skip(pool, ctx))]
#[get("/{appointment_id}")]
pub async fn get_appointment(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let appointment =
        appointments::get_appointment_details(pool.get_ref(), clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        appointment,
        "Appointment retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Appointment", skip(pool, ctx, request))]
#[put("/{appointment_id}")]
pub async fn update_appointment(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<UpdateAppointmentRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let appointment = booking::reschedule(&pool, clinic.id, path.into_inner(), &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        appointment,
        "Appointment updated successfully",
    )))
}

#[tracing::instrument(name = "Change Appointment Status", skip(pool, ctx))]
#[patch("/{appointment_id}/status")]
pub async fn change_appointment_status(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<ChangeAppointmentStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let appointment =
        booking::change_status(&pool, clinic.id, path.into_inner(), request.status).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        appointment,
        "Appointment status updated",
    )))
}

#[tracing::instrument(name = "Delete Appointment", skip(pool, ctx))]
#[delete("/{appointment_id}")]
pub async fn delete_appointment(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let appointment_id = path.into_inner();
    booking::delete(&pool, clinic.id, clinic.owner_id, appointment_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        DeletedResponse {
            id: appointment_id,
            deleted: true,
        },
        "Appointment deleted successfully",
    )))
}
