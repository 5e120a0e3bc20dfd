use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{AppError, AppSuccessResponse, ClinicContext};
use crate::db::{appointments, clinics, patients, staff, treatment_history};
use crate::models::staff::StaffRole;
use crate::models::treatment_history::{
    CreateTreatmentHistoryRequest, UpdateTreatmentHistoryRequest,
};

#[tracing::instrument(name = "Create Treatment History", skip(pool, ctx, request))]
#[post("")]
pub async fn create_treatment_history(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreateTreatmentHistoryRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::CLINICAL)?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;

    patients::get_patient_by_id(pool.get_ref(), clinic.id, request.patient_id).await?;
    let doctor_id = request.doctor_id.unwrap_or(ctx.user_id);
    staff::get_doctor(pool.get_ref(), clinic.id, doctor_id).await?;
    if let Some(appointment_id) = request.appointment_id {
        appointments::get_appointment_by_id(pool.get_ref(), clinic.id, appointment_id).await?;
    }

    let visit_date = request.visit_date.unwrap_or_else(|| Utc::now().date_naive());
    let history =
        treatment_history::insert_history(pool.get_ref(), clinic.id, doctor_id, visit_date, &request)
            .await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        history,
        "Treatment history recorded successfully",
    )))
}

#[tracing::instrument(name = "Get Treatment History", skip(pool, ctx))]
#[get("/{history_id}")]
pub async fn get_treatment_history(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::CLINICAL)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let history =
        treatment_history::get_history_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        history,
        "Treatment history retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Treatment History", skip(pool, ctx, request))]
#[put("/{history_id}")]
pub async fn update_treatment_history(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<UpdateTreatmentHistoryRequest>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::CLINICAL)?;
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let history =
        treatment_history::update_history(pool.get_ref(), clinic.id, path.into_inner(), &request)
            .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        history,
        "Treatment history updated successfully",
    )))
}
