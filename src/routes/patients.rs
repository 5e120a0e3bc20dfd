use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::{generate_document_number, AppError, AppSuccessResponse, ClinicContext};
use crate::db::{clinics, patients, prescriptions, treatment_history};
use crate::models::common::DeletedResponse;
use crate::models::pagination::{PaginationMeta, PaginationQuery};
use crate::models::patients::{CreatePatientRequest, UpdatePatientRequest};
use crate::models::staff::StaffRole;
use crate::models::subscriptions::ResourceType;
use crate::services::usage_limits;

#[tracing::instrument(name = "Create Patient", skip(pool, ctx, request))]
#[post("")]
pub async fn create_patient(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    request: web::Json<CreatePatientRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let patient_code = generate_document_number("P", Utc::now().date_naive());

    let mut tx = pool.begin().await?;
    usage_limits::consume(&mut tx, clinic.owner_id, ResourceType::Patients, 1).await?;
    let patient =
        patients::insert_patient(&mut *tx, clinic.id, &patient_code, ctx.user_id, &request).await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse::new(
        patient,
        "Patient registered successfully",
    )))
}

#[tracing::instrument(name = "Search Patients", skip(pool, ctx, pagination))]
#[get("")]
pub async fn search_patients(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let patients = patients::search_patients(pool.get_ref(), clinic.id, &pagination).await?;
    let total =
        patients::count_patients(pool.get_ref(), clinic.id, pagination.search.as_deref()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        patients,
        "Patients retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Patient", skip(pool, ctx))]
#[get("/{patient_id}")]
pub async fn get_patient(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let patient = patients::get_patient_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        patient,
        "Patient retrieved successfully",
    )))
}

#[tracing::instrument(name = "Update Patient", skip(pool, ctx, request))]
#[put("/{patient_id}")]
pub async fn update_patient(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    request: web::Json<UpdatePatientRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let patient =
        patients::update_patient(pool.get_ref(), clinic.id, path.into_inner(), &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        patient,
        "Patient updated successfully",
    )))
}

#[tracing::instrument(name = "Delete Patient", skip(pool, ctx))]
#[delete("/{patient_id}")]
pub async fn delete_patient(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::MANAGERS)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let patient_id = path.into_inner();

    let mut tx = pool.begin().await?;
    patients::soft_delete_patient(&mut *tx, clinic.id, patient_id).await?;
    usage_limits::release(&mut tx, clinic.owner_id, ResourceType::Patients, 1).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        DeletedResponse {
            id: patient_id,
            deleted: true,
        },
        "Patient deleted successfully",
    )))
}

#[tracing::instrument(name = "Get Patient Treatment History", skip(pool, ctx, pagination))]
#[get("/{patient_id}/treatment-history")]
pub async fn get_patient_treatment_history(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
    pagination: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    ctx.require_role(&StaffRole::CLINICAL)?;
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let patient = patients::get_patient_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;
    let mut pagination = pagination.into_inner();
    pagination.validate();

    let history =
        treatment_history::get_patient_history(pool.get_ref(), clinic.id, patient.id, &pagination)
            .await?;
    let total =
        treatment_history::count_patient_history(pool.get_ref(), clinic.id, patient.id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::paginated(
        history,
        "Treatment history retrieved successfully",
        PaginationMeta::new(pagination.page, pagination.per_page, total),
    )))
}

#[tracing::instrument(name = "Get Patient Prescriptions", skip(pool, ctx))]
#[get("/{patient_id}/prescriptions")]
pub async fn get_patient_prescriptions(
    pool: web::Data<PgPool>,
    ctx: ClinicContext,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let clinic = clinics::ensure_clinic_access(&pool, &ctx).await?;
    let patient = patients::get_patient_by_id(pool.get_ref(), clinic.id, path.into_inner()).await?;
    let prescriptions =
        prescriptions::get_patient_prescriptions(pool.get_ref(), clinic.id, patient.id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse::new(
        prescriptions,
        "Prescriptions retrieved successfully",
    )))
}
