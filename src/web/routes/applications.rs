use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::ArbitrationResult;
use crate::models::ApplicationRow;
use crate::services::application_service::{
    self, ApplicationStats, PaymentConfirmation, SubmitApplication,
};
use crate::services::ArbitrationEngine;
use crate::web::middleware::auth::AuthenticatedUser;

pub async fn submit_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(hackathon_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<SubmitApplication>,
) -> ArbitrationResult<(StatusCode, Json<ApplicationRow>)> {
    let application =
        application_service::submit_application(&engine, &auth_user.id, &hackathon_id, body)
            .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn list_for_hackathon_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(hackathon_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<ApplicationRow>>> {
    let rows =
        application_service::list_for_hackathon(&engine, &auth_user.id, &hackathon_id).await?;
    Ok(Json(rows))
}

pub async fn stats_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(hackathon_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<ApplicationStats>> {
    let stats =
        application_service::application_stats(&engine, &auth_user.id, &hackathon_id).await?;
    Ok(Json(stats))
}

pub async fn mine_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<ApplicationRow>>> {
    Ok(Json(application_service::list_mine(&engine, &auth_user.id).await?))
}

pub async fn detail_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(application_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<ApplicationRow>> {
    let application =
        application_service::get_application(&engine, &auth_user.id, &application_id).await?;
    Ok(Json(application))
}

pub async fn payment_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(application_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<PaymentConfirmation>,
) -> ArbitrationResult<Json<ApplicationRow>> {
    let application =
        application_service::confirm_payment(&engine, &auth_user.id, &application_id, body)
            .await?;
    Ok(Json(application))
}

pub async fn expire_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(application_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<ApplicationRow>> {
    let application = application_service::expire(&engine, &auth_user.id, &application_id).await?;
    Ok(Json(application))
}

pub async fn reject_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(application_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<ApplicationRow>> {
    let application =
        application_service::reject_application(&engine, &auth_user.id, &application_id).await?;
    Ok(Json(application))
}
