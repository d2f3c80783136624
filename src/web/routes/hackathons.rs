use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::ArbitrationResult;
use crate::models::HackathonRow;
use crate::services::hackathon_service::{self, HackathonView, NewHackathon};
use crate::services::ArbitrationEngine;
use crate::web::middleware::auth::AuthenticatedUser;

pub async fn list_handler(
    Extension(_auth_user): Extension<AuthenticatedUser>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<Vec<HackathonView>>> {
    Ok(Json(hackathon_service::list_hackathons(&engine).await?))
}

pub async fn create_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(engine): State<ArbitrationEngine>,
    Json(body): Json<NewHackathon>,
) -> ArbitrationResult<(StatusCode, Json<HackathonRow>)> {
    let hackathon = hackathon_service::create_hackathon(&engine, &auth_user.id, body).await?;
    Ok((StatusCode::CREATED, Json(hackathon)))
}

pub async fn detail_handler(
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Path(hackathon_id): Path<String>,
    State(engine): State<ArbitrationEngine>,
) -> ArbitrationResult<Json<HackathonView>> {
    Ok(Json(hackathon_service::get_hackathon(&engine, &hackathon_id).await?))
}
