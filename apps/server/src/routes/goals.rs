//! # Goal Routes
//!
//! Revenue, cash-net and sales-count targets over a date range.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use caixa_billing::PaymentGateway;
use caixa_core::goal::GoalProgress;
use caixa_core::Goal;
use caixa_db::repository::goal::GoalInput;
use caixa_db::Database;

use crate::error::ApiError;
use crate::state::{today, AppState};

pub fn routes<G: PaymentGateway + 'static>() -> Router<AppState<G>> {
    Router::new()
        .route("/goals", get(list_goals).post(create_goal))
        .route("/goals/{id}", get(get_goal).delete(delete_goal))
        .route("/goals/{id}/progress", get(goal_progress))
}

async fn list_goals(State(db): State<Database>) -> Result<Json<Vec<Goal>>, ApiError> {
    Ok(Json(db.goals().list().await?))
}

async fn create_goal(
    State(db): State<Database>,
    Json(input): Json<GoalInput>,
) -> Result<(StatusCode, Json<Goal>), ApiError> {
    let goal = db.goals().insert(&input).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn get_goal(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<Goal>, ApiError> {
    Ok(Json(db.goals().get(&id).await?))
}

async fn delete_goal(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    db.goals().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Achievement so far, pace and what is still needed per day.
async fn goal_progress(
    State(db): State<Database>,
    Path(id): Path<String>,
) -> Result<Json<GoalProgress>, ApiError> {
    Ok(Json(db.goals().progress(&id, today()).await?))
}
