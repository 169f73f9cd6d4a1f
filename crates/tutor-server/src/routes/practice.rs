use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde_json::Value;
use tutor::practice::{self, PracticeRequest, DEFAULT_TOPIC};

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<PracticeRequest>,
) -> Result<Json<Value>, ApiError> {
    let body = match request {
        PracticeRequest::Generate { topic, difficulty } => {
            let topic = topic.as_deref().unwrap_or(DEFAULT_TOPIC);
            tracing::info!(%topic, %difficulty, "generating practice problem");
            let problem = practice::generate(&state.ollama, topic, difficulty).await?;
            serde_json::to_value(problem)
        }
        PracticeRequest::Check {
            problem,
            user_answer,
            correct_answer,
        } => {
            let grade =
                practice::check(&state.ollama, &problem, &user_answer, &correct_answer).await?;
            tracing::info!(correct = grade.correct, "checked practice answer");
            serde_json::to_value(grade)
        }
    };

    body.map(Json)
        .map_err(|e| ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/practice", post(handler))
        .with_state(state)
}
