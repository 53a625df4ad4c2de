//! Queue handlers.

use crate::api::AppState;
use crate::types::QueueStats;
use axum::{Json, extract::State};

/// GET /queue/stats - Get queue statistics
#[utoipa::path(
    get,
    path = "/queue/stats",
    tag = "queue",
    responses(
        (status = 200, description = "Queue statistics", body = QueueStats)
    )
)]
pub async fn queue_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.downloader.queue_stats())
}
